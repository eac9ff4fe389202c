//! `burrow.toml` schema and the target it describes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::core::source::{GitSource, LocalSource, PackageSource, SourceDescriptor};
use crate::core::target::{DeployOptions, Target, TargetContext};
use crate::package::export::Exporter;
use crate::util::fs::resolve_path;
use crate::util::process::{find_executable, ProcessBuilder};

/// The parsed `burrow.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectFile {
    pub project: ProjectSection,
    pub build: BuildSection,
    pub exports: ExportsSection,
    pub dependencies: Vec<DependencyEntry>,
    pub deploy: Option<DeploySection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectSection {
    pub name: Option<String>,
    /// Workspace directory name; only read from the root project
    pub workspace: Option<String>,
    /// Header-only project
    pub nothing_to_build: bool,
    /// Native project descriptor, e.g. `CMakeLists.txt`
    pub project_file: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSection {
    /// Program and arguments, run in the build directory
    pub command: Vec<String>,
    pub clean: Vec<String>,
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportsSection {
    /// Include directories relative to the source directory
    pub includes: Vec<String>,
    /// Library glob patterns relative to the build directory
    pub libs: Vec<String>,
    pub syslibs: Vec<SyslibEntry>,
    pub assets: Vec<AssetEntry>,
    /// Extra build outputs whose absence forces a rebuild
    pub products: Vec<String>,
}

/// `"pthread"` or `{ name = "X11", apt = "libx11-dev", required = false }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SyslibEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        apt: Option<String>,
        #[serde(default = "default_true")]
        required: bool,
    },
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetEntry {
    /// A file, or a directory when `patterns` is set; relative to the
    /// source directory
    pub path: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Glob patterns selecting files under `path`
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// One `[[dependencies]]` table; exactly one of the keys must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DependencyEntry {
    pub git: Option<GitEntry>,
    pub local: Option<LocalEntry>,
    pub package: Option<PackageEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitEntry {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub build_file: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalEntry {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub build_file: String,
    #[serde(default)]
    pub always_build: bool,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageEntry {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub archive: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeploySection {
    /// Package directory relative to the build directory
    pub path: Option<String>,
    /// Default for every `recurse_*` key
    pub recurse: Option<bool>,
    pub recurse_includes: Option<bool>,
    pub recurse_libs: Option<bool>,
    pub recurse_syslibs: Option<bool>,
    pub recurse_assets: Option<bool>,
}

impl ProjectFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Dependencies in declaration order.
    pub fn sources(&self) -> Result<Vec<SourceDescriptor>> {
        self.dependencies
            .iter()
            .enumerate()
            .map(|(i, entry)| entry.to_source().with_context(|| format!("dependency #{}", i + 1)))
            .collect()
    }
}

impl DependencyEntry {
    pub fn to_source(&self) -> Result<SourceDescriptor> {
        match (&self.git, &self.local, &self.package) {
            (Some(git), None, None) => {
                let mut source = GitSource::new(&git.name, &git.url)?
                    .with_branch(&git.branch)
                    .with_tag(&git.tag);
                source.build_file = git.build_file.clone();
                source.args = git.args.clone();
                Ok(SourceDescriptor::Git(source))
            }
            (None, Some(local), None) => {
                let mut source = LocalSource::new(&local.name, &local.path);
                source.build_file = local.build_file.clone();
                source.always_build = local.always_build;
                source.args = local.args.clone();
                Ok(SourceDescriptor::Local(source))
            }
            (None, None, Some(pkg)) => Ok(SourceDescriptor::Package(PackageSource::new(
                &pkg.name,
                &pkg.version,
                &pkg.archive,
            ))),
            _ => bail!("expected exactly one of `git`, `local` or `package`"),
        }
    }
}

/// A target configured by a `burrow.toml`.
#[derive(Debug)]
pub struct ProjectTarget {
    file: ProjectFile,
    path: PathBuf,
    src_dir: Option<PathBuf>,
}

impl ProjectTarget {
    pub fn load(path: &Path, src_dir: Option<&Path>) -> Result<Self> {
        Ok(ProjectTarget {
            file: ProjectFile::load(path)?,
            path: path.to_path_buf(),
            src_dir: src_dir.map(Path::to_path_buf),
        })
    }

    /// Substitute `{src_dir}`, `{build_dir}` and `{build_type}`.
    fn expand(arg: &str, ctx: &TargetContext<'_>) -> String {
        let src_dir = ctx
            .src_dir
            .map(|d| d.display().to_string())
            .unwrap_or_default();
        arg.replace("{src_dir}", &src_dir)
            .replace("{build_dir}", &ctx.build_dir.display().to_string())
            .replace("{build_type}", ctx.config.build_type())
    }

    fn run(&self, command: &[String], ctx: &TargetContext<'_>, with_args: bool) -> Result<()> {
        let Some((program, args)) = command.split_first() else {
            return Ok(());
        };
        let program = Self::expand(program, ctx);
        if !program.contains(['/', '\\']) && find_executable(&program).is_none() {
            bail!("`{}` needs `{}`, which was not found in PATH", ctx.name, program);
        }
        let mut cmd = ProcessBuilder::new(program)
            .args(args.iter().map(|a| Self::expand(a, ctx)))
            .cwd(ctx.build_dir)
            .env("BURROW_BUILD_DIR", ctx.build_dir.display().to_string())
            .env("BURROW_BUILD_TYPE", ctx.config.build_type())
            .env("BURROW_PLATFORM", ctx.config.platform.as_str())
            .env("BURROW_ARCH", ctx.config.arch.as_str());
        if let Some(src) = ctx.src_dir {
            cmd = cmd.env("BURROW_SOURCE_DIR", src.display().to_string());
        }
        if with_args {
            cmd = cmd.args(ctx.args);
        }
        for (key, value) in &self.file.build.env {
            cmd = cmd.env(key, Self::expand(value, ctx));
        }

        tracing::debug!("{}: {}", ctx.name, cmd.display_command());
        cmd.run_logged()
    }
}

impl Target for ProjectTarget {
    fn dependencies(&mut self, _ctx: &TargetContext<'_>) -> Result<Vec<SourceDescriptor>> {
        self.file
            .sources()
            .with_context(|| format!("invalid dependency in {}", self.path.display()))
    }

    fn build(&mut self, ctx: &TargetContext<'_>) -> Result<()> {
        if self.file.build.command.is_empty() {
            tracing::debug!("{}: no build command", ctx.name);
            return Ok(());
        }
        self.run(&self.file.build.command, ctx, true)
    }

    fn package(&mut self, ctx: &TargetContext<'_>, exports: &mut Exporter<'_>) -> Result<()> {
        let section = &self.file.exports;
        for include in &section.includes {
            exports.include(include, false);
        }
        if !section.libs.is_empty() {
            exports.libs(".", &section.libs, false)?;
        }
        for syslib in &section.syslibs {
            match syslib {
                SyslibEntry::Name(name) => exports.syslib(name, None, true)?,
                SyslibEntry::Detailed {
                    name,
                    apt,
                    required,
                } => exports.syslib(name, apt.as_deref(), *required)?,
            };
        }
        for asset in &section.assets {
            if asset.patterns.is_empty() {
                exports.asset(&asset.path, asset.category.as_deref(), true);
            } else {
                exports.assets(&asset.path, &asset.patterns, asset.category.as_deref(), true)?;
            }
        }
        for product in &section.products {
            exports.build_product(product);
        }
        tracing::debug!("{}: packaged", ctx.name);
        Ok(())
    }

    fn clean(&mut self, ctx: &TargetContext<'_>) -> Result<()> {
        if !ctx.build_dir.exists() {
            return Ok(());
        }
        self.run(&self.file.build.clean, ctx, false)
    }

    fn workspace(&self) -> Option<String> {
        self.file.project.workspace.clone()
    }

    fn build_description(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }

    fn project_descriptor(&self) -> Option<PathBuf> {
        let file = self.file.project.project_file.as_deref()?;
        let base = self.src_dir.as_deref().or_else(|| self.path.parent())?;
        Some(resolve_path(base, file))
    }

    fn nothing_to_build(&self) -> bool {
        self.file.project.nothing_to_build
    }

    fn deploy_options(&self, name: &str) -> Option<DeployOptions> {
        let mut options = DeployOptions::for_project(name);
        if let Some(deploy) = &self.file.deploy {
            if let Some(path) = &deploy.path {
                options.path = path.clone();
            }
            let recurse = deploy.recurse.unwrap_or(true);
            options.recurse_includes = deploy.recurse_includes.unwrap_or(recurse);
            options.recurse_libs = deploy.recurse_libs.unwrap_or(recurse);
            options.recurse_syslibs = deploy.recurse_syslibs.unwrap_or(recurse);
            options.recurse_assets = deploy.recurse_assets.unwrap_or(recurse);
        }
        Some(options)
    }
}
