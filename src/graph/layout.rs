//! Workspace directory layout.
//!
//! ```text
//! <workspaces_root>/<workspace>/<dep>[-<branch>]/            dep_dir
//! <workspaces_root>/<workspace>/<dep>[-<branch>]/<dep>/      git clone
//! <workspaces_root>/<workspace>/<dep>[-<branch>]/<platform>/ build_dir
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::source::SourceDescriptor;
use crate::graph::node::NodeDirs;
use crate::util::config::BuildConfig;
use crate::util::fs::resolve_path;

/// Directory of conventional build descriptions next to a project.
const DESCRIPTIONS_DIR: &str = "burrow";

#[derive(Debug, Clone)]
pub struct Layout {
    workspace_dir: PathBuf,
    build_dir_name: String,
    branch_dirs: bool,
}

impl Layout {
    /// `root_src_dir` is used when no workspaces root is configured.
    pub fn new(config: &BuildConfig, root_src_dir: &Path, workspace: &str) -> Self {
        let root = config
            .workspaces_root
            .clone()
            .unwrap_or_else(|| root_src_dir.to_path_buf());
        Layout {
            workspace_dir: root.join(workspace),
            build_dir_name: config.build_dir_name(),
            branch_dirs: config.branch_dirs,
        }
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    fn dep_dir(&self, source: &SourceDescriptor) -> PathBuf {
        let mut dir_name = source.name().to_string();
        if let SourceDescriptor::Git(git) = source {
            let suffix = git.branch_or_tag();
            if self.branch_dirs && !suffix.is_empty() {
                dir_name = format!("{}-{}", dir_name, suffix.replace('/', "-"));
            }
        }
        self.workspace_dir.join(dir_name)
    }

    pub fn root_dirs(&self, name: &str, src_dir: &Path, build_file: Option<PathBuf>) -> NodeDirs {
        let dep_dir = self.workspace_dir.join(name);
        NodeDirs {
            src_dir: Some(src_dir.to_path_buf()),
            build_dir: dep_dir.join(&self.build_dir_name),
            dep_dir,
            build_file,
        }
    }

    /// Directories for a dependency declared by a node whose relative paths
    /// resolve against `parent_base`.
    pub fn child_dirs(&self, source: &SourceDescriptor, parent_base: &Path) -> Result<NodeDirs> {
        let dep_dir = self.dep_dir(source);
        let build_dir = dep_dir.join(&self.build_dir_name);

        let src_dir = match source {
            SourceDescriptor::Git(_) => Some(dep_dir.join(source.name())),
            SourceDescriptor::Local(local) => {
                let dir = resolve_path(parent_base, &local.rel_path);
                if !dir.is_dir() {
                    bail!(
                        "local dependency `{}` source directory does not exist: {}",
                        local.name,
                        dir.display()
                    );
                }
                Some(dir)
            }
            SourceDescriptor::Package(_) => None,
        };

        let build_file = match source.build_file() {
            Some(file) => {
                let path = resolve_path(parent_base, file);
                if !path.is_file() {
                    bail!(
                        "build description for `{}` does not exist: {}",
                        source.name(),
                        path.display()
                    );
                }
                Some(path)
            }
            None if source.is_package() => None,
            None => {
                let conventional = parent_base
                    .join(DESCRIPTIONS_DIR)
                    .join(format!("{}.toml", source.name()));
                conventional.is_file().then_some(conventional)
            }
        };

        Ok(NodeDirs {
            src_dir,
            dep_dir,
            build_dir,
            build_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::{GitSource, LocalSource, PackageSource};
    use tempfile::TempDir;

    fn config() -> BuildConfig {
        let mut config = BuildConfig::default();
        config.platform = crate::util::platform::Platform::Linux;
        config.arch = crate::util::platform::Arch::X64;
        config
    }

    #[test]
    fn test_git_dirs_with_branch_suffix() {
        let tmp = TempDir::new().unwrap();
        let mut config = config();
        config.branch_dirs = true;
        let layout = Layout::new(&config, tmp.path(), "build");
        let git = GitSource::new("zlib", "https://x/zlib.git")
            .unwrap()
            .with_branch("release/1.3");

        let dirs = layout
            .child_dirs(&SourceDescriptor::Git(git), tmp.path())
            .unwrap();
        let dep_dir = tmp.path().join("build").join("zlib-release-1.3");
        assert_eq!(dirs.dep_dir, dep_dir);
        assert_eq!(dirs.src_dir, Some(dep_dir.join("zlib")));
        assert_eq!(dirs.build_dir, dep_dir.join(config.build_dir_name()));
        assert_eq!(dirs.build_file, None);
    }

    #[test]
    fn test_local_dirs_resolve_against_parent() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("libs/core")).unwrap();
        std::fs::create_dir_all(tmp.path().join("burrow")).unwrap();
        std::fs::write(tmp.path().join("burrow/core.toml"), "").unwrap();
        let layout = Layout::new(&config(), tmp.path(), "build");

        let local = SourceDescriptor::Local(LocalSource::new("core", "libs/core"));
        let dirs = layout.child_dirs(&local, tmp.path()).unwrap();
        assert_eq!(dirs.src_dir, Some(tmp.path().join("libs/core")));
        assert_eq!(dirs.build_file, Some(tmp.path().join("burrow/core.toml")));

        let missing = SourceDescriptor::Local(LocalSource::new("gone", "libs/gone"));
        assert!(layout.child_dirs(&missing, tmp.path()).is_err());
    }

    #[test]
    fn test_explicit_build_file_must_exist() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(&config(), tmp.path(), "build");
        let mut git = GitSource::new("zlib", "https://x/zlib.git").unwrap();
        git.build_file = "zlib.toml".into();

        let err = layout
            .child_dirs(&SourceDescriptor::Git(git), tmp.path())
            .unwrap_err();
        assert!(err.to_string().contains("zlib.toml"));
    }

    #[test]
    fn test_package_has_no_source() {
        let tmp = TempDir::new().unwrap();
        let mut config = config();
        config.workspaces_root = Some(tmp.path().join("ws"));
        let layout = Layout::new(&config, tmp.path(), "packages");

        let pkg = SourceDescriptor::Package(PackageSource::new("ssl", "3.0", ""));
        let dirs = layout.child_dirs(&pkg, tmp.path()).unwrap();
        assert_eq!(dirs.src_dir, None);
        assert_eq!(dirs.dep_dir, tmp.path().join("ws/packages/ssl"));
    }
}
