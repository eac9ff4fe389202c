//! The build-tool capability interface.
//!
//! The graph never compiles anything itself. Every node owns a [`Target`]
//! that knows how to declare dependencies, build, package, and clean the
//! project. All hooks have no-op defaults, so a target implements only what
//! it needs.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::asset::Asset;
use crate::core::source::SourceDescriptor;
use crate::package::export::Exporter;
use crate::util::config::BuildConfig;

/// Default workspace directory name under the workspaces root.
pub const DEFAULT_WORKSPACE: &str = "build";

/// Everything a target hook may need to know about its node.
#[derive(Debug, Clone, Copy)]
pub struct TargetContext<'a> {
    pub name: &'a str,
    /// Source directory; packages fetched from the remote cache have none
    pub src_dir: Option<&'a Path>,
    pub build_dir: &'a Path,
    pub config: &'a BuildConfig,
    /// Extra build arguments merged from every declaration of this node
    pub args: &'a [String],
    pub is_root: bool,
}

/// What a node makes available to its consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exports {
    pub includes: Vec<PathBuf>,
    pub libs: Vec<PathBuf>,
    pub syslibs: Vec<String>,
    pub assets: Vec<Asset>,
    /// Files whose absence means the node must be rebuilt
    pub build_products: Vec<PathBuf>,
}

impl Exports {
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty()
            && self.libs.is_empty()
            && self.syslibs.is_empty()
            && self.assets.is_empty()
    }
}

/// How a node deploys its package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOptions {
    /// Package directory, relative to the build directory
    pub path: String,
    pub recurse_includes: bool,
    pub recurse_libs: bool,
    pub recurse_syslibs: bool,
    pub recurse_assets: bool,
}

impl DeployOptions {
    pub fn for_project(name: &str) -> Self {
        DeployOptions {
            path: format!("deploy/{}", name),
            recurse_includes: true,
            recurse_libs: true,
            recurse_syslibs: true,
            recurse_assets: true,
        }
    }
}

/// Build-tool collaborator for one node.
pub trait Target: Send {
    /// Declare child dependencies. Called once per load.
    fn dependencies(&mut self, _ctx: &TargetContext<'_>) -> Result<Vec<SourceDescriptor>> {
        Ok(Vec::new())
    }

    /// Build the project into `ctx.build_dir`.
    fn build(&mut self, _ctx: &TargetContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Export includes, libraries, system libraries and assets. Called after
    /// every build and also when the build was skipped.
    fn package(&mut self, _ctx: &TargetContext<'_>, _exports: &mut Exporter<'_>) -> Result<()> {
        Ok(())
    }

    /// Remove tool-specific build state. The build directory itself is
    /// deleted by the graph afterwards.
    fn clean(&mut self, _ctx: &TargetContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Workspace directory name. Only the root's value is used.
    fn workspace(&self) -> Option<String> {
        None
    }

    /// The per-node build description file, for modification tracking.
    fn build_description(&self) -> Option<PathBuf> {
        None
    }

    /// The native project descriptor (e.g. `CMakeLists.txt`), for
    /// modification tracking.
    fn project_descriptor(&self) -> Option<PathBuf> {
        None
    }

    /// Header-only projects produce no build products.
    fn nothing_to_build(&self) -> bool {
        false
    }

    /// Package deployment settings, if this target deploys.
    fn deploy_options(&self, name: &str) -> Option<DeployOptions> {
        Some(DeployOptions::for_project(name))
    }
}

/// A target that does nothing; used for prebuilt packages and for
/// projects without a build description.
#[derive(Debug, Default)]
pub struct NoopTarget;

impl Target for NoopTarget {}

/// Information available when creating a node's target.
#[derive(Debug, Clone, Copy)]
pub struct TargetRequest<'a> {
    pub name: &'a str,
    pub source: &'a SourceDescriptor,
    pub src_dir: Option<&'a Path>,
    /// Explicit build description path, if one was declared or found
    pub build_file: Option<&'a Path>,
    pub is_root: bool,
}

/// Creates targets for nodes as they are loaded.
pub trait TargetFactory: Send + Sync {
    fn create(&self, request: &TargetRequest<'_>) -> Result<Box<dyn Target>>;
}

/// Factory that gives every node a [`NoopTarget`].
#[derive(Debug, Default)]
pub struct NoopFactory;

impl TargetFactory for NoopFactory {
    fn create(&self, _request: &TargetRequest<'_>) -> Result<Box<dyn Target>> {
        Ok(Box::new(NoopTarget))
    }
}
