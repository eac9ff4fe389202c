//! Load phase: fetch sources, create targets, discover children and decide
//! which nodes need a build.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::core::errors::BuildError;
use crate::core::manifest::MANIFEST_FILE;
use crate::core::source::SourceDescriptor;
use crate::core::target::{TargetRequest, DEFAULT_WORKSPACE};
use crate::graph::layout::Layout;
use crate::graph::node::{DependencyNode, LoadState};
use crate::graph::policy::{self, Decision, RebuildInputs};
use crate::graph::products::{
    find_removed_dependency, first_missing_product, has_exported_libs, load_exported_libs,
    tag_changed, DESCRIPTION_TAG_FILE, PROJECT_TAG_FILE,
};
use crate::graph::DependencyGraph;
use crate::package::archive::extract_archive;
use crate::remote::{archive_name, reconfigure_from_fetched};
use crate::sources::{ChangeDetector, CheckoutRequest};
use crate::util::fs::{ensure_dir, remove_dir_all_if_exists};

/// Poll interval while another thread loads a shared node.
const LOAD_POLL: Duration = Duration::from_millis(100);

impl DependencyGraph {
    /// Load the whole graph. Returns whether the root needs a build.
    pub fn load(&self) -> Result<bool> {
        if self.config.parallel && self.config.jobs > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.jobs)
                .build()
                .context("failed to create load thread pool")?;
            pool.install(|| self.load_node(&self.root, true))?;
        } else {
            self.load_node(&self.root, false)?;
        }

        if self.config.no_specific_target() {
            self.propagate_rebuilds()?;
        }
        Ok(self.root.should_rebuild())
    }

    fn load_node(&self, node: &Arc<DependencyNode>, parallel: bool) -> Result<bool> {
        if !node.try_begin_load() {
            while node.load_state() == LoadState::Loading {
                thread::sleep(LOAD_POLL);
            }
            return Ok(node.should_rebuild());
        }

        let loaded = self
            .load_self(node)
            .with_context(|| format!("failed to load `{}`", node.name()));
        node.finish_load();
        loaded?;

        let children = node.children();
        if parallel {
            children
                .par_iter()
                .map(|child| self.load_node(child, true))
                .collect::<Result<Vec<bool>>>()?;
        } else {
            for child in &children {
                self.load_node(child, false)?;
            }
        }

        if self.config.no_specific_target() {
            self.promote_if_child_rebuilds(node)?;
        }
        Ok(node.should_rebuild())
    }

    fn load_self(&self, node: &Arc<DependencyNode>) -> Result<()> {
        let config = &self.config;
        let name = node.name();
        let is_target = config.is_target(name, node.is_root());

        if node.is_root() {
            self.init_root(node)?;
        }

        let source_changed = self.checkout(node)?;
        node.state().source_changed = source_changed;
        self.ensure_target(node)?;

        let cleaned = config.clean && is_target;
        if cleaned {
            self.clean(node)?;
        }

        if !node.is_root() && self.wants_remote(node, is_target) {
            self.consult_remote(node, is_target)?;
        }

        let from_package = node.state().loaded_from_package;
        let build_dir = node.build_dir();
        if !node.is_root() && !from_package {
            let recorded = load_exported_libs(&build_dir)?;
            let mut state = node.state();
            state.exports.libs = recorded.libs;
            state.exports.build_products = recorded.products;
        }

        // a fetched package already declared its children
        if !from_package {
            let declared = self.with_target(node, |target, ctx| target.dependencies(ctx))?;
            for dep in declared {
                self.add_child(node, dep)?;
            }
        }

        if config.build || config.update {
            let decision = policy::decide(&self.rebuild_inputs(node, cleaned)?);
            if decision.build {
                tracing::info!("{:<16} BUILD [{}]", name, decision.reason);
                ensure_dir(&build_dir)?;
            } else if config.no_specific_target() || is_target {
                tracing::info!("{:<16} {}", name, decision.reason);
            } else {
                tracing::debug!("{:<16} {}", name, decision.reason);
            }
            node.set_should_rebuild(decision.build);
            node.state().decision = Some(decision);
        }

        if source_changed {
            self.save_git_status(node)?;
        }
        Ok(())
    }

    /// Create the root's target and fix the workspace layout.
    fn init_root(&self, node: &Arc<DependencyNode>) -> Result<()> {
        self.ensure_target(node)?;
        let workspace = self
            .with_target(node, |target, _| Ok(target.workspace()))?
            .unwrap_or_else(|| DEFAULT_WORKSPACE.to_string());

        let layout = Layout::new(&self.config, &self.root_dir, &workspace);
        let build_file = node.state().dirs.build_file.clone();
        node.state().dirs = layout.root_dirs(node.name(), &self.root_dir, build_file);
        tracing::debug!("workspace {}", layout.workspace_dir().display());
        let _ = self.layout.set(layout);
        Ok(())
    }

    pub(super) fn ensure_target(&self, node: &Arc<DependencyNode>) -> Result<()> {
        let dirs = {
            let state = node.state();
            if state.target.is_some() {
                return Ok(());
            }
            state.dirs.clone()
        };
        let request = TargetRequest {
            name: node.name(),
            source: node.source(),
            src_dir: dirs.src_dir.as_deref(),
            build_file: dirs.build_file.as_deref(),
            is_root: node.is_root(),
        };
        let target = self.factory.create(&request)?;
        node.state().target = Some(target);
        Ok(())
    }

    fn detector_for<'a>(
        &self,
        node: &'a DependencyNode,
        dirs: &'a (Option<PathBuf>, PathBuf, PathBuf),
    ) -> Option<ChangeDetector<'a>> {
        let SourceDescriptor::Git(git) = node.source() else {
            return None;
        };
        if node.is_root() {
            return None;
        }
        let (src_dir, dep_dir, build_dir) = dirs;
        let src_dir = src_dir.as_deref()?;
        Some(ChangeDetector::new(node.name(), git, src_dir, dep_dir, build_dir))
    }

    fn git_dirs(node: &DependencyNode) -> (Option<PathBuf>, PathBuf, PathBuf) {
        let state = node.state();
        (
            state.dirs.src_dir.clone(),
            state.dirs.dep_dir.clone(),
            state.dirs.build_dir.clone(),
        )
    }

    /// Clone, pull or re-clone a git dependency. Returns true if its source
    /// changed.
    fn checkout(&self, node: &Arc<DependencyNode>) -> Result<bool> {
        let dirs = Self::git_dirs(node);
        let Some(detector) = self.detector_for(node, &dirs) else {
            return Ok(false);
        };
        detector.checkout(CheckoutRequest {
            is_target: self.config.target_matches(node.name()),
            update: self.config.update,
            reclone: self.config.reclone,
        })
    }

    pub(super) fn save_git_status(&self, node: &Arc<DependencyNode>) -> Result<()> {
        let dirs = Self::git_dirs(node);
        match self.detector_for(node, &dirs) {
            Some(detector) => detector.save_status(),
            None => Ok(()),
        }
    }

    fn clean(&self, node: &Arc<DependencyNode>) -> Result<()> {
        tracing::info!("{:<16} CLEAN", node.name());
        self.with_target(node, |target, ctx| target.clean(ctx))?;
        remove_dir_all_if_exists(&node.build_dir())
    }

    /// A non-root node looks for a prebuilt package when it is a package
    /// source, was fetched before, or has never been built.
    fn wants_remote(&self, node: &DependencyNode, is_target: bool) -> bool {
        let build_dir = node.build_dir();
        if node.state().checked_remote {
            return false;
        }
        let first_time = !build_dir.join(DESCRIPTION_TAG_FILE).exists()
            && !has_exported_libs(&build_dir);
        node.source().is_package()
            || build_dir.join(MANIFEST_FILE).exists()
            || first_time
            || (self.config.force_remote && is_target)
    }

    fn consult_remote(&self, node: &Arc<DependencyNode>, is_target: bool) -> Result<()> {
        let config = &self.config;
        let name = node.name();
        node.state().checked_remote = true;

        if config.no_remote || (is_target && (config.rebuild || config.clean) && !config.force_remote)
        {
            tracing::debug!("{}: remote cache skipped", name);
            return Ok(());
        }

        let build_dir = node.build_dir();
        let archive = archive_name(name, node.source(), node.src_dir().as_deref(), config);
        let required = node.source().is_package() || (config.force_remote && is_target);

        let fetched = match self.fetch_package(&archive, &build_dir) {
            Ok(fetched) => fetched,
            Err(e) if !required => {
                tracing::warn!("{}: failed to fetch {}: {:#}", name, archive, e);
                false
            }
            Err(e) => return Err(e),
        };
        if !fetched {
            if required {
                return Err(BuildError::MissingArtifact {
                    name: name.to_string(),
                    archive,
                }
                .into());
            }
            tracing::debug!("{}: {} is not cached", name, archive);
            return Ok(());
        }

        match reconfigure_from_fetched(name, &build_dir, config.platform) {
            Ok(rehydrated) => {
                {
                    let mut state = node.state();
                    state.exports = rehydrated.exports;
                    state.loaded_from_package = true;
                }
                tracing::info!("{:<16} FETCHED {}", name, archive);
                for dep in rehydrated.dependencies {
                    self.add_child(node, dep)?;
                }
                Ok(())
            }
            Err(e) if !required => {
                tracing::warn!("{}: ignoring fetched package: {:#}", name, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Unpack `<archive>.zip` into `build_dir`, from the remote cache if one
    /// is configured, else only from a previously downloaded archive.
    fn fetch_package(&self, archive: &str, build_dir: &Path) -> Result<bool> {
        if let Some(remote) = &self.remote {
            return remote.fetch_into(archive, build_dir);
        }
        let local = build_dir.join(format!("{}.zip", archive));
        if !local.exists() {
            return Ok(false);
        }
        extract_archive(&local, build_dir)?;
        Ok(true)
    }

    fn rebuild_inputs(&self, node: &Arc<DependencyNode>, cleaned: bool) -> Result<RebuildInputs> {
        let config = &self.config;
        let name = node.name();
        let (description, project, nothing_to_build) = self.with_target(node, |target, _| {
            Ok((
                target.build_description(),
                target.project_descriptor(),
                target.nothing_to_build(),
            ))
        })?;

        let (build_dir, build_file, always_build, source_changed, from_package, products, deps) = {
            let state = node.state();
            (
                state.dirs.build_dir.clone(),
                state.dirs.build_file.clone(),
                state.always_build,
                state.source_changed,
                state.loaded_from_package,
                state.exports.build_products.clone(),
                state
                    .children
                    .iter()
                    .map(|c| c.source().dependency_name())
                    .collect::<Vec<_>>(),
            )
        };
        let description = description.or(build_file);

        Ok(RebuildInputs {
            filtered_out: !config.no_specific_target() && !config.target_matches(name),
            cleaned,
            is_root: node.is_root(),
            always_build,
            source_changed,
            description_changed: tag_changed(&build_dir, DESCRIPTION_TAG_FILE, description.as_deref()),
            project_changed: tag_changed(&build_dir, PROJECT_TAG_FILE, project.as_deref()),
            not_built: products.is_empty(),
            missing_product: first_missing_product(&products),
            removed_dependency: find_removed_dependency(&build_dir, &deps)?,
            update_requested: (config.update && config.is_named_target(name))
                .then(|| name.to_string()),
            loaded_from_package: from_package,
            nothing_to_build,
        })
    }

    /// Mark `node` for a build if a direct child is rebuilt.
    fn promote_if_child_rebuilds(&self, node: &Arc<DependencyNode>) -> Result<()> {
        if node.should_rebuild() || !(self.config.build || self.config.update) {
            return Ok(());
        }
        let Some(child) = node.children().into_iter().find(|c| c.should_rebuild()) else {
            return Ok(());
        };
        let decision = Decision::propagated(child.name());
        tracing::info!("{:<16} BUILD [{}]", node.name(), decision.reason);
        ensure_dir(&node.build_dir())?;
        node.set_should_rebuild(true);
        node.state().decision = Some(decision);
        Ok(())
    }

    /// Bottom-up pass so a rebuild anywhere below a node reaches it, also
    /// across shared nodes whose load finished on another path.
    fn propagate_rebuilds(&self) -> Result<()> {
        fn visit(
            graph: &DependencyGraph,
            node: &Arc<DependencyNode>,
            done: &mut HashSet<String>,
            on_path: &mut HashSet<String>,
        ) -> Result<()> {
            if done.contains(node.name()) || !on_path.insert(node.name().to_string()) {
                return Ok(());
            }
            for child in node.children() {
                visit(graph, &child, done, on_path)?;
            }
            graph.promote_if_child_rebuilds(node)?;
            on_path.remove(node.name());
            done.insert(node.name().to_string());
            Ok(())
        }
        visit(self, &self.root, &mut HashSet::new(), &mut HashSet::new())
    }
}
