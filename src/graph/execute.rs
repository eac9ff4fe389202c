//! Execute phase: build, package and deploy nodes, children first.

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::core::errors::BuildError;
use crate::core::target::Exports;
use crate::graph::node::DependencyNode;
use crate::graph::products::{
    refresh_tag, save_dependency_list, save_exported_libs, DESCRIPTION_TAG_FILE, PROJECT_TAG_FILE,
};
use crate::graph::{glue, DependencyGraph};
use crate::package::deploy::{deploy, Deployment};
use crate::package::export::Exporter;
use crate::package::libkind::unique_lib_paths;
use crate::remote::archive_name;
use crate::util::fs::ensure_dir;

impl DependencyGraph {
    /// Execute every loaded node. Runs on the calling thread.
    pub fn execute(&self) -> Result<()> {
        self.execute_node(&self.root)
    }

    fn execute_node(&self, node: &Arc<DependencyNode>) -> Result<()> {
        if node.is_executed() || node.begin_execute() {
            // executed, or still executing further up a cycle
            return Ok(());
        }

        let children = node.children();
        for child in &children {
            self.execute_node(child)?;
        }
        if let Some(child) = children.iter().find(|c| !c.is_executed()) {
            return Err(BuildError::CyclicOrUnorderedDependency {
                node: node.name().to_string(),
                child: child.name().to_string(),
            }
            .into());
        }

        self.run_tasks(node)
            .with_context(|| format!("failed to build `{}`", node.name()))?;
        node.mark_executed();
        Ok(())
    }

    fn run_tasks(&self, node: &Arc<DependencyNode>) -> Result<()> {
        let config = &self.config;
        let name = node.name();
        let is_target = config.is_target(name, node.is_root());
        let from_package = node.state().loaded_from_package;

        glue::save(node, config.platform)?;

        if node.should_rebuild() && !from_package {
            ensure_dir(&node.build_dir())?;
            tracing::info!("{:<16} building", name);
            self.with_target(node, |target, ctx| target.build(ctx))?;
            self.successful_build(node)?;
        }

        if !from_package {
            let mut exports = self.with_target(node, |target, ctx| {
                let mut exports = Exports::default();
                let mut exporter = Exporter::new(ctx, &mut exports);
                target.package(ctx, &mut exporter)?;
                Ok(exports)
            })?;
            let mut products = exports.libs.clone();
            products.append(&mut exports.build_products);
            exports.build_products = unique_lib_paths(products);
            node.state().exports = exports;
        }

        if config.deploy && is_target {
            let options = self.with_target(node, |target, _| Ok(target.deploy_options(name)))?;
            match options {
                Some(options) => {
                    let deployment = deploy(node, &options)?;
                    if config.upload {
                        self.upload(node, &deployment)?;
                    }
                }
                None => tracing::warn!("{}: nothing to deploy", name),
            }
        }

        let build_dir = node.build_dir();
        if build_dir.exists() {
            save_exported_libs(&build_dir, &node.exports().build_products)?;
        }
        Ok(())
    }

    /// Record what a successful build depended on.
    fn successful_build(&self, node: &Arc<DependencyNode>) -> Result<()> {
        let (description, project) = self.with_target(node, |target, _| {
            Ok((target.build_description(), target.project_descriptor()))
        })?;
        let (build_dir, build_file) = {
            let state = node.state();
            (state.dirs.build_dir.clone(), state.dirs.build_file.clone())
        };
        let description = description.or(build_file);
        refresh_tag(&build_dir, DESCRIPTION_TAG_FILE, description.as_deref())?;
        refresh_tag(&build_dir, PROJECT_TAG_FILE, project.as_deref())?;

        let dependencies: Vec<String> = node
            .children()
            .iter()
            .map(|c| c.source().dependency_name())
            .collect();
        save_dependency_list(&build_dir, &dependencies)?;
        self.save_git_status(node)
    }

    fn upload(&self, node: &Arc<DependencyNode>, deployment: &Deployment) -> Result<()> {
        let Some(remote) = &self.remote else {
            bail!("cannot upload `{}`: no remote cache configured", node.name());
        };
        let archive = archive_name(
            node.name(),
            node.source(),
            node.src_dir().as_deref(),
            &self.config,
        );
        remote.upload_package(
            &archive,
            &deployment.package_dir,
            &node.build_dir(),
            self.config.upload_if_needed,
        )?;
        Ok(())
    }
}
