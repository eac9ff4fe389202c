//! Package deployment.
//!
//! Copies a node's gathered exports into its package directory and writes
//! the `papa.txt` manifest describing them. Every path in the manifest is
//! relative to the package directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::core::manifest::{Manifest, MANIFEST_FILE};
use crate::core::target::DeployOptions;
use crate::graph::node::DependencyNode;
use crate::package::gather::{gather, Gathered};
use crate::package::libkind::lib_basename;
use crate::util::fs::{
    basename, copy_file_if_needed, copy_tree_if_needed, ensure_dir, relative_path, write_string,
};

/// Files copied out of include directories.
const INCLUDE_FILTER: &[&str] = &[".h", ".hpp", ".hxx", ".hh", ".c", ".cpp", ".cxx"];

/// Default include directory name, exported as the package's `include`.
const DEFAULT_INCLUDE: &str = "include";

/// A deployed package.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub package_dir: PathBuf,
    pub manifest: Manifest,
    pub gathered: Gathered,
}

fn to_manifest_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Location of a library inside the package: relative to the node's build
/// or source directory when under one, else at the package root.
fn lib_rel_path(lib: &Path, build_dir: &Path, src_dir: Option<&Path>) -> PathBuf {
    if let Ok(rel) = lib.strip_prefix(build_dir) {
        return rel.to_path_buf();
    }
    if let Some(rel) = src_dir.and_then(|s| lib.strip_prefix(s).ok()) {
        return rel.to_path_buf();
    }
    PathBuf::from(basename(&lib.to_string_lossy()))
}

/// Deploy `node` into `<build_dir>/<options.path>`.
pub fn deploy(node: &Arc<DependencyNode>, options: &DeployOptions) -> Result<Deployment> {
    let build_dir = node.build_dir();
    let src_dir = node.src_dir();
    let package_dir = build_dir.join(&options.path);
    ensure_dir(&package_dir)?;
    tracing::info!(
        "{}: deploy {}",
        node.name(),
        relative_path(&build_dir, &package_dir).display()
    );

    let gathered = gather(node, options);
    let mut manifest = Manifest::new(node.name());
    manifest.dependencies = node.children().iter().map(|c| c.source().clone()).collect();

    if !gathered.includes.is_empty() {
        manifest.includes.push(DEFAULT_INCLUDE.to_string());
        let include_root = package_dir.join(DEFAULT_INCLUDE);
        for (owner, include) in &gathered.includes {
            let rel = basename(&include.to_string_lossy()).to_string();
            let dst_dir = if rel == DEFAULT_INCLUDE {
                package_dir.clone()
            } else {
                manifest.includes.push(format!("{}/{}", DEFAULT_INCLUDE, rel));
                include_root.clone()
            };
            tracing::debug!("  I ({}) {}", owner, rel);
            if include.parent() != Some(dst_dir.as_path()) && include.exists() {
                copy_tree_if_needed(include, &dst_dir, Some(INCLUDE_FILTER))?;
            }
        }
    }

    for (owner, lib) in &gathered.libs {
        let rel = lib_rel_path(lib, &build_dir, src_dir.as_deref());
        let out = package_dir.join(&rel);
        tracing::debug!("  L ({}) {}", owner, rel.display());
        if *lib != out {
            copy_file_if_needed(lib, &out)?;
        }
        manifest.libs.push(to_manifest_path(&rel));
    }

    for (owner, syslib) in &gathered.syslibs {
        let name = lib_basename(syslib).to_string();
        tracing::debug!("  S ({}) {}", owner, name);
        manifest.syslibs.push(name);
    }

    for (owner, asset) in &gathered.assets {
        let out = package_dir.join(&asset.out_path);
        tracing::debug!("  A ({}) {}", owner, asset.out_path);
        if asset.src_path != out {
            copy_file_if_needed(&asset.src_path, &out)?;
        }
        manifest.assets.push(asset.out_path.clone());
    }

    write_string(&package_dir.join(MANIFEST_FILE), &manifest.serialize())?;
    tracing::info!("{}: deployed {}", node.name(), gathered.summary());

    Ok(Deployment {
        package_dir,
        manifest,
        gathered,
    })
}
