//! Generated CMake glue exposing dependency exports to a node's build.
//!
//! For every flattened dependency `<Dep>` the file defines
//! `<Dep>_INCLUDES`, `<Dep>_LIB` (its own linkable libs and syslibs) and
//! `<Dep>_LIBS` (the same for its whole subtree), and appends to the
//! aggregate `BURROW_INCLUDES` / `BURROW_LIBS`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::core::target::Exports;
use crate::graph::flatten;
use crate::graph::node::DependencyNode;
use crate::util::fs::save_if_changed;
use crate::util::platform::Platform;

pub const GLUE_FILE: &str = "burrow-dependencies.cmake";

fn cmake_path_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|p| format!("\n    \"{}\"", p.as_ref()))
        .collect()
}

/// Libraries the platform links against, followed by system libraries.
fn linkable_libs(exports: &Exports, platform: Platform) -> Vec<String> {
    let allowed = platform.linkable_extensions();
    let mut libs: Vec<String> = exports
        .libs
        .iter()
        .map(|l| l.to_string_lossy().into_owned())
        .filter(|l| allowed.iter().any(|ext| l.ends_with(ext)))
        .collect();
    libs.extend(exports.syslibs.iter().cloned());
    libs
}

fn hierarchical_libs(node: &Arc<DependencyNode>, platform: Platform) -> Vec<String> {
    let mut libs = linkable_libs(&node.exports(), platform);
    for dep in flatten(node) {
        libs.extend(linkable_libs(&dep.exports(), platform));
    }
    libs
}

/// Render the glue for `deps`, which must already be in link order.
pub fn render(deps: &[Arc<DependencyNode>], platform: Platform) -> String {
    let mut text = String::from("\n# This file is generated by burrow. Do not modify by hand!\n");
    for dep in deps {
        let exports = dep.exports();
        let name = dep.name();
        let includes =
            cmake_path_list(exports.includes.iter().map(|p| p.to_string_lossy().into_owned()));
        let flat = cmake_path_list(linkable_libs(&exports, platform));
        let hierarchical = cmake_path_list(hierarchical_libs(dep, platform));
        text.push_str(&format!(
            "\n# Package {name}\n\
             set({name}_INCLUDES {includes})\n\
             set({name}_LIB {flat})\n\
             set({name}_LIBS {hierarchical})\n\
             set(BURROW_INCLUDES ${{BURROW_INCLUDES}} ${{{name}_INCLUDES}})\n\
             set(BURROW_LIBS     ${{BURROW_LIBS}}     ${{{name}_LIB}})\n"
        ));
    }
    text
}

pub fn glue_path(build_dir: &Path) -> PathBuf {
    build_dir.join(GLUE_FILE)
}

/// Write the node's glue file if its content changed. Does nothing before
/// the build directory exists; removes the file when the node has no
/// dependencies.
pub fn save(node: &Arc<DependencyNode>, platform: Platform) -> Result<()> {
    let build_dir = node.build_dir();
    if !build_dir.exists() {
        return Ok(());
    }
    let path = glue_path(&build_dir);
    let deps = flatten(node);
    if deps.is_empty() {
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        return Ok(());
    }
    if save_if_changed(&path, &render(&deps, platform))? {
        tracing::debug!("{}: updated {}", node.name(), path.display());
    }
    Ok(())
}
