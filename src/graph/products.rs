//! Per-node bookkeeping files kept in the build directory.
//!
//! - `exported_libs`: outputs of the previous build, checked for staleness
//! - `dependency_list`: children at the time of the previous build
//! - `description_tag` / `project_tag`: modification times of the build
//!   description and native project descriptor

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::package::libkind::{cleanup_libs_list, is_library, unique_lib_paths};
use crate::util::fs::{mtime_secs, read_lines, read_to_string, write_string};

pub const EXPORTED_LIBS_FILE: &str = "exported_libs";
pub const DEPENDENCY_LIST_FILE: &str = "dependency_list";
pub const DESCRIPTION_TAG_FILE: &str = "description_tag";
pub const PROJECT_TAG_FILE: &str = "project_tag";

/// Build products recorded by the previous build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedProducts {
    /// Recorded entries that still exist and are libraries
    pub libs: Vec<PathBuf>,
    /// Every recorded entry, unique by file name
    pub products: Vec<PathBuf>,
}

pub fn load_exported_libs(build_dir: &Path) -> Result<RecordedProducts> {
    let entries: Vec<PathBuf> = cleanup_libs_list(read_lines(&build_dir.join(EXPORTED_LIBS_FILE))?)
        .into_iter()
        .map(PathBuf::from)
        .collect();

    let libs = entries
        .iter()
        .filter(|p| p.exists() && is_library(p))
        .cloned()
        .collect();
    Ok(RecordedProducts {
        libs: unique_lib_paths(libs),
        products: unique_lib_paths(entries),
    })
}

pub fn save_exported_libs(build_dir: &Path, products: &[PathBuf]) -> Result<()> {
    let lines = cleanup_libs_list(products.iter().map(|p| p.to_string_lossy().into_owned()));
    write_string(&build_dir.join(EXPORTED_LIBS_FILE), &lines.join("\n"))
}

/// True if a previous build recorded its products.
pub fn has_exported_libs(build_dir: &Path) -> bool {
    build_dir.join(EXPORTED_LIBS_FILE).exists()
}

pub fn first_missing_product(products: &[PathBuf]) -> Option<PathBuf> {
    products.iter().find(|p| !p.exists()).cloned()
}

pub fn save_dependency_list(build_dir: &Path, dependencies: &[String]) -> Result<()> {
    write_string(&build_dir.join(DEPENDENCY_LIST_FILE), &dependencies.join("\n"))
}

/// The first dependency of the previous build missing from `current`.
pub fn find_removed_dependency(build_dir: &Path, current: &[String]) -> Result<Option<String>> {
    let last_build = read_lines(&build_dir.join(DEPENDENCY_LIST_FILE))?;
    Ok(last_build.into_iter().find(|d| !current.contains(d)))
}

/// Compare a source file's modification time with the stored tag without
/// updating it. A missing tag counts as modified; a missing source does not.
pub fn tag_changed(build_dir: &Path, tag_file: &str, source: Option<&Path>) -> bool {
    let Some(mtime) = source.and_then(mtime_secs) else {
        return false;
    };
    let tag_path = build_dir.join(tag_file);
    match read_to_string(&tag_path) {
        Ok(stored) => {
            let changed = stored.trim() != mtime.to_string();
            if changed {
                tracing::debug!("tag change {}: {} -> {}", tag_file, stored.trim(), mtime);
            }
            changed
        }
        Err(_) => true,
    }
}

/// Store the current modification time of `source` as the tag.
pub fn refresh_tag(build_dir: &Path, tag_file: &str, source: Option<&Path>) -> Result<()> {
    if let Some(mtime) = source.and_then(mtime_secs) {
        write_string(&build_dir.join(tag_file), &mtime.to_string())?;
    }
    Ok(())
}
