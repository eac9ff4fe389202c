//! Library file classification.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

const STATIC_EXTENSIONS: &[&str] = &[".a", ".lib"];
const DYNAMIC_EXTENSIONS: &[&str] = &[
    ".dll",
    ".pdb",
    ".dylib",
    ".so",
    ".bundle",
    ".framework",
    ".aar",
];

/// Suffix of MSVC intermediate files that end up next to libraries.
const RECIPE_SUFFIX: &str = ".lib.recipe";

fn ends_with_any(path: &str, exts: &[&str]) -> bool {
    exts.iter().any(|ext| path.ends_with(ext))
}

pub fn is_static_library(path: &Path) -> bool {
    ends_with_any(&path.to_string_lossy(), STATIC_EXTENSIONS)
}

/// Shared objects, dynamic libraries, frameworks and their debug symbols.
pub fn is_dynamic_library(path: &Path) -> bool {
    ends_with_any(&path.to_string_lossy(), DYNAMIC_EXTENSIONS)
}

pub fn is_library(path: &Path) -> bool {
    is_static_library(path) || is_dynamic_library(path)
}

/// The name a library is de-duplicated by. `-framework X` keeps its full
/// form.
pub fn lib_basename(lib: &str) -> &str {
    if lib.starts_with("-framework ") {
        lib
    } else {
        crate::util::fs::basename(lib)
    }
}

/// Keep one entry per basename. The first occurrence keeps its position but
/// takes the value of the last occurrence.
///
/// Two different libraries that share a file name in separate subtrees are
/// merged into one entry.
pub fn unique_by_basename<T, F>(items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> String,
{
    let mut order: Vec<String> = Vec::new();
    let mut latest: HashMap<String, T> = HashMap::new();
    for item in items {
        let k = key(&item);
        if !latest.contains_key(&k) {
            order.push(k.clone());
        }
        latest.insert(k, item);
    }
    order
        .into_iter()
        .filter_map(|k| latest.remove(&k))
        .collect()
}

/// [`unique_by_basename`] for library paths.
pub fn unique_lib_paths(libs: Vec<PathBuf>) -> Vec<PathBuf> {
    unique_by_basename(libs, |p| lib_basename(&p.to_string_lossy()).to_string())
}

/// [`unique_by_basename`] for system library names.
pub fn unique_syslibs(libs: Vec<String>) -> Vec<String> {
    unique_by_basename(libs, |s| lib_basename(s).to_string())
}

/// Trim entries and drop MSVC recipe files.
pub fn cleanup_libs_list<I, S>(libs: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    libs.into_iter()
        .map(|l| l.as_ref().trim().to_string())
        .filter(|l| !l.is_empty() && !l.ends_with(RECIPE_SUFFIX))
        .collect()
}
