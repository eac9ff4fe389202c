//! Filesystem utilities.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use glob::glob;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        make_writable(path);
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Git object files are read-only on Windows, which blocks `remove_dir_all`.
#[cfg(windows)]
fn make_writable(path: &Path) {
    for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
        if let Ok(meta) = entry.metadata() {
            let mut perms = meta.permissions();
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            let _ = fs::set_permissions(entry.path(), perms);
        }
    }
}

#[cfg(not(windows))]
fn make_writable(_path: &Path) {}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// True if the directory is missing or contains no entries.
pub fn is_dir_empty(path: &Path) -> bool {
    match fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Read the non-empty, trimmed lines of a file. A missing file yields no lines.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(read_to_string(path)?
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect())
}

/// Write a string to a file, creating parent directories if needed.
///
/// The contents go to a temporary file in the same directory first, so a
/// reader never sees a half-written record.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temporary file in {}", parent.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("failed to write file: {}", path.display()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to write file: {}", path.display()))?;
    Ok(())
}

/// Write `contents` only if the file is missing or differs.
///
/// Returns true if the file was written.
pub fn save_if_changed(path: &Path, contents: &str) -> Result<bool> {
    if let Ok(existing) = fs::read_to_string(path) {
        if existing == contents {
            return Ok(false);
        }
    }
    write_string(path, contents)?;
    Ok(true)
}

/// Modification time of a file in whole seconds since the epoch.
pub fn mtime_secs(path: &Path) -> Option<u64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    modified
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

/// True if `dst` exists with the same size and modification time as `src`.
fn is_same_file_state(src: &Path, dst: &Path) -> bool {
    match (fs::metadata(src), fs::metadata(dst)) {
        (Ok(s), Ok(d)) => {
            s.len() == d.len()
                && match (s.modified(), d.modified()) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => false,
                }
        }
        _ => false,
    }
}

/// Copy a single file, skipping the copy when the destination already has
/// the same size and modification time. The source mtime is carried over.
///
/// Returns true if the file was copied.
pub fn copy_file_if_needed(src: &Path, dst: &Path) -> Result<bool> {
    if is_same_file_state(src, dst) {
        return Ok(false);
    }
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;

    if let Ok(modified) = fs::metadata(src).and_then(|m| m.modified()) {
        let file = fs::OpenOptions::new().write(true).open(dst)?;
        file.set_modified(modified)
            .with_context(|| format!("failed to set mtime on {}", dst.display()))?;
    }
    tracing::debug!("copy {} -> {}", src.display(), dst.display());
    Ok(true)
}

/// Copy a file or directory tree into `dst_dir`, keeping the source
/// directory's own name. Only files whose extension is in `filter` are
/// copied when a filter is given.
pub fn copy_tree_if_needed(src: &Path, dst_dir: &Path, filter: Option<&[&str]>) -> Result<usize> {
    let passes = |p: &Path| match filter {
        None => true,
        Some(exts) => p
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| exts.iter().any(|f| f.trim_start_matches('.') == e))
            .unwrap_or(false),
    };

    if src.is_file() {
        let name = src.file_name().unwrap_or_default();
        if passes(src) && copy_file_if_needed(src, &dst_dir.join(name))? {
            return Ok(1);
        }
        return Ok(0);
    }

    let root = src.parent().unwrap_or(src);
    let mut copied = 0;
    for entry in WalkDir::new(src).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() || !passes(path) {
            continue;
        }
        let rel = path.strip_prefix(root).unwrap_or(path);
        if copy_file_if_needed(path, &dst_dir.join(rel))? {
            copied += 1;
        }
    }
    Ok(copied)
}

/// Find files matching glob patterns relative to a base directory.
pub fn glob_files(base: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut results = Vec::new();

    for pattern in patterns {
        let full_pattern = base.join(pattern);
        let pattern_str = full_pattern.to_string_lossy();

        for entry in
            glob(&pattern_str).with_context(|| format!("invalid glob pattern: {}", pattern))?
        {
            match entry {
                Ok(path) => {
                    if path.exists() {
                        results.push(path);
                    }
                }
                Err(e) => {
                    tracing::warn!("glob error: {}", e);
                }
            }
        }
    }

    results.sort();
    results.dedup();
    Ok(results)
}

/// Get the relative path from `base` to `path`.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    pathdiff::diff_paths(path, base).unwrap_or_else(|| path.to_path_buf())
}

/// Join `rel` onto `base` unless it is already absolute.
pub fn resolve_path(base: &Path, rel: &str) -> PathBuf {
    if rel.is_empty() || rel == "." {
        return base.to_path_buf();
    }
    let p = Path::new(rel);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

/// Last path component as a string, or the whole path if it has none.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
