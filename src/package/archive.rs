//! Package archives.
//!
//! An archive holds `papa.txt` plus every include tree, library and asset
//! the manifest names, stored at the same relative paths the manifest uses.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core::manifest::{Manifest, MANIFEST_FILE};
use crate::util::fs::ensure_dir;

/// Zip entry name for a path relative to the package directory.
fn entry_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Files to archive, relative to `package_dir`, in manifest order.
fn archive_entries(package_dir: &Path, manifest: &Manifest) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut seen = BTreeSet::new();
    let mut push = |rel: PathBuf, files: &mut Vec<PathBuf>| {
        if seen.insert(rel.clone()) {
            files.push(rel);
        }
    };

    for include in &manifest.includes {
        let dir = package_dir.join(include);
        if !dir.exists() {
            tracing::warn!("include {} listed in the manifest does not exist", dir.display());
            continue;
        }
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() {
                let rel = entry
                    .path()
                    .strip_prefix(package_dir)
                    .unwrap_or(entry.path())
                    .to_path_buf();
                push(rel, &mut files);
            }
        }
    }

    for rel in manifest.libs.iter().chain(manifest.assets.iter()) {
        let path = package_dir.join(rel);
        if !path.is_file() {
            bail!(
                "cannot archive {}: file listed in {} does not exist",
                path.display(),
                MANIFEST_FILE
            );
        }
        push(PathBuf::from(rel), &mut files);
    }
    Ok(files)
}

/// Write `package_dir` as a zip archive at `archive_path`.
///
/// The archive is written next to its destination with a `.tmp` suffix and
/// moved into place once complete. Returns the archive size in bytes.
pub fn create_archive(package_dir: &Path, manifest: &Manifest, archive_path: &Path) -> Result<u64> {
    let files = archive_entries(package_dir, manifest)?;
    if let Some(parent) = archive_path.parent() {
        ensure_dir(parent)?;
    }

    let tmp_path = PathBuf::from(format!("{}.tmp", archive_path.display()));
    let out = File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;
    let mut zip = ZipWriter::new(BufWriter::new(out));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(8));

    zip.start_file(MANIFEST_FILE, options)?;
    zip.write_all_from(&package_dir.join(MANIFEST_FILE))?;

    for rel in &files {
        tracing::debug!("adding {}", rel.display());
        zip.start_file(entry_name(rel), options)?;
        zip.write_all_from(&package_dir.join(rel))?;
    }
    zip.finish()
        .with_context(|| format!("failed to finish {}", tmp_path.display()))?;

    if archive_path.exists() {
        fs::remove_file(archive_path)?;
    }
    fs::rename(&tmp_path, archive_path)
        .with_context(|| format!("failed to move archive to {}", archive_path.display()))?;

    Ok(fs::metadata(archive_path)?.len())
}

trait WriteFrom {
    fn write_all_from(&mut self, path: &Path) -> Result<()>;
}

impl<W: io::Write + io::Seek> WriteFrom for ZipWriter<W> {
    fn write_all_from(&mut self, path: &Path) -> Result<()> {
        let mut file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        io::copy(&mut file, self).with_context(|| format!("failed to archive {}", path.display()))?;
        Ok(())
    }
}

/// Extract an archive into `dest`. Entries escaping `dest` are rejected.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("failed to open {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("failed to read zip {}", archive_path.display()))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(rel) = entry.enclosed_name() else {
            bail!("invalid entry name `{}` in {}", entry.name(), archive_path.display());
        };
        let out_path = dest.join(rel);

        if entry.is_dir() {
            ensure_dir(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            ensure_dir(parent)?;
        }
        let mut out = File::create(&out_path)
            .with_context(|| format!("failed to create {}", out_path.display()))?;
        io::copy(&mut entry, &mut out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn deployed_package(dir: &Path) -> Manifest {
        fs::create_dir_all(dir.join("include/zlib")).unwrap();
        fs::create_dir_all(dir.join("lib")).unwrap();
        fs::create_dir_all(dir.join("fonts")).unwrap();
        fs::write(dir.join("include/zlib/zlib.h"), "#pragma once").unwrap();
        fs::write(dir.join("lib/libz.a"), "archive").unwrap();
        fs::write(dir.join("fonts/a.ttf"), "font").unwrap();

        let mut manifest = Manifest::new("zlib");
        manifest.includes.push("include".into());
        manifest.includes.push("include/zlib".into());
        manifest.libs.push("lib/libz.a".into());
        manifest.assets.push("fonts/a.ttf".into());
        fs::write(dir.join(MANIFEST_FILE), manifest.serialize()).unwrap();
        manifest
    }

    #[test]
    fn test_archive_and_extract() {
        let tmp = TempDir::new().unwrap();
        let pkg = tmp.path().join("pkg");
        let manifest = deployed_package(&pkg);

        let zip_path = tmp.path().join("out").join("zlib-linux-x64-release-abc1234.zip");
        let size = create_archive(&pkg, &manifest, &zip_path).unwrap();
        assert!(size > 0);
        assert!(!PathBuf::from(format!("{}.tmp", zip_path.display())).exists());

        let dest = tmp.path().join("extracted");
        extract_archive(&zip_path, &dest).unwrap();
        assert!(dest.join(MANIFEST_FILE).exists());
        assert!(dest.join("include/zlib/zlib.h").exists());
        assert_eq!(fs::read_to_string(dest.join("lib/libz.a")).unwrap(), "archive");
        assert!(dest.join("fonts/a.ttf").exists());

        let parsed = Manifest::load(&dest.join(MANIFEST_FILE), "zlib").unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_missing_lib_fails_archive() {
        let tmp = TempDir::new().unwrap();
        let pkg = tmp.path().join("pkg");
        let mut manifest = deployed_package(&pkg);
        manifest.libs.push("lib/libgone.a".into());

        let err = create_archive(&pkg, &manifest, &tmp.path().join("x.zip")).unwrap_err();
        assert!(err.to_string().contains("libgone.a"));
    }

    #[test]
    fn test_corrupt_archive_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let bad = tmp.path().join("bad.zip");
        fs::write(&bad, "not a zip").unwrap();
        assert!(extract_archive(&bad, &tmp.path().join("out")).is_err());
    }
}
