//! Remote package cache.
//!
//! Deployed packages are zipped and stored under a deterministic archive
//! name, so any machine building the same dependency for the same platform
//! can fetch the package instead of building from source.

mod transport;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};

pub use transport::{DirTransport, HttpTransport, RemoteTransport};

use crate::core::manifest::{Manifest, MANIFEST_FILE};
use crate::core::source::SourceDescriptor;
use crate::core::target::Exports;
use crate::package::archive::{create_archive, extract_archive};
use crate::package::libkind::{is_library, unique_lib_paths};
use crate::package::syslib::SyslibSearch;
use crate::sources::git::short_head_commit;
use crate::util::config::BuildConfig;
use crate::util::platform::Platform;

/// Archive key of a node: `{name}-{platform}-{arch}-{release|debug}-{commit}`.
///
/// Packages with a full archive name use it verbatim; versioned packages
/// use their version in place of the commit. Sources that are not git
/// checkouts use `latest`.
pub fn archive_name(
    name: &str,
    source: &SourceDescriptor,
    src_dir: Option<&Path>,
    config: &BuildConfig,
) -> String {
    let version = match source {
        SourceDescriptor::Package(pkg) if !pkg.full_archive_name.is_empty() => {
            return pkg.full_archive_name.clone();
        }
        SourceDescriptor::Package(pkg) if !pkg.version.is_empty() => pkg.version.clone(),
        _ => src_dir
            .and_then(short_head_commit)
            .unwrap_or_else(|| "latest".to_string()),
    };
    format!(
        "{}-{}-{}-{}-{}",
        name,
        config.platform,
        config.arch,
        config.build_type(),
        version
    )
}

/// Exports and child dependencies re-hydrated from a fetched package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rehydrated {
    pub exports: Exports,
    pub dependencies: Vec<SourceDescriptor>,
}

/// Read `<dir>/papa.txt` and build the exports it describes.
///
/// Nothing is returned unless the manifest belongs to `name`, so a
/// mismatched package never leaks into a node's exports.
pub fn reconfigure_from_fetched(name: &str, dir: &Path, platform: Platform) -> Result<Rehydrated> {
    let manifest = Manifest::load(&dir.join(MANIFEST_FILE), name)?;

    let lib_paths = manifest.lib_paths(dir);
    let libs = lib_paths
        .iter()
        .filter(|l| l.exists() && is_library(l))
        .cloned()
        .collect();
    let exports = Exports {
        includes: manifest.include_paths(dir),
        libs: unique_lib_paths(libs),
        syslibs: SyslibSearch::default().reload(platform, name, &manifest.syslibs),
        assets: manifest.asset_entries(dir),
        build_products: unique_lib_paths(lib_paths),
    };
    tracing::debug!("{}: reconfigured from package ({})", name, manifest.summary());
    Ok(Rehydrated {
        exports,
        dependencies: manifest.dependencies,
    })
}

/// Fetch and upload access to one remote cache.
pub struct RemoteCache {
    transport: Box<dyn RemoteTransport>,
}

impl std::fmt::Debug for RemoteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCache")
            .field("location", &self.transport.location())
            .finish()
    }
}

impl RemoteCache {
    pub fn new(transport: Box<dyn RemoteTransport>) -> Self {
        RemoteCache { transport }
    }

    /// `http(s)://` urls use HTTP, `file://` urls and plain paths use a
    /// directory.
    pub fn from_url(url: &str, timeout: Duration) -> Result<Self> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(RemoteCache::new(Box::new(HttpTransport::new(url, timeout)?)));
        }
        let dir = if url.starts_with("file://") {
            match url::Url::parse(url).ok().and_then(|u| u.to_file_path().ok()) {
                Some(dir) => dir,
                None => bail!("invalid remote cache url: {}", url),
            }
        } else {
            PathBuf::from(url)
        };
        Ok(RemoteCache::new(Box::new(DirTransport::new(dir))))
    }

    pub fn location(&self) -> String {
        self.transport.location()
    }

    /// Make `<build_dir>/<archive>.zip` available and unpack it into
    /// `build_dir`. A previously downloaded archive is reused; a corrupt one
    /// is deleted and fetched again. Returns false if the remote does not
    /// have the archive.
    pub fn fetch_into(&self, archive: &str, build_dir: &Path) -> Result<bool> {
        let local = build_dir.join(format!("{}.zip", archive));
        if local.exists() {
            tracing::info!("  cache {}", local.display());
            match extract_archive(&local, build_dir) {
                Ok(()) => return Ok(true),
                Err(e) => {
                    tracing::warn!("removing corrupt package {}: {:#}", local.display(), e);
                    std::fs::remove_file(&local)?;
                }
            }
        }

        if !self.transport.fetch(archive, &local)? {
            return Ok(false);
        }
        tracing::info!("  unzip {}", archive);
        if let Err(e) = extract_archive(&local, build_dir) {
            std::fs::remove_file(&local)?;
            return Err(e);
        }
        Ok(true)
    }

    /// Archive the deployed package at `package_dir` and upload it. With
    /// `if_needed`, nothing is uploaded when the remote already has the
    /// archive. Returns true if an upload happened.
    pub fn upload_package(
        &self,
        archive: &str,
        package_dir: &Path,
        build_dir: &Path,
        if_needed: bool,
    ) -> Result<bool> {
        let manifest_path = package_dir.join(MANIFEST_FILE);
        let text = crate::util::fs::read_to_string(&manifest_path)?;
        let manifest = Manifest::parse(&text)?;

        if if_needed && self.transport.exists(archive)? {
            tracing::info!("  upload skipped: {} already exists", archive);
            return Ok(false);
        }

        let zip = build_dir.join(format!("{}.zip", archive));
        let size = create_archive(package_dir, &manifest, &zip)?;
        tracing::info!("  upload {} ({} bytes) -> {}", archive, size, self.location());
        self.transport.upload(&zip)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::{LocalSource, PackageSource};
    use crate::core::BuildError;
    use crate::util::platform::Arch;
    use std::fs;
    use tempfile::TempDir;

    fn linux_release() -> BuildConfig {
        let mut config = BuildConfig::default();
        config.platform = Platform::Linux;
        config.arch = Arch::X64;
        config.release = true;
        config
    }

    fn write_package(dir: &Path, name: &str) {
        fs::create_dir_all(dir.join("include")).unwrap();
        fs::create_dir_all(dir.join("lib")).unwrap();
        fs::write(dir.join("include/z.h"), "").unwrap();
        fs::write(dir.join("lib/libz.a"), "z").unwrap();
        fs::write(
            dir.join(MANIFEST_FILE),
            format!("P {}\nD src core,../core,,,\nI include\nL lib/libz.a\nS -framework Foundation", name),
        )
        .unwrap();
    }

    #[test]
    fn test_archive_names() {
        let config = linux_release();
        let local = SourceDescriptor::Local(LocalSource::new("zlib", "zlib"));
        assert_eq!(
            archive_name("zlib", &local, None, &config),
            "zlib-linux-x64-release-latest"
        );

        let pkg = SourceDescriptor::Package(PackageSource::new("ssl", "3.0", ""));
        assert_eq!(archive_name("ssl", &pkg, None, &config), "ssl-linux-x64-release-3.0");

        let full = SourceDescriptor::Package(PackageSource::new("ssl", "", "ssl-custom-build"));
        assert_eq!(archive_name("ssl", &full, None, &config), "ssl-custom-build");
    }

    #[test]
    fn test_reconfigure_from_fetched() {
        let tmp = TempDir::new().unwrap();
        write_package(tmp.path(), "zlib");

        let rehydrated = reconfigure_from_fetched("zlib", tmp.path(), Platform::MacOS).unwrap();
        assert_eq!(rehydrated.exports.includes, vec![tmp.path().join("include")]);
        assert_eq!(rehydrated.exports.libs, vec![tmp.path().join("lib/libz.a")]);
        assert_eq!(rehydrated.exports.syslibs, vec!["-framework Foundation".to_string()]);
        assert_eq!(rehydrated.dependencies.len(), 1);
        assert_eq!(rehydrated.dependencies[0].name(), "core");
    }

    #[test]
    fn test_reconfigure_rejects_other_project() {
        let tmp = TempDir::new().unwrap();
        write_package(tmp.path(), "png");

        let err = reconfigure_from_fetched("zlib", tmp.path(), Platform::Linux).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::ManifestMismatch { .. })
        ));
    }

    #[test]
    fn test_upload_then_fetch_through_directory_remote() {
        let tmp = TempDir::new().unwrap();
        let remote = RemoteCache::from_url(
            &tmp.path().join("remote").to_string_lossy(),
            Duration::from_secs(5),
        )
        .unwrap();

        let package = tmp.path().join("producer/deploy/zlib");
        write_package(&package, "zlib");
        let archive = "zlib-linux-x64-release-latest";
        assert!(remote
            .upload_package(archive, &package, &tmp.path().join("producer"), true)
            .unwrap());
        assert!(!remote
            .upload_package(archive, &package, &tmp.path().join("producer"), true)
            .unwrap());

        let consumer = tmp.path().join("consumer");
        fs::create_dir_all(&consumer).unwrap();
        assert!(remote.fetch_into(archive, &consumer).unwrap());
        assert!(consumer.join("lib/libz.a").exists());
        assert!(consumer.join(format!("{}.zip", archive)).exists());

        assert!(!remote.fetch_into("missing-archive", &consumer).unwrap());
    }

    #[test]
    fn test_corrupt_local_archive_is_refetched() {
        let tmp = TempDir::new().unwrap();
        let remote_dir = tmp.path().join("remote");
        let remote = RemoteCache::from_url(&remote_dir.to_string_lossy(), Duration::from_secs(5))
            .unwrap();
        let package = tmp.path().join("pkg");
        write_package(&package, "zlib");
        remote
            .upload_package("zlib-a", &package, &tmp.path().join("out"), false)
            .unwrap();

        let consumer = tmp.path().join("consumer");
        fs::create_dir_all(&consumer).unwrap();
        fs::write(consumer.join("zlib-a.zip"), "garbage").unwrap();
        assert!(remote.fetch_into("zlib-a", &consumer).unwrap());
        assert!(consumer.join(MANIFEST_FILE).exists());
    }
}
