//! Export helpers handed to [`Target::package`](crate::core::target::Target::package).
//!
//! Missing optional paths are logged and skipped; a target may legitimately
//! lack some export categories.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::asset::Asset;
use crate::core::target::{Exports, TargetContext};
use crate::package::libkind::{cleanup_libs_list, unique_lib_paths, unique_syslibs};
use crate::package::syslib::SyslibSearch;
use crate::util::fs::{glob_files, resolve_path};

/// Collects a node's exports during packaging.
pub struct Exporter<'a> {
    ctx: &'a TargetContext<'a>,
    exports: &'a mut Exports,
    syslibs: SyslibSearch,
}

impl<'a> Exporter<'a> {
    pub fn new(ctx: &'a TargetContext<'a>, exports: &'a mut Exports) -> Self {
        Exporter {
            ctx,
            exports,
            syslibs: SyslibSearch::default(),
        }
    }

    pub fn with_syslib_search(mut self, search: SyslibSearch) -> Self {
        self.syslibs = search;
        self
    }

    pub fn exports(&self) -> &Exports {
        self.exports
    }

    fn root(&self, from_build_dir: bool) -> PathBuf {
        match (from_build_dir, self.ctx.src_dir) {
            (false, Some(src)) => src.to_path_buf(),
            _ => self.ctx.build_dir.to_path_buf(),
        }
    }

    /// Export an include directory relative to the source directory, or the
    /// build directory if `from_build_dir` is set.
    pub fn include(&mut self, rel: &str, from_build_dir: bool) -> bool {
        let path = resolve_path(&self.root(from_build_dir), rel);
        if !path.exists() {
            tracing::debug!("{}: include path {} does not exist", self.ctx.name, path.display());
            return false;
        }
        if !self.exports.includes.contains(&path) {
            self.exports.includes.push(path);
        }
        true
    }

    /// Export a single library file.
    pub fn lib(&mut self, rel: &str, from_src_dir: bool) -> bool {
        let path = resolve_path(&self.root(!from_src_dir), rel);
        if !path.exists() {
            tracing::warn!("{}: export_lib failed to find {}", self.ctx.name, path.display());
            return false;
        }
        self.exports.libs.push(path);
        let libs = std::mem::take(&mut self.exports.libs);
        self.exports.libs = unique_lib_paths(libs);
        true
    }

    /// Export libraries matching glob patterns under `dir`. Anything under
    /// `dir/deploy/` is ignored. Returns true if any library is exported.
    pub fn libs(&mut self, dir: &str, patterns: &[String], from_src_dir: bool) -> Result<bool> {
        let root = resolve_path(&self.root(!from_src_dir), dir);
        let deploy_dir = root.join("deploy");
        let found = glob_files(&root, patterns)?;
        let found: Vec<String> = cleanup_libs_list(
            found
                .iter()
                .filter(|p| !p.starts_with(&deploy_dir))
                .map(|p| p.to_string_lossy().into_owned()),
        );

        self.exports.libs.extend(found.into_iter().map(PathBuf::from));
        let libs = std::mem::take(&mut self.exports.libs);
        self.exports.libs = unique_lib_paths(libs);
        Ok(!self.exports.libs.is_empty())
    }

    /// Export a system library. A missing required library is fatal unless
    /// this run is cleaning, in which case the bare name is exported.
    pub fn syslib(&mut self, name: &str, install_hint: Option<&str>, required: bool) -> Result<bool> {
        let found = match self.syslibs.find(
            self.ctx.config.platform,
            self.ctx.name,
            name,
            install_hint,
            required,
        ) {
            Ok(found) => found,
            Err(_) if self.ctx.config.clean => Some(name.to_string()),
            Err(e) => return Err(e),
        };
        let Some(lib) = found else {
            return Ok(false);
        };
        self.exports.syslibs.push(lib);
        let syslibs = std::mem::take(&mut self.exports.syslibs);
        self.exports.syslibs = unique_syslibs(syslibs);
        Ok(true)
    }

    /// Export a single asset file.
    pub fn asset(&mut self, rel: &str, category: Option<&str>, from_src_dir: bool) -> bool {
        let full = resolve_path(&self.root(!from_src_dir), rel);
        if !full.exists() {
            tracing::warn!("{}: export_asset failed to find {}", self.ctx.name, full.display());
            return false;
        }
        self.exports.assets.push(Asset::new(rel, full, category));
        true
    }

    /// Export every file matching `patterns` under an asset directory.
    pub fn assets(
        &mut self,
        dir: &str,
        patterns: &[String],
        category: Option<&str>,
        from_src_dir: bool,
    ) -> Result<bool> {
        let dir = format!("{}/", dir.trim_end_matches('/'));
        let root = resolve_path(&self.root(!from_src_dir), &dir);
        let files: Vec<PathBuf> = glob_files(&root, patterns)?
            .into_iter()
            .filter(|p| p.is_file())
            .collect();
        if files.is_empty() {
            return Ok(false);
        }
        for full in files {
            self.exports.assets.push(Asset::new(&dir, full, category));
        }
        Ok(true)
    }

    /// Add a file whose absence should force a rebuild.
    pub fn build_product(&mut self, path: impl AsRef<Path>) {
        let path = resolve_path(self.ctx.build_dir, &path.as_ref().to_string_lossy());
        if !self.exports.build_products.contains(&path) {
            self.exports.build_products.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::config::{BuildConfig, Verb};
    use tempfile::TempDir;

    #[test]
    fn test_exports_from_src_and_build_dirs() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let build = tmp.path().join("build");
        std::fs::create_dir_all(src.join("include")).unwrap();
        std::fs::create_dir_all(src.join("data/fonts")).unwrap();
        std::fs::create_dir_all(build.join("lib")).unwrap();
        std::fs::create_dir_all(build.join("deploy")).unwrap();
        std::fs::write(src.join("data/fonts/a.ttf"), "").unwrap();
        std::fs::write(build.join("lib/libfoo.a"), "").unwrap();
        std::fs::write(build.join("lib/libfoo.so"), "").unwrap();
        std::fs::write(build.join("deploy/libfoo.a"), "").unwrap();

        let config = BuildConfig::for_verb(Verb::Build);
        let ctx = TargetContext {
            name: "foo",
            src_dir: Some(&src),
            build_dir: &build,
            config: &config,
            args: &[],
            is_root: false,
        };
        let mut exports = Exports::default();
        let mut exporter = Exporter::new(&ctx, &mut exports);

        assert!(exporter.include("include", false));
        assert!(!exporter.include("missing", false));
        assert!(exporter.libs(".", &["**/*.a".to_string(), "**/*.so".to_string()], false).unwrap());
        assert!(exporter.asset("data/fonts/a.ttf", Some("fonts"), true));

        assert_eq!(exports.includes, vec![src.join("include")]);
        assert_eq!(exports.libs.len(), 2);
        assert!(exports.libs.iter().all(|l| !l.starts_with(build.join("deploy"))));
        assert_eq!(exports.assets[0].out_path, "fonts/a.ttf");
    }

    #[test]
    fn test_missing_syslib_tolerated_while_cleaning() {
        let tmp = TempDir::new().unwrap();
        let mut config = BuildConfig::for_verb(Verb::Clean);
        config.platform = crate::util::platform::Platform::Linux;
        let ctx = TargetContext {
            name: "foo",
            src_dir: None,
            build_dir: tmp.path(),
            config: &config,
            args: &[],
            is_root: false,
        };
        let mut exports = Exports::default();
        let mut exporter = Exporter::new(&ctx, &mut exports)
            .with_syslib_search(SyslibSearch::with_roots(vec![tmp.path().to_path_buf()]));

        assert!(exporter.syslib("lzma", Some("liblzma-dev"), true).unwrap());
        assert_eq!(exports.syslibs, vec!["lzma".to_string()]);
    }
}
