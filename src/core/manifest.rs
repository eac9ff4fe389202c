//! Package manifest (`papa.txt`) codec.
//!
//! A manifest describes one deployed package: the project it was built from,
//! the dependencies it was built against, and the includes, libraries,
//! system libraries and assets it exports. Each line is `<tag> <value>`:
//!
//! ```text
//! P MyLib
//! D git ExampleRemote,https://x/y.git,,,,
//! I include
//! L MyLib.lib
//! S pthread
//! A fonts/a.ttf
//! ```
//!
//! Paths on `I`, `L` and `A` lines are relative to the manifest's own
//! directory so packages stay relocatable.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::asset::Asset;
use crate::core::errors::BuildError;
use crate::core::source::SourceDescriptor;

/// File name of a package manifest.
pub const MANIFEST_FILE: &str = "papa.txt";

/// Parsed contents of a package manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub project_name: String,
    pub dependencies: Vec<SourceDescriptor>,
    pub includes: Vec<String>,
    pub libs: Vec<String>,
    pub syslibs: Vec<String>,
    pub assets: Vec<String>,
}

impl Manifest {
    pub fn new(project_name: impl Into<String>) -> Self {
        Manifest {
            project_name: project_name.into(),
            ..Default::default()
        }
    }

    /// Parse manifest text. Lines with unknown tags are ignored.
    pub fn parse(text: &str) -> Result<Self, BuildError> {
        let mut manifest = Manifest::default();

        for raw in text.lines() {
            let line = raw.trim_end();
            let Some((tag, value)) = split_tag(line) else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                return Err(BuildError::format("manifest", line, "missing value"));
            }
            match tag {
                'P' => manifest.project_name = value.to_string(),
                'D' => manifest.dependencies.push(SourceDescriptor::parse(value)?),
                'I' => manifest.includes.push(value.to_string()),
                'L' => manifest.libs.push(value.to_string()),
                'S' => manifest.syslibs.push(value.to_string()),
                'A' => manifest.assets.push(value.to_string()),
                _ => {}
            }
        }

        Ok(manifest)
    }

    /// Parse manifest text and require it to belong to `expected`.
    pub fn parse_for(text: &str, expected: &str, path: &Path) -> Result<Self, BuildError> {
        let manifest = Manifest::parse(text)?;
        if manifest.project_name != expected {
            return Err(BuildError::ManifestMismatch {
                expected: expected.to_string(),
                found: manifest.project_name,
                path: path.to_path_buf(),
            });
        }
        Ok(manifest)
    }

    /// Read and validate a manifest file.
    pub fn load(path: &Path, expected: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read package manifest: {}", path.display()))?;
        Ok(Manifest::parse_for(&text, expected, path)?)
    }

    /// Serialize in canonical order: `P`, then `D`, `I`, `L`, `S`, `A`.
    pub fn serialize(&self) -> String {
        let mut lines = Vec::with_capacity(
            1 + self.dependencies.len()
                + self.includes.len()
                + self.libs.len()
                + self.syslibs.len()
                + self.assets.len(),
        );
        lines.push(format!("P {}", self.project_name));
        lines.extend(self.dependencies.iter().map(|d| format!("D {}", d.serialize())));
        lines.extend(self.includes.iter().map(|i| format!("I {}", i)));
        lines.extend(self.libs.iter().map(|l| format!("L {}", l)));
        lines.extend(self.syslibs.iter().map(|s| format!("S {}", s)));
        lines.extend(self.assets.iter().map(|a| format!("A {}", a)));
        lines.join("\n")
    }

    /// Include directories resolved against the package directory.
    pub fn include_paths(&self, package_dir: &Path) -> Vec<PathBuf> {
        self.includes.iter().map(|i| package_dir.join(i)).collect()
    }

    /// Library files resolved against the package directory.
    pub fn lib_paths(&self, package_dir: &Path) -> Vec<PathBuf> {
        self.libs.iter().map(|l| package_dir.join(l)).collect()
    }

    /// Assets located inside the package directory.
    pub fn asset_entries(&self, package_dir: &Path) -> Vec<Asset> {
        self.assets
            .iter()
            .map(|a| Asset::from_package(package_dir, a))
            .collect()
    }

    /// One-line summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "{} includes, {} libs, {} syslibs, {} assets",
            self.includes.len(),
            self.libs.len(),
            self.syslibs.len(),
            self.assets.len()
        )
    }
}

/// Split `X value` into its tag, for the tags this format knows.
fn split_tag(line: &str) -> Option<(char, &str)> {
    let mut chars = line.chars();
    let tag = chars.next()?;
    if chars.next() != Some(' ') {
        return None;
    }
    match tag {
        'P' | 'D' | 'I' | 'L' | 'S' | 'A' => Some((tag, &line[2..])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::{GitSource, LocalSource, PackageSource};
    use tempfile::TempDir;

    #[test]
    fn test_parse_concrete_manifest() {
        let text = "P MyLib\nD git ExampleRemote,https://x/y.git,,,,\nI include\nL MyLib.lib";
        let manifest = Manifest::parse(text).unwrap();

        assert_eq!(manifest.project_name, "MyLib");
        assert_eq!(manifest.dependencies.len(), 1);
        match &manifest.dependencies[0] {
            SourceDescriptor::Git(g) => {
                assert_eq!(g.name, "ExampleRemote");
                assert_eq!(g.url, "https://x/y.git");
                assert!(g.branch.is_empty());
                assert!(g.tag.is_empty());
                assert!(g.build_file.is_empty());
            }
            other => panic!("expected a git dependency, got {:?}", other),
        }
        assert_eq!(manifest.includes, vec!["include"]);
        assert_eq!(manifest.libs, vec!["MyLib.lib"]);
        assert!(manifest.syslibs.is_empty());
        assert!(manifest.assets.is_empty());
    }

    #[test]
    fn test_serialize_is_canonical_and_parses_back() {
        let mut manifest = Manifest::new("app");
        manifest.assets.push("fonts/a.ttf".into());
        manifest.syslibs.push("pthread".into());
        manifest.libs.push("lib/libapp.a".into());
        manifest.includes.push("include".into());
        manifest.includes.push("include/app".into());
        manifest
            .dependencies
            .push(SourceDescriptor::Local(LocalSource::new("core", "../core")));
        manifest
            .dependencies
            .push(SourceDescriptor::Package(PackageSource::new("ssl", "3.0", "")));
        manifest.dependencies.push(SourceDescriptor::Git(
            GitSource::new("zlib", "https://x/zlib.git").unwrap().with_tag("v1.3"),
        ));

        let text = manifest.serialize();
        let tags: Vec<char> = text.lines().filter_map(|l| l.chars().next()).collect();
        assert_eq!(tags, vec!['P', 'D', 'D', 'D', 'I', 'I', 'L', 'S', 'A']);
        assert_eq!(Manifest::parse(&text).unwrap(), manifest);
    }

    #[test]
    fn test_unknown_tags_are_ignored() {
        let text = "P lib\nX future stuff\nV 2\n\nL liblib.a";
        let manifest = Manifest::parse(text).unwrap();
        assert_eq!(manifest.libs, vec!["liblib.a"]);
    }

    #[test]
    fn test_bad_dependency_line_is_fatal() {
        let err = Manifest::parse("P lib\nD hg foo,bar").unwrap_err();
        assert!(matches!(err, BuildError::Format { .. }));
    }

    #[test]
    fn test_mismatched_project_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_FILE);
        std::fs::write(&path, "P OtherLib\nL other.lib").unwrap();

        let err = Manifest::load(&path, "MyLib").unwrap_err();
        match err.downcast_ref::<BuildError>() {
            Some(BuildError::ManifestMismatch { expected, found, .. }) => {
                assert_eq!(expected, "MyLib");
                assert_eq!(found, "OtherLib");
            }
            other => panic!("expected ManifestMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_paths_resolve_against_package_dir() {
        let manifest = Manifest::parse("P a\nI include\nL lib/liba.so\nA data/x.bin").unwrap();
        let dir = Path::new("/pkgs/a");
        assert_eq!(manifest.include_paths(dir), vec![PathBuf::from("/pkgs/a/include")]);
        assert_eq!(manifest.lib_paths(dir), vec![PathBuf::from("/pkgs/a/lib/liba.so")]);
        assert_eq!(manifest.asset_entries(dir)[0].src_path, PathBuf::from("/pkgs/a/data/x.bin"));
    }
}
