//! Exported asset files.

use std::path::{Path, PathBuf};

/// A file a project ships alongside its libraries, such as fonts or models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Path inside a deployed package, always relative
    pub out_path: String,
    /// Where the file currently lives
    pub src_path: PathBuf,
    /// Deployment category replacing the source directory in `out_path`
    pub category: Option<String>,
}

impl Asset {
    /// Create an asset from its declared relative path and resolved location.
    ///
    /// The directory part of `rel_path` is kept in the output path, unless a
    /// category is given, in which case the category replaces it:
    /// `data/fonts/a.ttf` stays `data/fonts/a.ttf`, or becomes `fonts/a.ttf`
    /// with category `fonts`.
    pub fn new(rel_path: &str, src_path: impl Into<PathBuf>, category: Option<&str>) -> Self {
        let src_path = src_path.into();
        let rel = rel_path.replace('\\', "/");
        let rel_dir = rel
            .rfind('/')
            .map(|i| rel[..i].trim_end_matches('/').to_string())
            .unwrap_or_default();

        let full = src_path.to_string_lossy().replace('\\', "/");
        let tail = if rel_dir.is_empty() {
            full.rsplit('/').next().unwrap_or(&full).to_string()
        } else {
            match full.find(&rel_dir) {
                Some(i) => full[i + rel_dir.len()..].trim_start_matches('/').to_string(),
                None => full.rsplit('/').next().unwrap_or(&full).to_string(),
            }
        };

        let out_path = match category {
            Some(cat) if !cat.is_empty() => format!("{}/{}", cat, tail),
            _ if rel_dir.is_empty() => tail,
            _ => format!("{}/{}", rel_dir, tail),
        };

        Asset {
            out_path,
            src_path,
            category: category.filter(|c| !c.is_empty()).map(str::to_string),
        }
    }

    /// An asset re-hydrated from a package directory.
    pub fn from_package(package_dir: &Path, out_path: &str) -> Self {
        Asset {
            out_path: out_path.to_string(),
            src_path: package_dir.join(out_path),
            category: None,
        }
    }

    pub fn file_name(&self) -> &str {
        self.out_path.rsplit('/').next().unwrap_or(&self.out_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_keeps_relative_dir() {
        let asset = Asset::new("data/fonts/a.ttf", "/src/proj/data/fonts/a.ttf", None);
        assert_eq!(asset.out_path, "data/fonts/a.ttf");
        assert_eq!(asset.file_name(), "a.ttf");
    }

    #[test]
    fn test_asset_category_replaces_dir() {
        let asset = Asset::new("data/fonts/a.ttf", "/src/proj/data/fonts/a.ttf", Some("fonts"));
        assert_eq!(asset.out_path, "fonts/a.ttf");
    }

    #[test]
    fn test_asset_directory_export_keeps_subdirs() {
        let asset = Asset::new("models/", "/src/proj/models/cnn/net.onnx", None);
        assert_eq!(asset.out_path, "models/cnn/net.onnx");

        let asset = Asset::new("models/", "/src/proj/models/cnn/net.onnx", Some("nets"));
        assert_eq!(asset.out_path, "nets/cnn/net.onnx");
    }

    #[test]
    fn test_asset_without_dir() {
        let asset = Asset::new("LICENSE", "/src/proj/LICENSE", None);
        assert_eq!(asset.out_path, "LICENSE");
    }
}
