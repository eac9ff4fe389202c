//! System library lookup.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::errors::BuildError;
use crate::util::platform::Platform;

const FRAMEWORK_PREFIX: &str = "-framework ";

/// Where to look for system libraries on Linux.
#[derive(Debug, Clone)]
pub struct SyslibSearch {
    roots: Vec<PathBuf>,
}

impl Default for SyslibSearch {
    fn default() -> Self {
        SyslibSearch {
            roots: vec![
                PathBuf::from("/usr/lib/x86_64-linux-gnu"),
                PathBuf::from("/usr/lib"),
            ],
        }
    }
}

impl SyslibSearch {
    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        SyslibSearch { roots }
    }

    fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for (i, root) in self.roots.iter().enumerate() {
            if i == 0 {
                out.push(root.join(name));
            }
            out.push(root.join(format!("lib{}.so", name)));
            out.push(root.join(format!("lib{}.a", name)));
        }
        out
    }

    /// Resolve a system library name for the linker.
    ///
    /// Apple platforms expect `-framework Name`. On Linux the library must
    /// exist in one of the search roots; the bare name is returned since the
    /// linker resolves it. Other platforms pass the name through.
    pub fn find(
        &self,
        platform: Platform,
        node: &str,
        name: &str,
        install_hint: Option<&str>,
        required: bool,
    ) -> Result<Option<String>> {
        match platform {
            Platform::MacOS | Platform::IOS => {
                if !name.starts_with(FRAMEWORK_PREFIX) {
                    bail!(
                        "`{}` expected a system library of the form `-framework Name`, got `{}`",
                        node,
                        name
                    );
                }
                Ok(Some(name.to_string()))
            }
            Platform::Linux => {
                if self.candidates(name).iter().any(|c| c.is_file()) {
                    return Ok(Some(name.to_string()));
                }
                if !required {
                    return Ok(None);
                }
                let install_hint = Some(match install_hint {
                    Some(pkg) => format!("sudo apt install {}", pkg),
                    None => "install it with your system package manager".to_string(),
                });
                Err(BuildError::MissingSystemLibrary {
                    node: node.to_string(),
                    library: name.to_string(),
                    install_hint,
                }
                .into())
            }
            _ => Ok(Some(name.to_string())),
        }
    }

    /// Look up system libraries recorded in a package again, e.g.
    /// `/usr/lib/x86_64-linux-gnu/liblzma.so` becomes `lzma`. Libraries that
    /// cannot be found keep their recorded form.
    pub fn reload(&self, platform: Platform, node: &str, syslibs: &[String]) -> Vec<String> {
        syslibs
            .iter()
            .map(|syslib| {
                if syslib.starts_with(FRAMEWORK_PREFIX) {
                    return syslib.clone();
                }
                let name = reset_syslib_name(syslib);
                match self.find(platform, node, &name, None, false) {
                    Ok(Some(found)) => found,
                    _ => syslib.clone(),
                }
            })
            .collect()
    }
}

/// `/usr/lib/x86_64-linux-gnu/liblzma.so` -> `lzma`.
pub fn reset_syslib_name(syslib: &str) -> String {
    let file = Path::new(syslib)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| syslib.to_string());
    if let Some(stem) = file.strip_prefix("lib") {
        if let Some(name) = stem.strip_suffix(".so") {
            return name.to_string();
        }
        if let Some(name) = stem.strip_suffix(".a") {
            return name.to_string();
        }
    }
    file
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reset_syslib_name() {
        assert_eq!(reset_syslib_name("/usr/lib/x86_64-linux-gnu/liblzma.so"), "lzma");
        assert_eq!(reset_syslib_name("libdl.a"), "dl");
        assert_eq!(reset_syslib_name("pthread"), "pthread");
    }

    #[test]
    fn test_find_on_linux() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("libdl.so"), "").unwrap();
        let search = SyslibSearch::with_roots(vec![tmp.path().to_path_buf()]);

        let found = search.find(Platform::Linux, "app", "dl", None, true).unwrap();
        assert_eq!(found.as_deref(), Some("dl"));

        let missing = search.find(Platform::Linux, "app", "lzma", None, false).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_required_missing_library_is_fatal_with_hint() {
        let tmp = TempDir::new().unwrap();
        let search = SyslibSearch::with_roots(vec![tmp.path().to_path_buf()]);

        let err = search
            .find(Platform::Linux, "zlib", "lzma", Some("liblzma-dev"), true)
            .unwrap_err();
        match err.downcast_ref::<BuildError>() {
            Some(BuildError::MissingSystemLibrary { install_hint, .. }) => {
                assert_eq!(install_hint.as_deref(), Some("sudo apt install liblzma-dev"));
            }
            other => panic!("expected MissingSystemLibrary, got {:?}", other),
        }
    }

    #[test]
    fn test_apple_requires_framework_form() {
        let search = SyslibSearch::default();
        assert!(search.find(Platform::MacOS, "app", "Foundation", None, true).is_err());
        let ok = search
            .find(Platform::MacOS, "app", "-framework Foundation", None, true)
            .unwrap();
        assert_eq!(ok.as_deref(), Some("-framework Foundation"));
    }

    #[test]
    fn test_reload_falls_back_to_recorded_name() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("libz.so"), "").unwrap();
        let search = SyslibSearch::with_roots(vec![tmp.path().to_path_buf()]);

        let reloaded = search.reload(
            Platform::Linux,
            "app",
            &["/usr/lib/libz.so".to_string(), "/opt/libfoo.so".to_string()],
        );
        assert_eq!(reloaded, vec!["z".to_string(), "/opt/libfoo.so".to_string()]);
    }
}
