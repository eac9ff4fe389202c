//! Targets configured by `burrow.toml` project files.

mod project;

use std::path::{Path, PathBuf};

use anyhow::Result;

pub use project::{DependencyEntry, ProjectFile, ProjectTarget};

use crate::core::target::{NoopTarget, Target, TargetFactory, TargetRequest};

/// Conventional project file name in a source directory.
pub const PROJECT_FILE: &str = "burrow.toml";

/// Creates a [`ProjectTarget`] for every node that has a project file, and a
/// [`NoopTarget`] for the rest.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjectFactory;

impl ProjectFactory {
    fn project_file(request: &TargetRequest<'_>) -> Option<PathBuf> {
        if let Some(file) = request.build_file {
            return Some(file.to_path_buf());
        }
        request
            .src_dir
            .map(|dir| dir.join(PROJECT_FILE))
            .filter(|file| file.is_file())
    }
}

impl TargetFactory for ProjectFactory {
    fn create(&self, request: &TargetRequest<'_>) -> Result<Box<dyn Target>> {
        match Self::project_file(request) {
            Some(file) => {
                tracing::debug!("{}: using {}", request.name, file.display());
                Ok(Box::new(ProjectTarget::load(&file, request.src_dir)?))
            }
            None => {
                tracing::debug!("{}: no {}, nothing to build", request.name, PROJECT_FILE);
                Ok(Box::new(NoopTarget))
            }
        }
    }
}

/// Name of the project in `dir`: `[project] name`, else the directory name.
pub fn project_name(dir: &Path) -> Result<String> {
    let file = dir.join(PROJECT_FILE);
    if file.is_file() {
        if let Some(name) = ProjectFile::load(&file)?.project.name {
            return Ok(name);
        }
    }
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::{LocalSource, SourceDescriptor};
    use tempfile::TempDir;

    #[test]
    fn test_missing_project_file_gives_noop_target() {
        let tmp = TempDir::new().unwrap();
        let source = SourceDescriptor::Local(LocalSource::new("a", "a"));
        let request = TargetRequest {
            name: "a",
            source: &source,
            src_dir: Some(tmp.path()),
            build_file: None,
            is_root: false,
        };
        let target = ProjectFactory.create(&request).unwrap();
        assert!(target.build_description().is_none());
    }

    #[test]
    fn test_project_file_found_in_src_dir() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(PROJECT_FILE), "[project]\nname = \"a\"\n").unwrap();
        let source = SourceDescriptor::Local(LocalSource::new("a", "a"));
        let request = TargetRequest {
            name: "a",
            source: &source,
            src_dir: Some(tmp.path()),
            build_file: None,
            is_root: false,
        };
        let target = ProjectFactory.create(&request).unwrap();
        assert_eq!(target.build_description(), Some(tmp.path().join(PROJECT_FILE)));
    }

    #[test]
    fn test_project_name() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("engine");
        std::fs::create_dir_all(&dir).unwrap();
        assert_eq!(project_name(&dir).unwrap(), "engine");

        std::fs::write(dir.join(PROJECT_FILE), "[project]\nname = \"Engine\"\n").unwrap();
        assert_eq!(project_name(&dir).unwrap(), "Engine");
    }
}
