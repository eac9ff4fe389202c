//! Build error types and diagnostics.

use std::path::PathBuf;

use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Fatal conditions raised by the build graph.
///
/// Orchestration code wraps these in `anyhow::Error`; callers that need to
/// branch on the failure kind use `downcast_ref::<BuildError>()`.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A serialized record could not be parsed.
    #[error("malformed {kind} record `{line}`: {reason}")]
    Format {
        kind: &'static str,
        line: String,
        reason: String,
    },

    /// Cloning, fetching or pulling a source failed.
    #[error("failed to fetch `{name}` from {url}: {message}")]
    SourceFetch {
        name: String,
        url: String,
        message: String,
    },

    /// A manifest belongs to a different project.
    #[error("package manifest {path} is for `{found}`, expected `{expected}`")]
    ManifestMismatch {
        expected: String,
        found: String,
        path: PathBuf,
    },

    /// A node was about to execute before one of its children.
    #[error("`{node}` cannot build before its dependency `{child}`")]
    CyclicOrUnorderedDependency { node: String, child: String },

    /// A required system library could not be located.
    #[error("`{node}` requires system library `{library}` which was not found")]
    MissingSystemLibrary {
        node: String,
        library: String,
        install_hint: Option<String>,
    },

    /// A prebuilt package archive is not available remotely.
    #[error("package `{archive}` for `{name}` was not found in the remote cache")]
    MissingArtifact { name: String, archive: String },
}

impl BuildError {
    pub fn format(kind: &'static str, line: impl Into<String>, reason: impl Into<String>) -> Self {
        BuildError::Format {
            kind,
            line: line.into(),
            reason: reason.into(),
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            BuildError::Format { .. } => diag,

            BuildError::SourceFetch { .. } => diag
                .with_suggestion(suggestions::FETCH_FAILED)
                .with_suggestion(suggestions::WIPE),

            BuildError::ManifestMismatch { path, .. } => diag
                .with_location(path.clone())
                .with_context("the package was deployed from a different project"),

            BuildError::CyclicOrUnorderedDependency { node, child } => diag
                .with_context(format!(
                    "`{}` is still pending; the dependency graph contains a cycle through `{}`",
                    child, node
                ))
                .with_suggestion("Remove the dependency that points back to an ancestor"),

            BuildError::MissingSystemLibrary { install_hint, .. } => match install_hint {
                Some(hint) => diag.with_suggestion(hint.clone()),
                None => diag,
            },

            BuildError::MissingArtifact { .. } => diag.with_suggestion(suggestions::UPLOAD),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_syslib_suggests_install() {
        let err = BuildError::MissingSystemLibrary {
            node: "zlib".into(),
            library: "lzma".into(),
            install_hint: Some("sudo apt install liblzma-dev".into()),
        };
        let text = err.to_diagnostic().format(false);
        assert!(text.contains("system library `lzma`"));
        assert!(text.contains("sudo apt install liblzma-dev"));
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = BuildError::CyclicOrUnorderedDependency {
            node: "a".into(),
            child: "b".into(),
        }
        .into();
        let err = err.context("failed to execute `a`");
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::CyclicOrUnorderedDependency { .. })
        ));
    }
}
