//! Rebuild decision.
//!
//! The policy is a pure function of a [`RebuildInputs`] snapshot. Rules are
//! evaluated in priority order and the first match wins.

use std::fmt;
use std::path::PathBuf;

/// Why a node was (or was not) scheduled for a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    FilteredOut,
    Cleaned,
    RootTarget,
    AlwaysBuild,
    SourceChanged,
    DescriptionModified,
    ProjectModified,
    NotBuiltYet,
    ProductMissing(PathBuf),
    DependencyRemoved(String),
    UpdateTarget(String),
    UpToDate,
    /// Promoted because a direct child rebuilds
    Propagated(String),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::FilteredOut => write!(f, "not targeted"),
            Reason::Cleaned => write!(f, "cleaned target"),
            Reason::RootTarget => write!(f, "root target"),
            Reason::AlwaysBuild => write!(f, "always build"),
            Reason::SourceChanged => write!(f, "source changed"),
            Reason::DescriptionModified => write!(f, "build description modified"),
            Reason::ProjectModified => write!(f, "project descriptor modified"),
            Reason::NotBuiltYet => write!(f, "not built yet"),
            Reason::ProductMissing(path) => write!(f, "{} does not exist", path.display()),
            Reason::DependencyRemoved(dep) => write!(f, "{} was removed", dep),
            Reason::UpdateTarget(name) => write!(f, "update target={}", name),
            Reason::UpToDate => write!(f, "OK"),
            Reason::Propagated(child) => write!(f, "{} rebuilt", child),
        }
    }
}

/// The outcome of the rebuild policy for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub build: bool,
    pub reason: Reason,
}

impl Decision {
    fn build(reason: Reason) -> Self {
        Decision {
            build: true,
            reason,
        }
    }

    fn skip(reason: Reason) -> Self {
        Decision {
            build: false,
            reason,
        }
    }

    /// Build because the direct child `child` is rebuilt.
    pub fn propagated(child: &str) -> Self {
        Decision::build(Reason::Propagated(child.to_string()))
    }
}

/// Everything the policy looks at, gathered by the load phase.
#[derive(Debug, Clone, Default)]
pub struct RebuildInputs {
    /// A target filter is active and does not select this node
    pub filtered_out: bool,
    /// This node was cleaned in this run
    pub cleaned: bool,
    pub is_root: bool,
    pub always_build: bool,
    pub source_changed: bool,
    pub description_changed: bool,
    pub project_changed: bool,
    /// No build products were recorded by a previous run
    pub not_built: bool,
    pub missing_product: Option<PathBuf>,
    pub removed_dependency: Option<String>,
    /// `update target=<this node>` was requested; holds the node name
    pub update_requested: Option<String>,
    /// Exports came from a fetched package rather than a local build
    pub loaded_from_package: bool,
    /// Header-only project
    pub nothing_to_build: bool,
}

/// Decide whether a node needs a build.
pub fn decide(inputs: &RebuildInputs) -> Decision {
    if inputs.filtered_out {
        return Decision::skip(Reason::FilteredOut);
    }
    if inputs.cleaned {
        return Decision::build(Reason::Cleaned);
    }
    if inputs.is_root {
        return Decision::build(Reason::RootTarget);
    }
    if inputs.always_build {
        return Decision::build(Reason::AlwaysBuild);
    }
    if inputs.source_changed {
        return Decision::build(Reason::SourceChanged);
    }
    if !inputs.loaded_from_package {
        if inputs.description_changed {
            return Decision::build(Reason::DescriptionModified);
        }
        if inputs.project_changed {
            return Decision::build(Reason::ProjectModified);
        }
        if inputs.not_built && !inputs.nothing_to_build {
            return Decision::build(Reason::NotBuiltYet);
        }
    }
    if let Some(path) = &inputs.missing_product {
        return Decision::build(Reason::ProductMissing(path.clone()));
    }
    if let Some(dep) = &inputs.removed_dependency {
        return Decision::build(Reason::DependencyRemoved(dep.clone()));
    }
    if let Some(name) = &inputs.update_requested {
        return Decision::build(Reason::UpdateTarget(name.clone()));
    }
    Decision::skip(Reason::UpToDate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(f: impl FnOnce(&mut RebuildInputs)) -> Decision {
        let mut inputs = RebuildInputs::default();
        f(&mut inputs);
        decide(&inputs)
    }

    #[test]
    fn test_each_rule_in_isolation() {
        assert_eq!(only(|_| {}), Decision::skip(Reason::UpToDate));
        assert_eq!(only(|i| i.filtered_out = true), Decision::skip(Reason::FilteredOut));
        assert_eq!(only(|i| i.cleaned = true), Decision::build(Reason::Cleaned));
        assert_eq!(only(|i| i.is_root = true), Decision::build(Reason::RootTarget));
        assert_eq!(only(|i| i.always_build = true), Decision::build(Reason::AlwaysBuild));
        assert_eq!(only(|i| i.source_changed = true), Decision::build(Reason::SourceChanged));
        assert_eq!(
            only(|i| i.description_changed = true),
            Decision::build(Reason::DescriptionModified)
        );
        assert_eq!(only(|i| i.project_changed = true), Decision::build(Reason::ProjectModified));
        assert_eq!(only(|i| i.not_built = true), Decision::build(Reason::NotBuiltYet));
        assert_eq!(
            only(|i| i.missing_product = Some(PathBuf::from("lib/libz.a"))),
            Decision::build(Reason::ProductMissing(PathBuf::from("lib/libz.a")))
        );
        assert_eq!(
            only(|i| i.removed_dependency = Some("zlib".into())),
            Decision::build(Reason::DependencyRemoved("zlib".into()))
        );
        assert_eq!(
            only(|i| i.update_requested = Some("png".into())),
            Decision::build(Reason::UpdateTarget("png".into()))
        );
    }

    #[test]
    fn test_filter_beats_everything() {
        let decision = only(|i| {
            i.filtered_out = true;
            i.cleaned = true;
            i.is_root = true;
            i.always_build = true;
            i.source_changed = true;
            i.not_built = true;
        });
        assert_eq!(decision, Decision::skip(Reason::FilteredOut));
    }

    #[test]
    fn test_priority_order() {
        let decision = only(|i| {
            i.is_root = true;
            i.source_changed = true;
        });
        assert_eq!(decision.reason, Reason::RootTarget);

        let decision = only(|i| {
            i.source_changed = true;
            i.missing_product = Some(PathBuf::from("a"));
        });
        assert_eq!(decision.reason, Reason::SourceChanged);

        let decision = only(|i| {
            i.missing_product = Some(PathBuf::from("a"));
            i.removed_dependency = Some("b".into());
        });
        assert_eq!(decision.reason, Reason::ProductMissing(PathBuf::from("a")));
    }

    #[test]
    fn test_packages_skip_local_build_checks() {
        let decision = only(|i| {
            i.loaded_from_package = true;
            i.description_changed = true;
            i.project_changed = true;
            i.not_built = true;
        });
        assert_eq!(decision, Decision::skip(Reason::UpToDate));
    }

    #[test]
    fn test_header_only_projects_are_never_unbuilt() {
        let decision = only(|i| {
            i.not_built = true;
            i.nothing_to_build = true;
        });
        assert!(!decision.build);
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(Reason::UpToDate.to_string(), "OK");
        assert_eq!(Reason::RootTarget.to_string(), "root target");
        assert_eq!(Reason::Propagated("zlib".into()).to_string(), "zlib rebuilt");
    }
}
