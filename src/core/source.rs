//! Dependency source descriptors.
//!
//! A [`SourceDescriptor`] says where a dependency comes from: a git
//! repository, a local directory, or a prebuilt package in the remote cache.
//! Descriptors serialize to one comma-joined line prefixed by a type tag:
//!
//! ```text
//! git name,url,branch,tag,build_file,args...
//! src name,rel_path,build_file,always_build,args...
//! pkg name,full_archive_name,version
//! ```

use std::fmt;

use crate::core::errors::BuildError;

const GIT_TAG: &str = "git ";
const SRC_TAG: &str = "src ";
const PKG_TAG: &str = "pkg ";

/// A dependency fetched from a git repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    pub name: String,
    pub url: String,
    pub branch: String,
    pub tag: String,
    /// Build description override, relative to the declaring project
    pub build_file: String,
    pub args: Vec<String>,
}

/// A dependency in a local directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSource {
    pub name: String,
    pub rel_path: String,
    pub build_file: String,
    pub always_build: bool,
    pub args: Vec<String>,
}

/// A prebuilt package from the remote cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSource {
    pub name: String,
    pub version: String,
    pub full_archive_name: String,
}

/// Where a dependency's source originates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    Git(GitSource),
    Local(LocalSource),
    Package(PackageSource),
}

impl GitSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self, BuildError> {
        let name = name.into();
        let url = url.into();
        if url.is_empty() {
            return Err(BuildError::format(
                "git source",
                name,
                "url must not be empty",
            ));
        }
        Ok(GitSource {
            name,
            url,
            branch: String::new(),
            tag: String::new(),
            build_file: String::new(),
            args: Vec::new(),
        })
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// The branch if set, else the tag, else empty.
    pub fn branch_or_tag(&self) -> &str {
        if !self.branch.is_empty() {
            &self.branch
        } else {
            &self.tag
        }
    }
}

impl LocalSource {
    pub fn new(name: impl Into<String>, rel_path: impl Into<String>) -> Self {
        LocalSource {
            name: name.into(),
            rel_path: rel_path.into(),
            build_file: String::new(),
            always_build: false,
            args: Vec::new(),
        }
    }
}

impl PackageSource {
    /// A full archive name takes precedence; the version is cleared when one
    /// is given.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        full_archive_name: impl Into<String>,
    ) -> Self {
        let full_archive_name = full_archive_name.into();
        let version = if full_archive_name.is_empty() {
            version.into()
        } else {
            String::new()
        };
        PackageSource {
            name: name.into(),
            version,
            full_archive_name,
        }
    }
}

impl SourceDescriptor {
    pub fn name(&self) -> &str {
        match self {
            SourceDescriptor::Git(g) => &g.name,
            SourceDescriptor::Local(l) => &l.name,
            SourceDescriptor::Package(p) => &p.name,
        }
    }

    /// Extra build arguments. Packages carry none.
    pub fn args(&self) -> &[String] {
        match self {
            SourceDescriptor::Git(g) => &g.args,
            SourceDescriptor::Local(l) => &l.args,
            SourceDescriptor::Package(_) => &[],
        }
    }

    /// Build description override, if any.
    pub fn build_file(&self) -> Option<&str> {
        let file = match self {
            SourceDescriptor::Git(g) => &g.build_file,
            SourceDescriptor::Local(l) => &l.build_file,
            SourceDescriptor::Package(_) => return None,
        };
        (!file.is_empty()).then_some(file.as_str())
    }

    pub fn is_git(&self) -> bool {
        matches!(self, SourceDescriptor::Git(_))
    }

    pub fn is_package(&self) -> bool {
        matches!(self, SourceDescriptor::Package(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SourceDescriptor::Git(_) => "git",
            SourceDescriptor::Local(_) => "src",
            SourceDescriptor::Package(_) => "pkg",
        }
    }

    /// `name-branch` for git sources pinned to a branch or tag, else `name`.
    pub fn dependency_name(&self) -> String {
        match self {
            SourceDescriptor::Git(g) if !g.branch_or_tag().is_empty() => {
                format!("{}-{}", g.name, g.branch_or_tag())
            }
            other => other.name().to_string(),
        }
    }

    /// Serialize to a single tagged line.
    pub fn serialize(&self) -> String {
        match self {
            SourceDescriptor::Git(g) => {
                let mut fields = vec![
                    g.name.as_str(),
                    g.url.as_str(),
                    g.branch.as_str(),
                    g.tag.as_str(),
                    g.build_file.as_str(),
                ];
                push_args(&mut fields, &g.args);
                format!("{}{}", GIT_TAG, fields.join(","))
            }
            SourceDescriptor::Local(l) => {
                let always = if l.always_build { "true" } else { "" };
                let mut fields = vec![
                    l.name.as_str(),
                    l.rel_path.as_str(),
                    l.build_file.as_str(),
                    always,
                ];
                push_args(&mut fields, &l.args);
                format!("{}{}", SRC_TAG, fields.join(","))
            }
            SourceDescriptor::Package(p) => format!(
                "{}{},{},{}",
                PKG_TAG, p.name, p.full_archive_name, p.version
            ),
        }
    }

    /// Parse a tagged line produced by [`SourceDescriptor::serialize`].
    pub fn parse(line: &str) -> Result<Self, BuildError> {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(GIT_TAG) {
            let fields: Vec<&str> = rest.split(',').collect();
            if fields.len() < 5 {
                return Err(field_count_error(line, 5, fields.len()));
            }
            let mut git = GitSource::new(fields[0], fields[1]).map_err(|e| match e {
                BuildError::Format { kind, reason, .. } => BuildError::format(kind, line, reason),
                other => other,
            })?;
            git.branch = fields[2].to_string();
            git.tag = fields[3].to_string();
            git.build_file = fields[4].to_string();
            git.args = collect_args(&fields[5..]);
            Ok(SourceDescriptor::Git(git))
        } else if let Some(rest) = line.strip_prefix(SRC_TAG) {
            let fields: Vec<&str> = rest.split(',').collect();
            if fields.len() < 4 {
                return Err(field_count_error(line, 4, fields.len()));
            }
            Ok(SourceDescriptor::Local(LocalSource {
                name: fields[0].to_string(),
                rel_path: fields[1].to_string(),
                build_file: fields[2].to_string(),
                always_build: parse_flag(fields[3]),
                args: collect_args(&fields[4..]),
            }))
        } else if let Some(rest) = line.strip_prefix(PKG_TAG) {
            let fields: Vec<&str> = rest.split(',').collect();
            if fields.len() < 3 {
                return Err(field_count_error(line, 3, fields.len()));
            }
            Ok(SourceDescriptor::Package(PackageSource::new(
                fields[0], fields[2], fields[1],
            )))
        } else {
            Err(BuildError::format(
                "dependency source",
                line,
                "expected a `git `, `src ` or `pkg ` prefix",
            ))
        }
    }
}

/// Empty argument lists still produce one trailing empty field.
fn push_args<'a>(fields: &mut Vec<&'a str>, args: &'a [String]) {
    if args.is_empty() {
        fields.push("");
    } else {
        fields.extend(args.iter().map(String::as_str));
    }
}

fn collect_args(fields: &[&str]) -> Vec<String> {
    fields
        .iter()
        .filter(|a| !a.is_empty())
        .map(|a| a.to_string())
        .collect()
}

fn parse_flag(field: &str) -> bool {
    !matches!(field.trim().to_lowercase().as_str(), "" | "false" | "0")
}

fn field_count_error(line: &str, expected: usize, found: usize) -> BuildError {
    BuildError::format(
        "dependency source",
        line,
        format!("expected at least {} fields, found {}", expected, found),
    )
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDescriptor::Git(g) => {
                write!(f, "git {} {}", g.name, g.url)?;
                if !g.branch_or_tag().is_empty() {
                    write!(f, " {}", g.branch_or_tag())?;
                }
                Ok(())
            }
            SourceDescriptor::Local(l) => write!(f, "src {} {}", l.name, l.rel_path),
            SourceDescriptor::Package(p) => {
                let which = if p.full_archive_name.is_empty() {
                    &p.version
                } else {
                    &p.full_archive_name
                };
                write!(f, "pkg {} {}", p.name, which)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_round_trip_with_empty_fields() {
        let git = SourceDescriptor::Git(GitSource::new("ExampleRemote", "https://x/y.git").unwrap());
        let line = git.serialize();
        assert_eq!(line, "git ExampleRemote,https://x/y.git,,,,");
        assert_eq!(SourceDescriptor::parse(&line).unwrap(), git);
    }

    #[test]
    fn test_git_round_trip_with_args() {
        let mut git = GitSource::new("zlib", "https://github.com/madler/zlib.git")
            .unwrap()
            .with_tag("v1.3");
        git.build_file = "burrow/zlib.toml".into();
        git.args = vec!["ZLIB_STATIC=ON".into(), "fast".into()];
        let desc = SourceDescriptor::Git(git);

        let parsed = SourceDescriptor::parse(&desc.serialize()).unwrap();
        assert_eq!(parsed, desc);
        assert_eq!(parsed.dependency_name(), "zlib-v1.3");
    }

    #[test]
    fn test_local_round_trip() {
        let mut local = LocalSource::new("core", "../core");
        local.always_build = true;
        let desc = SourceDescriptor::Local(local);
        assert_eq!(desc.serialize(), "src core,../core,,true,");
        assert_eq!(SourceDescriptor::parse(&desc.serialize()).unwrap(), desc);

        let plain = SourceDescriptor::Local(LocalSource::new("util", "libs/util"));
        assert_eq!(SourceDescriptor::parse(&plain.serialize()).unwrap(), plain);
    }

    #[test]
    fn test_package_full_name_clears_version() {
        let pkg = PackageSource::new("ssl", "3.0", "ssl-linux-x64-release-abc1234");
        assert!(pkg.version.is_empty());

        let desc = SourceDescriptor::Package(pkg);
        assert_eq!(desc.serialize(), "pkg ssl,ssl-linux-x64-release-abc1234,");
        assert_eq!(SourceDescriptor::parse(&desc.serialize()).unwrap(), desc);

        let versioned = SourceDescriptor::Package(PackageSource::new("ssl", "3.0", ""));
        assert_eq!(SourceDescriptor::parse(&versioned.serialize()).unwrap(), versioned);
    }

    #[test]
    fn test_parse_rejects_unknown_tag_and_short_records() {
        assert!(matches!(
            SourceDescriptor::parse("svn foo,bar"),
            Err(BuildError::Format { .. })
        ));
        assert!(matches!(
            SourceDescriptor::parse("git foo,https://x"),
            Err(BuildError::Format { .. })
        ));
        assert!(matches!(
            SourceDescriptor::parse("git foo,,,,,"),
            Err(BuildError::Format { .. })
        ));
        assert!(SourceDescriptor::parse("pkg ssl,").is_err());
    }

    #[test]
    fn test_branch_takes_precedence_over_tag() {
        let git = GitSource::new("a", "u").unwrap().with_branch("dev").with_tag("v1");
        assert_eq!(git.branch_or_tag(), "dev");
    }
}
