//! Run configuration.
//!
//! Burrow supports two configuration file locations:
//! - Global: `~/.burrow/config.toml` - User-wide defaults
//! - Project: `.burrow/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config, and command-line
//! options take precedence over both. The merged result is a [`BuildConfig`]
//! shared by every node of a run.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::platform::{build_dir_name, Arch, Platform};

/// Target filter value that selects every node.
pub const ALL_TARGETS: &str = "all";

/// On-disk configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildSection,

    /// Remote package cache settings
    pub remote: RemoteSection,
}

/// `[build]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    /// Number of threads used for parallel loading (None = auto-detect)
    pub jobs: Option<usize>,

    /// Load dependencies in parallel
    pub parallel: Option<bool>,

    /// Build release binaries
    pub release: Option<bool>,

    /// Append the git branch or tag to dependency directory names
    pub branch_dirs: Option<bool>,

    /// Root directory for dependency workspaces
    pub workspaces_root: Option<PathBuf>,
}

/// `[remote]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    /// Base URL of the package mirror
    pub url: Option<String>,

    /// Skip uploads when the archive already exists remotely
    pub upload_if_needed: Option<bool>,

    /// Timeout in seconds for remote requests
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let b = other.build;
        if b.jobs.is_some() {
            self.build.jobs = b.jobs;
        }
        if b.parallel.is_some() {
            self.build.parallel = b.parallel;
        }
        if b.release.is_some() {
            self.build.release = b.release;
        }
        if b.branch_dirs.is_some() {
            self.build.branch_dirs = b.branch_dirs;
        }
        if b.workspaces_root.is_some() {
            self.build.workspaces_root = b.workspaces_root;
        }

        let r = other.remote;
        if r.url.is_some() {
            self.remote.url = r.url;
        }
        if r.upload_if_needed.is_some() {
            self.remote.upload_if_needed = r.upload_if_needed;
        }
        if r.timeout_secs.is_some() {
            self.remote.timeout_secs = r.timeout_secs;
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.burrow/config.toml)
/// 2. Global config (~/.burrow/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            config.merge(Config::load_or_default(global_path));
        }
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global burrow config path (~/.burrow/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".burrow").join("config.toml"))
}

/// Get the project config path (.burrow/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".burrow").join("config.toml")
}

/// The operation requested for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Build,
    Update,
    Clean,
    Rebuild,
    Deploy,
    Upload,
    List,
    Wipe,
}

/// Per-run options shared by all nodes.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Build nodes that need it
    pub build: bool,
    /// Check remotes for source changes
    pub update: bool,
    /// Clean targeted nodes before building
    pub clean: bool,
    /// Force a from-source build of targeted nodes
    pub rebuild: bool,
    /// Wipe and re-clone targeted git dependencies
    pub reclone: bool,
    /// Deploy a package for targeted nodes
    pub deploy: bool,
    /// Upload the deployed package to the remote cache
    pub upload: bool,
    /// Print the loaded graph
    pub list: bool,

    /// `None`, [`ALL_TARGETS`], or a single node name
    pub target: Option<String>,

    pub platform: Platform,
    pub arch: Arch,
    pub release: bool,

    /// Load children concurrently
    pub parallel: bool,
    /// Thread count for parallel loading
    pub jobs: usize,

    /// Root under which dependency workspaces are created.
    /// Defaults to the root project's source directory.
    pub workspaces_root: Option<PathBuf>,
    /// Append the git branch or tag to dependency directory names
    pub branch_dirs: bool,

    /// Base URL of the remote package cache
    pub remote_url: Option<String>,
    pub upload_if_needed: bool,
    /// Never consult the remote cache
    pub no_remote: bool,
    /// Treat a missing remote package for the target as fatal
    pub force_remote: bool,
    pub remote_timeout: Duration,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            build: false,
            update: false,
            clean: false,
            rebuild: false,
            reclone: false,
            deploy: false,
            upload: false,
            list: false,
            target: None,
            platform: Platform::host(),
            arch: Arch::host(),
            release: true,
            parallel: false,
            jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            workspaces_root: None,
            branch_dirs: false,
            remote_url: None,
            upload_if_needed: false,
            no_remote: false,
            force_remote: false,
            remote_timeout: Duration::from_secs(60),
        }
    }
}

impl BuildConfig {
    /// Create a config with the flags implied by a verb.
    pub fn for_verb(verb: Verb) -> Self {
        let mut config = BuildConfig::default();
        match verb {
            Verb::Build => config.build = true,
            Verb::Update => {
                config.build = true;
                config.update = true;
            }
            Verb::Clean => config.clean = true,
            Verb::Rebuild => {
                config.build = true;
                config.clean = true;
                config.rebuild = true;
            }
            Verb::Deploy => {
                config.build = true;
                config.deploy = true;
            }
            Verb::Upload => {
                config.build = true;
                config.deploy = true;
                config.upload = true;
            }
            Verb::List => config.list = true,
            Verb::Wipe => {
                config.build = true;
                config.reclone = true;
            }
        }
        config
    }

    /// Set the target filter.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Apply file configuration underneath already-set command-line values.
    pub fn apply_file_config(&mut self, file: &Config) {
        if let Some(jobs) = file.build.jobs {
            self.jobs = jobs.max(1);
        }
        if let Some(parallel) = file.build.parallel {
            self.parallel = parallel;
        }
        if let Some(release) = file.build.release {
            self.release = release;
        }
        if let Some(branch_dirs) = file.build.branch_dirs {
            self.branch_dirs = branch_dirs;
        }
        if self.workspaces_root.is_none() {
            self.workspaces_root = file.build.workspaces_root.clone();
        }
        if self.remote_url.is_none() {
            self.remote_url = file.remote.url.clone();
        }
        if let Some(if_needed) = file.remote.upload_if_needed {
            self.upload_if_needed |= if_needed;
        }
        if let Some(secs) = file.remote.timeout_secs {
            self.remote_timeout = Duration::from_secs(secs);
        }
    }

    /// True if the target filter selects `name`.
    pub fn target_matches(&self, name: &str) -> bool {
        matches!(self.target.as_deref(), Some(t) if t == ALL_TARGETS || t == name)
    }

    /// True if no single node was selected.
    pub fn no_specific_target(&self) -> bool {
        matches!(self.target.as_deref(), None | Some(ALL_TARGETS))
    }

    /// True if the node is the subject of this run's verb. Without a target
    /// filter the root project is the subject.
    pub fn is_target(&self, name: &str, is_root: bool) -> bool {
        match self.target {
            None => is_root,
            Some(_) => self.target_matches(name),
        }
    }

    /// True if `name` was selected explicitly, not through `all`.
    pub fn is_named_target(&self, name: &str) -> bool {
        self.target.as_deref() == Some(name)
    }

    /// Name of the per-platform build folder.
    pub fn build_dir_name(&self) -> String {
        build_dir_name(self.platform, self.arch)
    }

    pub fn build_type(&self) -> &'static str {
        if self.release {
            "release"
        } else {
            "debug"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[build]
jobs = 8
parallel = true

[remote]
url = "https://mirror.example.com/packages"
timeout_secs = 10
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.build.jobs, Some(8));
        assert_eq!(config.build.parallel, Some(true));
        assert_eq!(
            config.remote.url.as_deref(),
            Some("https://mirror.example.com/packages")
        );
        assert_eq!(config.remote.timeout_secs, Some(10));
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        base.build.jobs = Some(4);
        base.remote.url = Some("https://global".to_string());

        let mut project = Config::default();
        project.remote.url = Some("https://project".to_string());

        base.merge(project);

        assert_eq!(base.remote.url.as_deref(), Some("https://project"));
        assert_eq!(base.build.jobs, Some(4));
    }

    #[test]
    fn test_load_config_project_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.toml");
        let project = tmp.path().join("project.toml");
        std::fs::write(&global, "[build]\njobs = 2\nrelease = false\n").unwrap();
        std::fs::write(&project, "[build]\njobs = 6\n").unwrap();

        let config = load_config(Some(&global), &project);
        assert_eq!(config.build.jobs, Some(6));
        assert_eq!(config.build.release, Some(false));
    }

    #[test]
    fn test_cli_remote_url_wins_over_file() {
        let mut file = Config::default();
        file.remote.url = Some("https://file".to_string());

        let mut config = BuildConfig::for_verb(Verb::Build);
        config.remote_url = Some("https://cli".to_string());
        config.apply_file_config(&file);
        assert_eq!(config.remote_url.as_deref(), Some("https://cli"));
    }

    #[test]
    fn test_target_matching() {
        let config = BuildConfig::for_verb(Verb::Build);
        assert!(config.no_specific_target());
        assert!(!config.target_matches("zlib"));
        assert!(config.is_target("app", true));
        assert!(!config.is_target("zlib", false));

        let config = BuildConfig::for_verb(Verb::Build).with_target("all");
        assert!(config.no_specific_target());
        assert!(config.target_matches("zlib"));
        assert!(!config.is_named_target("zlib"));

        let config = BuildConfig::for_verb(Verb::Update).with_target("zlib");
        assert!(!config.no_specific_target());
        assert!(config.target_matches("zlib"));
        assert!(!config.target_matches("png"));
        assert!(config.is_named_target("zlib"));
    }

    #[test]
    fn test_verb_flags() {
        let rebuild = BuildConfig::for_verb(Verb::Rebuild);
        assert!(rebuild.build && rebuild.clean && rebuild.rebuild);

        let upload = BuildConfig::for_verb(Verb::Upload);
        assert!(upload.build && upload.deploy && upload.upload);

        let clean = BuildConfig::for_verb(Verb::Clean);
        assert!(clean.clean && !clean.build);
    }
}
