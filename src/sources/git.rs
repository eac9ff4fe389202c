//! Git change detection for dependencies.
//!
//! [`ChangeDetector`] decides whether a git dependency must be cloned,
//! pulled, or wiped and re-cloned, by comparing the repository against the
//! status record written after the last successful fetch or build.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{FetchOptions, Oid, RemoteCallbacks, Repository, ResetType};

use crate::core::errors::BuildError;
use crate::core::source::GitSource;
use crate::sources::status::StatusRecord;
use crate::util::fs::{ensure_dir, is_dir_empty, remove_dir_all_if_exists};
use crate::util::progress::items_bar;

const FETCH_REFSPECS: &[&str] = &[
    "+refs/heads/*:refs/remotes/origin/*",
    "+refs/tags/*:refs/tags/*",
];

/// Length of the abbreviated commit hashes stored in status records.
const SHORT_HASH_LEN: usize = 7;

/// Which parts of a dependency's source differ from its status record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Changes {
    pub url: bool,
    pub tag: bool,
    pub branch: bool,
    pub commit: bool,
    /// No status record existed; every other flag is forced on.
    pub missing_status: bool,
}

impl Changes {
    fn everything() -> Self {
        Changes {
            url: true,
            tag: true,
            branch: true,
            commit: true,
            missing_status: true,
        }
    }

    pub fn any(&self) -> bool {
        self.url || self.tag || self.branch || self.commit
    }
}

/// What the current run asks of a git dependency.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutRequest {
    /// The node is selected by the run's target filter
    pub is_target: bool,
    /// The run checks remotes for updates
    pub update: bool,
    /// The run wipes and re-clones targeted dependencies
    pub reclone: bool,
}

/// Fetch state of one git dependency.
pub struct ChangeDetector<'a> {
    name: &'a str,
    source: &'a GitSource,
    src_dir: &'a Path,
    dep_dir: &'a Path,
    build_dir: &'a Path,
}

impl fmt::Debug for ChangeDetector<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeDetector")
            .field("name", &self.name)
            .field("url", &self.source.url)
            .field("src_dir", &self.src_dir)
            .finish()
    }
}

impl<'a> ChangeDetector<'a> {
    /// `dep_dir` is the directory wiped on re-clone; it contains both
    /// `src_dir` and `build_dir`.
    pub fn new(
        name: &'a str,
        source: &'a GitSource,
        src_dir: &'a Path,
        dep_dir: &'a Path,
        build_dir: &'a Path,
    ) -> Self {
        ChangeDetector {
            name,
            source,
            src_dir,
            dep_dir,
            build_dir,
        }
    }

    /// True if the source directory is missing or empty.
    pub fn needs_initial_fetch(&self) -> bool {
        is_dir_empty(self.src_dir)
    }

    /// Bring the checkout up to date for this run. Returns true if the
    /// source was cloned or changed.
    ///
    /// - A missing checkout is always cloned.
    /// - Remotes are only checked when the run updates this node.
    /// - A changed url, or an explicit re-clone of this node, wipes the whole
    ///   dependency directory first.
    /// - A plain build of a targeted node never pulls.
    pub fn checkout(&self, request: CheckoutRequest) -> Result<bool> {
        if self.needs_initial_fetch() {
            tracing::info!("{}: CLONE because src is missing", self.name);
            self.clone_source()?;
            return Ok(true);
        }

        let changes = if request.update && request.is_target {
            self.check_remote_status()?
        } else {
            Changes::default()
        };

        let url_changed = changes.url && !changes.missing_status;
        if url_changed || (request.is_target && request.reclone) {
            tracing::info!("{}: RECLONE WIPE", self.name);
            self.wipe()?;
            self.clone_source()?;
            return Ok(true);
        }

        if (request.is_target && !request.update) || !changes.any() {
            tracing::debug!("{}: no git changes detected and update not requested", self.name);
            return Ok(false);
        }

        tracing::info!("{}: PULL source change detected", self.name);
        self.pull()?;
        Ok(true)
    }

    /// Fetch the remote and compare against the status record.
    ///
    /// Without a status record every flag is set and `missing_status`
    /// distinguishes a first build from a real change. A url change skips
    /// the fetch, since the old remote may no longer exist.
    pub fn check_remote_status(&self) -> Result<Changes> {
        let Some(status) = StatusRecord::read(self.build_dir)? else {
            return Ok(Changes::everything());
        };

        let mut changes = Changes {
            url: self.source.url != status.url,
            tag: self.source.tag != status.tag,
            branch: self.source.branch != status.branch,
            ..Changes::default()
        };
        if changes.url {
            changes.commit = true;
            return Ok(changes);
        }

        let repo = self.open()?;
        self.fetch_origin(&repo)?;
        let remote = self.remote_commit(&repo)?;
        changes.commit = short_hash(remote) != status.commit;
        tracing::debug!(
            "{}: status url={} tag={} branch={} commit={}",
            self.name,
            changes.url,
            changes.tag,
            changes.branch,
            changes.commit
        );
        Ok(changes)
    }

    /// Persist the current url, tag, branch and commit.
    pub fn save_status(&self) -> Result<()> {
        let record = StatusRecord {
            url: self.source.url.clone(),
            tag: self.source.tag.clone(),
            branch: self.source.branch.clone(),
            commit: self.head_commit()?,
        };
        tracing::debug!("{}: write git status commit={}", self.name, record.commit);
        record.write(self.build_dir)
    }

    /// Abbreviated hash of the checked out commit.
    pub fn head_commit(&self) -> Result<String> {
        let repo = self.open()?;
        let head = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .with_context(|| format!("`{}` has no checked out commit", self.name))?;
        Ok(short_hash(head.id()))
    }

    fn open(&self) -> Result<Repository> {
        Repository::open(self.src_dir).with_context(|| {
            format!(
                "failed to open git repository for `{}` at {}",
                self.name,
                self.src_dir.display()
            )
        })
    }

    fn fetch_error(&self, err: impl fmt::Display) -> anyhow::Error {
        BuildError::SourceFetch {
            name: self.name.to_string(),
            url: self.source.url.clone(),
            message: err.to_string(),
        }
        .into()
    }

    fn clone_source(&self) -> Result<()> {
        if let Some(parent) = self.src_dir.parent() {
            ensure_dir(parent)?;
        }

        let pb = items_bar(0, format!("{} clone", self.name));
        let mut callbacks = RemoteCallbacks::new();
        callbacks.transfer_progress(|stats| {
            pb.set_length(stats.total_objects() as u64);
            pb.set_position(stats.received_objects() as u64);
            true
        });
        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(callbacks);

        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch);
        if !self.source.branch.is_empty() {
            builder.branch(&self.source.branch);
        }
        let repo = builder
            .clone(&self.source.url, self.src_dir)
            .map_err(|e| self.fetch_error(e))?;
        pb.finish_and_clear();

        if self.source.branch.is_empty() && !self.source.tag.is_empty() {
            self.checkout_tag(&repo)?;
        }
        update_submodules(&repo).map_err(|e| self.fetch_error(e))?;
        tracing::info!("{}: CLONE SUCCESS", self.name);
        Ok(())
    }

    fn fetch_origin(&self, repo: &Repository) -> Result<()> {
        let mut remote = repo.find_remote("origin").map_err(|e| self.fetch_error(e))?;
        remote
            .fetch(FETCH_REFSPECS, None, None)
            .map_err(|e| self.fetch_error(e))
    }

    /// The commit the remote side currently points at for this source.
    fn remote_commit(&self, repo: &Repository) -> Result<Oid> {
        let reference = if !self.source.branch.is_empty() {
            format!("refs/remotes/origin/{}", self.source.branch)
        } else if !self.source.tag.is_empty() {
            format!("refs/tags/{}", self.source.tag)
        } else {
            match current_branch(repo) {
                Some(branch) => format!("refs/remotes/origin/{}", branch),
                None => "HEAD".to_string(),
            }
        };
        let commit = repo
            .revparse_single(&reference)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|e| self.fetch_error(e))?;
        Ok(commit.id())
    }

    fn checkout_tag(&self, repo: &Repository) -> Result<()> {
        let commit = repo
            .revparse_single(&format!("refs/tags/{}", self.source.tag))
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|e| self.fetch_error(e))?;
        repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))
            .map_err(|e| self.fetch_error(e))?;
        repo.set_head_detached(commit.id())
            .map_err(|e| self.fetch_error(e))?;
        Ok(())
    }

    /// Update the working tree to the remote state. Tags are checked out,
    /// never pulled.
    fn pull(&self) -> Result<()> {
        let repo = self.open()?;
        self.fetch_origin(&repo)?;

        if self.source.branch.is_empty() && !self.source.tag.is_empty() {
            self.checkout_tag(&repo)?;
        } else {
            let target = self.remote_commit(&repo)?;
            let commit = repo.find_commit(target).map_err(|e| self.fetch_error(e))?;

            let branch = if self.source.branch.is_empty() {
                current_branch(&repo)
            } else {
                Some(self.source.branch.clone())
            };
            if let Some(branch) = branch {
                if current_branch(&repo).as_deref() != Some(branch.as_str()) {
                    repo.branch(&branch, &commit, true)
                        .map_err(|e| self.fetch_error(e))?;
                    repo.set_head(&format!("refs/heads/{}", branch))
                        .map_err(|e| self.fetch_error(e))?;
                }
            }
            repo.reset(commit.as_object(), ResetType::Hard, None)
                .map_err(|e| self.fetch_error(e))?;
        }

        update_submodules(&repo).map_err(|e| self.fetch_error(e))?;
        Ok(())
    }

    /// Delete the whole dependency directory, including its build state.
    fn wipe(&self) -> Result<()> {
        remove_dir_all_if_exists(self.dep_dir)
    }
}

fn current_branch(repo: &Repository) -> Option<String> {
    let head = repo.head().ok()?;
    if !head.is_branch() {
        return None;
    }
    head.shorthand().map(str::to_string)
}

fn update_submodules(repo: &Repository) -> Result<(), git2::Error> {
    for mut sub in repo.submodules()? {
        sub.update(true, None)?;
        if let Ok(sub_repo) = sub.open() {
            update_submodules(&sub_repo)?;
        }
    }
    Ok(())
}

fn short_hash(oid: Oid) -> String {
    let full = oid.to_string();
    full[..SHORT_HASH_LEN.min(full.len())].to_string()
}

/// Abbreviated HEAD commit of the repository at `dir`, if it is one.
pub fn short_head_commit(dir: &Path) -> Option<String> {
    let repo = Repository::open(dir).ok()?;
    let commit = repo.head().ok()?.peel_to_commit().ok()?;
    Some(short_hash(commit.id()))
}
