//! Test utilities for burrow unit tests.
//!
//! Provides local git repositories to stand in for remotes, and a scripted
//! [`Target`] whose hooks record what the graph asked of them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use git2::{Oid, Repository, Signature};

use crate::core::source::SourceDescriptor;
use crate::core::target::{Target, TargetContext, TargetFactory, TargetRequest};
use crate::package::export::Exporter;

/// Create a repository with one commit containing `README`.
///
/// Returns the repository and the url to clone it from.
pub fn init_upstream(path: &Path) -> (Repository, String) {
    std::fs::create_dir_all(path).unwrap();
    let repo = Repository::init(path).unwrap();
    commit_file(&repo, "README", "upstream");
    (repo, path.to_string_lossy().into_owned())
}

/// Write a file into the repository's working tree and commit it on HEAD.
pub fn commit_file(repo: &Repository, name: &str, contents: &str) -> Oid {
    let workdir = repo.workdir().unwrap().to_path_buf();
    std::fs::write(workdir.join(name), contents).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(name)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let sig = Signature::now("Burrow Test", "test@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, &format!("add {}", name), &tree, &parents)
        .unwrap()
}

/// What a [`ScriptedTarget`] does for one node.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub dependencies: Vec<SourceDescriptor>,
    /// Files created in the build dir by `build` and exported as libs
    pub libs: Vec<String>,
    pub includes: Vec<String>,
    pub syslibs: Vec<String>,
    pub nothing_to_build: bool,
    pub project_descriptor: Option<PathBuf>,
}

/// Hook calls observed by a factory's targets, in order.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Names of nodes whose `build` hook ran, in order.
    pub fn built(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.strip_prefix("build ").map(str::to_string))
            .collect()
    }
}

/// A target driven by a [`Script`].
pub struct ScriptedTarget {
    name: String,
    script: Script,
    log: CallLog,
}

impl Target for ScriptedTarget {
    fn dependencies(&mut self, _ctx: &TargetContext<'_>) -> Result<Vec<SourceDescriptor>> {
        self.log.push(format!("dependencies {}", self.name));
        Ok(self.script.dependencies.clone())
    }

    fn build(&mut self, ctx: &TargetContext<'_>) -> Result<()> {
        self.log.push(format!("build {}", self.name));
        for lib in &self.script.libs {
            let path = ctx.build_dir.join(lib);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, self.name.as_bytes())?;
        }
        Ok(())
    }

    fn package(&mut self, _ctx: &TargetContext<'_>, exports: &mut Exporter<'_>) -> Result<()> {
        self.log.push(format!("package {}", self.name));
        for include in &self.script.includes {
            exports.include(include, false);
        }
        for lib in &self.script.libs {
            exports.lib(lib, false);
        }
        for syslib in &self.script.syslibs {
            exports.syslib(syslib, None, false)?;
        }
        Ok(())
    }

    fn clean(&mut self, _ctx: &TargetContext<'_>) -> Result<()> {
        self.log.push(format!("clean {}", self.name));
        Ok(())
    }

    fn project_descriptor(&self) -> Option<PathBuf> {
        self.script.project_descriptor.clone()
    }

    fn nothing_to_build(&self) -> bool {
        self.script.nothing_to_build
    }
}

/// Factory handing out [`ScriptedTarget`]s by node name.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFactory {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    pub log: CallLog,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, name: &str, script: Script) -> &Self {
        self.scripts.lock().unwrap().insert(name.to_string(), script);
        self
    }
}

impl TargetFactory for ScriptedFactory {
    fn create(&self, request: &TargetRequest<'_>) -> Result<Box<dyn Target>> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(request.name)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(ScriptedTarget {
            name: request.name.to_string(),
            script,
            log: self.log.clone(),
        }))
    }
}
