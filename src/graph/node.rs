//! Graph vertices.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::source::SourceDescriptor;
use crate::core::target::{Exports, Target, TargetContext};
use crate::graph::policy::Decision;
use crate::util::config::BuildConfig;

/// Load progress of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoadState {
    Unloaded = 0,
    Loading = 1,
    Loaded = 2,
}

impl LoadState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LoadState::Unloaded,
            1 => LoadState::Loading,
            _ => LoadState::Loaded,
        }
    }
}

/// Directories a node works in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeDirs {
    /// Source tree; `None` for prebuilt packages
    pub src_dir: Option<PathBuf>,
    /// Per-dependency directory holding the source clone and build folders
    pub dep_dir: PathBuf,
    /// `<dep_dir>/<platform build folder>`
    pub build_dir: PathBuf,
    /// Build description override, if one was declared or found
    pub build_file: Option<PathBuf>,
}

/// Mutable state of a node, guarded by the node's lock.
#[derive(Default)]
pub struct NodeState {
    pub target: Option<Box<dyn Target>>,
    /// Extra build arguments merged from every declaration
    pub args: Vec<String>,
    /// In link order
    pub children: Vec<Arc<DependencyNode>>,
    pub exports: Exports,
    pub dirs: NodeDirs,
    pub always_build: bool,
    pub loaded_from_package: bool,
    pub checked_remote: bool,
    pub source_changed: bool,
    pub decision: Option<Decision>,
}

impl NodeState {
    /// A target context borrowing from this state.
    pub fn context<'a>(
        &'a self,
        name: &'a str,
        config: &'a BuildConfig,
        is_root: bool,
    ) -> TargetContext<'a> {
        TargetContext {
            name,
            src_dir: self.dirs.src_dir.as_deref(),
            build_dir: &self.dirs.build_dir,
            config,
            args: &self.args,
            is_root,
        }
    }
}

/// One vertex of the dependency graph.
///
/// Identity is the name. Lifecycle flags are atomics so concurrent loaders
/// can observe them without taking the state lock.
pub struct DependencyNode {
    name: String,
    source: SourceDescriptor,
    is_root: bool,
    load_state: AtomicU8,
    should_rebuild: AtomicBool,
    executing: AtomicBool,
    executed: AtomicBool,
    state: Mutex<NodeState>,
}

impl DependencyNode {
    pub fn new(source: SourceDescriptor, is_root: bool, dirs: NodeDirs) -> Self {
        let always_build = matches!(&source, SourceDescriptor::Local(l) if l.always_build);
        let state = NodeState {
            args: source.args().to_vec(),
            dirs,
            always_build,
            ..Default::default()
        };
        DependencyNode {
            name: source.name().to_string(),
            source,
            is_root,
            load_state: AtomicU8::new(LoadState::Unloaded as u8),
            should_rebuild: AtomicBool::new(false),
            executing: AtomicBool::new(false),
            executed: AtomicBool::new(false),
            state: Mutex::new(state),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The first declaration of this dependency.
    pub fn source(&self) -> &SourceDescriptor {
        &self.source
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Lock the node's mutable state. A poisoned lock is recovered; the
    /// panicking thread already aborted the run.
    pub fn state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn load_state(&self) -> LoadState {
        LoadState::from_u8(self.load_state.load(Ordering::Acquire))
    }

    /// Claim the node for loading. Returns false if it was already claimed.
    pub(crate) fn try_begin_load(&self) -> bool {
        self.load_state
            .compare_exchange(
                LoadState::Unloaded as u8,
                LoadState::Loading as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn finish_load(&self) {
        self.load_state
            .store(LoadState::Loaded as u8, Ordering::Release);
    }

    pub fn should_rebuild(&self) -> bool {
        self.should_rebuild.load(Ordering::Acquire)
    }

    pub(crate) fn set_should_rebuild(&self, value: bool) {
        self.should_rebuild.store(value, Ordering::Release);
    }

    pub fn is_executed(&self) -> bool {
        self.executed.load(Ordering::Acquire)
    }

    /// Mark execution started. Returns true if it already was.
    pub(crate) fn begin_execute(&self) -> bool {
        self.executing.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn mark_executed(&self) {
        self.executed.store(true, Ordering::Release);
    }

    pub fn children(&self) -> Vec<Arc<DependencyNode>> {
        self.state().children.clone()
    }

    pub fn build_dir(&self) -> PathBuf {
        self.state().dirs.build_dir.clone()
    }

    pub fn src_dir(&self) -> Option<PathBuf> {
        self.state().dirs.src_dir.clone()
    }

    pub fn exports(&self) -> Exports {
        self.state().exports.clone()
    }

    pub fn decision(&self) -> Option<Decision> {
        self.state().decision.clone()
    }

    /// Directory that relative paths declared by this node resolve against:
    /// the directory of its build description if it has one, else its
    /// source directory.
    pub fn base_dir(&self) -> Option<PathBuf> {
        let state = self.state();
        match &state.dirs.build_file {
            Some(file) => file.parent().map(Path::to_path_buf),
            None => state.dirs.src_dir.clone(),
        }
    }
}

impl fmt::Debug for DependencyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyNode")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("is_root", &self.is_root)
            .field("load_state", &self.load_state())
            .field("should_rebuild", &self.should_rebuild())
            .field("executed", &self.is_executed())
            .finish()
    }
}
