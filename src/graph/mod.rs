//! The dependency graph.
//!
//! A build runs in two phases:
//!
//! - **load** walks the graph from the root, fetching sources, creating each
//!   node's [`Target`](crate::core::Target), discovering children and
//!   deciding which nodes need a build. Children may load concurrently.
//! - **execute** walks the graph children first and strictly sequentially,
//!   building, packaging and deploying nodes.

pub mod glue;
pub mod layout;
mod load;
pub mod node;
pub mod policy;
pub mod products;
pub mod registry;

mod execute;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::{anyhow, bail, Result};

pub use layout::Layout;
pub use node::{DependencyNode, LoadState, NodeDirs};
pub use policy::{Decision, Reason, RebuildInputs};
pub use registry::Registry;

use crate::core::source::{LocalSource, SourceDescriptor};
use crate::core::target::{Target, TargetContext, TargetFactory};
use crate::remote::RemoteCache;
use crate::util::config::BuildConfig;

/// The dependency graph of one build run.
pub struct DependencyGraph {
    root: Arc<DependencyNode>,
    root_dir: PathBuf,
    registry: Registry,
    layout: OnceLock<Layout>,
    config: BuildConfig,
    factory: Box<dyn TargetFactory>,
    remote: Option<RemoteCache>,
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("root", &self.root.name())
            .field("root_dir", &self.root_dir)
            .field("nodes", &self.registry.len())
            .field("remote", &self.remote)
            .finish()
    }
}

impl DependencyGraph {
    /// Create a graph whose root project `name` lives in `root_dir`.
    pub fn new(
        name: &str,
        root_dir: &Path,
        config: BuildConfig,
        factory: Box<dyn TargetFactory>,
        remote: Option<RemoteCache>,
    ) -> Self {
        let source = SourceDescriptor::Local(LocalSource::new(name, "."));
        let dirs = NodeDirs {
            src_dir: Some(root_dir.to_path_buf()),
            ..Default::default()
        };
        let root = Arc::new(DependencyNode::new(source, true, dirs));
        let registry = Registry::new();
        registry.insert(Arc::clone(&root));
        DependencyGraph {
            root,
            root_dir: root_dir.to_path_buf(),
            registry,
            layout: OnceLock::new(),
            config,
            factory,
            remote,
        }
    }

    pub fn root(&self) -> &Arc<DependencyNode> {
        &self.root
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn layout(&self) -> Result<&Layout> {
        self.layout
            .get()
            .ok_or_else(|| anyhow!("the root project `{}` is not loaded", self.root.name()))
    }

    /// Declare `source` as a child of `parent`.
    ///
    /// A name already in the graph reuses the existing node and merges the
    /// declaration's arguments into it. Adding the same child to one parent
    /// twice is an error.
    pub fn add_child(
        &self,
        parent: &Arc<DependencyNode>,
        source: SourceDescriptor,
    ) -> Result<Arc<DependencyNode>> {
        let layout = self.layout()?;
        let base = parent.base_dir().unwrap_or_else(|| parent.build_dir());
        let child = self
            .registry
            .declare(source, |s| layout.child_dirs(s, &base))?;

        let mut state = parent.state();
        if state.children.iter().any(|c| Arc::ptr_eq(c, &child)) {
            bail!(
                "`{}` cannot add dependency `{}` because it has already been added",
                parent.name(),
                child.name()
            );
        }
        tracing::debug!("{:<16} ADD {}", parent.name(), child.source());
        state.children.push(Arc::clone(&child));
        Ok(child)
    }

    /// Depth-first search for a node by name.
    pub fn find(&self, name: &str) -> Option<Arc<DependencyNode>> {
        fn search(
            node: &Arc<DependencyNode>,
            name: &str,
            visited: &mut HashSet<String>,
        ) -> Option<Arc<DependencyNode>> {
            if node.name() == name {
                return Some(Arc::clone(node));
            }
            if !visited.insert(node.name().to_string()) {
                return None;
            }
            node.children()
                .iter()
                .find_map(|child| search(child, name, visited))
        }
        search(&self.root, name, &mut HashSet::new())
    }

    /// The root and all its dependencies in link order.
    pub fn flattened_names(&self) -> Vec<String> {
        std::iter::once(Arc::clone(&self.root))
            .chain(flatten(&self.root))
            .map(|n| n.name().to_string())
            .collect()
    }

    /// One line per node: name, source and build decision.
    pub fn list(&self) -> Vec<String> {
        std::iter::once(Arc::clone(&self.root))
            .chain(flatten(&self.root))
            .map(|node| {
                let decision = match node.decision() {
                    Some(d) if d.build => format!("BUILD [{}]", d.reason),
                    Some(d) => d.reason.to_string(),
                    None => String::new(),
                };
                format!("{:<16} {:<48} {}", node.name(), node.source().to_string(), decision)
                    .trim_end()
                    .to_string()
            })
            .collect()
    }

    /// Run `f` with the node's target and a context describing the node.
    ///
    /// The target is taken out of the node for the duration of the call so
    /// no lock is held while build tools run.
    fn with_target<R, F>(&self, node: &DependencyNode, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn Target, &TargetContext<'_>) -> Result<R>,
    {
        let (target, dirs, args) = {
            let mut state = node.state();
            (state.target.take(), state.dirs.clone(), state.args.clone())
        };
        let Some(mut target) = target else {
            bail!("`{}` has no target", node.name());
        };
        let ctx = TargetContext {
            name: node.name(),
            src_dir: dirs.src_dir.as_deref(),
            build_dir: &dirs.build_dir,
            config: &self.config,
            args: &args,
            is_root: node.is_root(),
        };
        let result = f(target.as_mut(), &ctx);
        node.state().target = Some(target);
        result
    }
}

/// Dependencies of `root` in link order: depth first, with a node reached
/// again moved to its later position so every node precedes its own
/// dependencies.
pub fn flatten(root: &Arc<DependencyNode>) -> Vec<Arc<DependencyNode>> {
    fn add_unique(
        children: &[Arc<DependencyNode>],
        ordered: &mut Vec<Arc<DependencyNode>>,
        path: &mut Vec<String>,
    ) {
        for child in children {
            if path.iter().any(|p| p == child.name()) {
                continue;
            }
            if let Some(pos) = ordered.iter().position(|n| Arc::ptr_eq(n, child)) {
                ordered.remove(pos);
            }
            ordered.push(Arc::clone(child));
            path.push(child.name().to_string());
            add_unique(&child.children(), ordered, path);
            path.pop();
        }
    }

    let mut ordered = Vec::new();
    let mut path = vec![root.name().to_string()];
    add_unique(&root.children(), &mut ordered, &mut path);
    ordered
}
