//! Name-keyed node registry owned by a graph.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::Result;

use crate::core::source::SourceDescriptor;
use crate::graph::node::{DependencyNode, NodeDirs};

/// All nodes of one build run, keyed by name.
///
/// The first declaration of a name creates the node; later declarations
/// only contribute their extra arguments.
#[derive(Debug, Default)]
pub struct Registry {
    nodes: RwLock<HashMap<String, Arc<DependencyNode>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<DependencyNode>> {
        self.nodes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert the root node.
    pub fn insert(&self, node: Arc<DependencyNode>) {
        self.nodes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(node.name().to_string(), node);
    }

    /// Look up the node declared by `source`, creating it on first sight.
    ///
    /// `dirs` is only called for new nodes. An existing node gets any of the
    /// declaration's arguments it does not already have.
    pub fn declare<F>(&self, source: SourceDescriptor, dirs: F) -> Result<Arc<DependencyNode>>
    where
        F: FnOnce(&SourceDescriptor) -> Result<NodeDirs>,
    {
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = nodes.get(source.name()) {
            let existing = Arc::clone(existing);
            drop(nodes);
            merge_args(&existing, source.args());
            return Ok(existing);
        }

        let dirs = dirs(&source)?;
        let node = Arc::new(DependencyNode::new(source, false, dirs));
        nodes.insert(node.name().to_string(), Arc::clone(&node));
        Ok(node)
    }
}

fn merge_args(node: &DependencyNode, args: &[String]) {
    if args.is_empty() {
        return;
    }
    let mut state = node.state();
    for arg in args {
        if !state.args.contains(arg) {
            state.args.push(arg.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::LocalSource;
    use std::path::PathBuf;

    fn local(name: &str, args: &[&str]) -> SourceDescriptor {
        let mut src = LocalSource::new(name, name);
        src.args = args.iter().map(|a| a.to_string()).collect();
        SourceDescriptor::Local(src)
    }

    fn dirs(_: &SourceDescriptor) -> Result<NodeDirs> {
        Ok(NodeDirs {
            dep_dir: PathBuf::from("/ws/zlib"),
            build_dir: PathBuf::from("/ws/zlib/linux"),
            ..Default::default()
        })
    }

    #[test]
    fn test_duplicate_declaration_merges_args() {
        let registry = Registry::new();
        let a = registry.declare(local("zlib", &["-DA=1"]), dirs).unwrap();
        let b = registry
            .declare(local("zlib", &["-DA=1", "-DB=2"]), |_| {
                panic!("dirs are only computed for new nodes")
            })
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert_eq!(a.state().args, vec!["-DA=1".to_string(), "-DB=2".to_string()]);
    }

    #[test]
    fn test_first_declaration_wins() {
        let registry = Registry::new();
        registry.declare(local("zlib", &[]), dirs).unwrap();
        let mut other = LocalSource::new("zlib", "elsewhere");
        other.always_build = true;
        let node = registry.declare(SourceDescriptor::Local(other), dirs).unwrap();

        match node.source() {
            SourceDescriptor::Local(l) => assert_eq!(l.rel_path, "zlib"),
            other => panic!("unexpected source {:?}", other),
        }
        assert!(!node.state().always_build);
    }
}
