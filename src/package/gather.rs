//! Collect a node's exports, optionally with those of its descendants.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::asset::Asset;
use crate::core::target::DeployOptions;
use crate::graph::node::DependencyNode;
use crate::package::libkind::{is_dynamic_library, lib_basename};
use crate::util::fs::basename;

/// Exports to deploy, each paired with the name of the node that exported it.
#[derive(Debug, Clone, Default)]
pub struct Gathered {
    pub includes: Vec<(String, PathBuf)>,
    pub libs: Vec<(String, PathBuf)>,
    pub syslibs: Vec<(String, String)>,
    pub assets: Vec<(String, Asset)>,
}

impl Gathered {
    pub fn summary(&self) -> String {
        format!(
            "{} includes, {} libs, {} syslibs, {} assets",
            self.includes.len(),
            self.libs.len(),
            self.syslibs.len(),
            self.assets.len()
        )
    }
}

/// Appends items whose key has not been seen yet; the first occurrence wins.
struct Unique<T> {
    seen: HashSet<String>,
    items: Vec<(String, T)>,
}

impl<T> Unique<T> {
    fn new() -> Self {
        Unique {
            seen: HashSet::new(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, owner: &str, key: String, item: T) {
        if self.seen.insert(key) {
            self.items.push((owner.to_string(), item));
        }
    }
}

/// Every descendant of `node` once, depth first.
fn descendants(node: &Arc<DependencyNode>) -> Vec<Arc<DependencyNode>> {
    let mut visited = HashSet::new();
    visited.insert(node.name().to_string());
    let mut out = Vec::new();
    let mut stack: Vec<Arc<DependencyNode>> = node.children().into_iter().rev().collect();
    while let Some(next) = stack.pop() {
        if !visited.insert(next.name().to_string()) {
            continue;
        }
        stack.extend(next.children().into_iter().rev());
        out.push(next);
    }
    out
}

fn path_key(path: &std::path::Path) -> String {
    basename(&path.to_string_lossy()).to_string()
}

/// Gather the exports of `node`, plus those of all its descendants for each
/// category whose recurse flag is set.
///
/// Entries are de-duplicated by file name, so two different libraries with
/// the same name in separate subtrees appear once. Static libraries of
/// descendants are left out; the node itself already links them.
pub fn gather(node: &Arc<DependencyNode>, options: &DeployOptions) -> Gathered {
    let mut includes = Unique::new();
    let mut libs = Unique::new();
    let mut syslibs = Unique::new();
    let mut assets = Unique::new();

    let own = node.exports();
    for inc in own.includes {
        includes.push(node.name(), path_key(&inc), inc);
    }
    for lib in own.libs {
        let key = lib_basename(&lib.to_string_lossy()).to_string();
        libs.push(node.name(), key, lib);
    }
    for sys in own.syslibs {
        syslibs.push(node.name(), lib_basename(&sys).to_string(), sys);
    }
    for asset in own.assets {
        assets.push(node.name(), asset.out_path.clone(), asset);
    }

    let recurse_any = options.recurse_includes
        || options.recurse_libs
        || options.recurse_syslibs
        || options.recurse_assets;
    if recurse_any {
        for dep in descendants(node) {
            let exports = dep.exports();
            if options.recurse_includes {
                for inc in exports.includes {
                    includes.push(dep.name(), path_key(&inc), inc);
                }
            }
            if options.recurse_libs {
                for lib in exports.libs.into_iter().filter(|l| is_dynamic_library(l)) {
                    let key = lib_basename(&lib.to_string_lossy()).to_string();
                    libs.push(dep.name(), key, lib);
                }
            }
            if options.recurse_syslibs {
                for sys in exports.syslibs {
                    syslibs.push(dep.name(), lib_basename(&sys).to_string(), sys);
                }
            }
            if options.recurse_assets {
                for asset in exports.assets {
                    assets.push(dep.name(), asset.out_path.clone(), asset);
                }
            }
        }
    }

    Gathered {
        includes: includes.items,
        libs: libs.items,
        syslibs: syslibs.items,
        assets: assets.items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::{LocalSource, SourceDescriptor};
    use crate::graph::node::NodeDirs;

    fn node(name: &str) -> Arc<DependencyNode> {
        Arc::new(DependencyNode::new(
            SourceDescriptor::Local(LocalSource::new(name, name)),
            false,
            NodeDirs::default(),
        ))
    }

    fn graph() -> Arc<DependencyNode> {
        let app = node("app");
        let png = node("png");
        let zlib = node("zlib");
        {
            let mut s = app.state();
            s.exports.includes.push("/app/include".into());
            s.exports.libs.push("/app/build/libapp.a".into());
            s.exports.syslibs.push("pthread".into());
            s.children.push(Arc::clone(&png));
            s.children.push(Arc::clone(&zlib));
        }
        {
            let mut s = png.state();
            s.exports.includes.push("/png/include".into());
            s.exports.libs.push("/png/build/libpng.a".into());
            s.exports.libs.push("/png/build/libpng.so".into());
            s.exports.syslibs.push("/usr/lib/libpthread.so".into());
            s.children.push(Arc::clone(&zlib));
        }
        {
            let mut s = zlib.state();
            s.exports.includes.push("/zlib/zlib".into());
            s.exports.libs.push("/zlib/build/libz.so".into());
            s.exports.syslibs.push("m".into());
        }
        app
    }

    #[test]
    fn test_gather_own_only() {
        let app = graph();
        let options = DeployOptions {
            path: "deploy/app".into(),
            recurse_includes: false,
            recurse_libs: false,
            recurse_syslibs: false,
            recurse_assets: false,
        };
        let gathered = gather(&app, &options);
        assert_eq!(gathered.includes.len(), 1);
        assert_eq!(gathered.libs, vec![("app".to_string(), PathBuf::from("/app/build/libapp.a"))]);
        assert_eq!(gathered.syslibs.len(), 1);
    }

    #[test]
    fn test_gather_recursive_keeps_only_dynamic_descendant_libs() {
        let app = graph();
        let gathered = gather(&app, &DeployOptions::for_project("app"));

        let libs: Vec<&PathBuf> = gathered.libs.iter().map(|(_, l)| l).collect();
        assert_eq!(
            libs,
            vec![
                &PathBuf::from("/app/build/libapp.a"),
                &PathBuf::from("/png/build/libpng.so"),
                &PathBuf::from("/zlib/build/libz.so"),
            ]
        );
        // zlib is reachable twice but gathered once; `include` dedups by name
        assert_eq!(gathered.includes.len(), 2);
        let syslibs: Vec<&str> = gathered.syslibs.iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(syslibs, vec!["pthread", "/usr/lib/libpthread.so", "m"]);
        assert_eq!(gathered.libs[1].0, "png");
    }
}
