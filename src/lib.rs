//! Burrow - a build orchestrator for native projects
//!
//! This crate provides the dependency graph, incremental rebuild decisions,
//! package manifests and the remote package cache. Compiling is delegated to
//! a [`Target`](core::Target) per node.

pub mod core;
pub mod graph;
pub mod package;
pub mod remote;
pub mod sources;
pub mod targets;
pub mod util;

/// Test utilities for Burrow unit tests.
///
/// Provides local git upstreams and a scripted target factory that records
/// the hooks the graph invokes.
#[cfg(test)]
pub mod test_support;

pub use core::{BuildError, Manifest, SourceDescriptor, Target, TargetFactory};
pub use graph::DependencyGraph;
pub use remote::RemoteCache;
pub use util::config::{BuildConfig, Verb};
