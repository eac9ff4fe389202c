//! Artifact packaging.
//!
//! Targets export through an [`Exporter`]; deployment gathers those exports
//! across the graph into a relocatable package described by `papa.txt`,
//! which can then be archived for the remote cache.

pub mod archive;
pub mod deploy;
pub mod export;
pub mod gather;
pub mod libkind;
pub mod syslib;

pub use deploy::{deploy, Deployment};
pub use export::Exporter;
pub use gather::{gather, Gathered};
pub use syslib::SyslibSearch;
