//! Core value types.
//!
//! - Source descriptors (where a dependency comes from)
//! - Package manifests and exported assets
//! - The target capability interface
//! - The build error taxonomy

pub mod asset;
pub mod errors;
pub mod manifest;
pub mod source;
pub mod target;

pub use asset::Asset;
pub use errors::BuildError;
pub use manifest::{Manifest, MANIFEST_FILE};
pub use source::{GitSource, LocalSource, PackageSource, SourceDescriptor};
pub use target::{
    DeployOptions, Exports, NoopFactory, NoopTarget, Target, TargetContext, TargetFactory,
    TargetRequest,
};
