//! Shared utilities

pub mod config;
pub mod diagnostic;
pub mod fs;
pub mod platform;
pub mod process;
pub mod progress;

pub use config::{BuildConfig, Config, Verb};
pub use diagnostic::Diagnostic;
pub use platform::{Arch, Platform};
