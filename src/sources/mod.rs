//! Dependency sources.
//!
//! Git dependencies are cloned into the workspace and compared against the
//! status record saved by the previous run to decide whether they changed.

pub mod git;
pub mod status;

pub use git::{ChangeDetector, Changes, CheckoutRequest};
pub use status::StatusRecord;
