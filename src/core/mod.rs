//! Core infrastructure shared by the patch orchestrator and the build pipeline

pub mod config;
pub mod error;
pub mod lock;
pub mod output;
pub mod version;

pub use config::{BuildConfig, FailurePolicy, Toolchain};
pub use error::{BuildError, PatchError};
