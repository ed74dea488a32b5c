//! Patch orchestrator and build driver for Wine
//!
//! Given a Wine source tree, `wine-builder` detects its version, finds the
//! matching patch set, applies every patch with tiered fuzz tolerance and
//! reports a per-patch verdict. Around that core sits a small build driver
//! that fetches sources, installs dependencies, runs configure/make and packs
//! the install tree.
//!
//! # Patch directory layout
//!
//! ```text
//! patches/
//!   wine-10.4/          exact match for 10.4
//!     0001-fix-a.patch
//!     0002-fix-b.diff
//!     sha256sums.txt    optional checksum manifest
//!   wine-9.22/          major.minor match for 9.22.1
//! ```
//!
//! # Outcomes
//!
//! Each patch ends in exactly one of:
//! - `applied` - applied with no fuzz
//! - `applied with fuzz` - applied at fuzz factor 3
//! - `already applied` - changes are already present; tree untouched
//! - `FAILED` - could not be applied; tree untouched
//!
//! # Configuration
//!
//! TOML layers are read from `$XDG_CONFIG_DIRS/wine-builder/config.toml`,
//! then `$XDG_CONFIG_HOME/wine-builder/config.toml`, then `--config FILE`.

pub mod build;
pub mod core;
pub mod patch;
pub mod pipeline;

pub use crate::core::output;
pub use crate::core::{BuildConfig, BuildError, FailurePolicy, PatchError};
pub use patch::{GnuPatch, OrchestrationResult, PatchOutcome, PatchReport, orchestrate};
