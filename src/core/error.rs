//! Error types.
//!
//! Soft conditions (unknown version, no patch directory, empty patch set,
//! a single patch failing under the warn policy) are values, not errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop patch orchestration.
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to run {tool}: {source}")]
    ToolSpawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("source tree not found: {0}")]
    MissingSourceTree(PathBuf),

    #[error("checksum mismatch for {patch}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        patch: String,
        expected: String,
        actual: String,
    },

    #[error("malformed checksum manifest {path}: line {line}")]
    MalformedManifest { path: PathBuf, line: usize },

    #[error("source tree {0} is locked by another wine-builder process")]
    Locked(PathBuf),

    #[error("{} patch(es) failed to apply: {}", failed.len(), failed.join(", "))]
    PatchesFailed { failed: Vec<String> },
}

/// Errors from the build pipeline's external collaborators.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("command failed: {cmd} (exit code: {code:?})")]
    CommandFailed { cmd: String, code: Option<i32> },

    #[error("download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid release version: {0}")]
    InvalidVersion(String),

    #[error("archive contains unsafe path: {0}")]
    UnsafePath(PathBuf),

    #[error("archive {0} does not contain a single top-level directory")]
    NoTopLevelDir(PathBuf),

    #[error("no supported package manager found (tried apt-get, dnf, pacman)")]
    NoPackageManager,

    #[error("unknown package manager: {0}")]
    UnknownPackageManager(String),
}
