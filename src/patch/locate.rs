//! Patch set lookup.
//!
//! A patch root holds one directory per release (`wine-10.1/`, `wine-10.4/`,
//! `wine-9.22/`). For a detected version the first existing root is searched
//! for an exact match, then a `major.minor` match, then the lowest-versioned
//! `<prefix>-*` directory as a best effort.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::core::version;

use super::manifest::MANIFEST_NAMES;

/// File extensions accepted as patches
pub const PATCH_EXTENSIONS: &[&str] = &["patch", "diff"];

/// Ordered patch files from one version directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSet {
    pub dir: PathBuf,
    /// Sorted by file name; this is the application order
    pub patches: Vec<PathBuf>,
    /// Checksum manifest, if the directory has one
    pub manifest: Option<PathBuf>,
}

impl PatchSet {
    /// Collect the patches in `dir`. Manifests and any file without a patch
    /// extension are left out.
    pub fn from_dir(dir: &Path) -> std::io::Result<Self> {
        let mut patches = Vec::new();
        let mut manifest = None;

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if MANIFEST_NAMES.contains(&name.as_str()) {
                manifest = Some(path);
                continue;
            }
            if is_patch_file(&path) {
                patches.push(path);
            }
        }

        patches.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        Ok(Self {
            dir: dir.to_path_buf(),
            patches,
            manifest,
        })
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

/// True when `path` carries one of [`PATCH_EXTENSIONS`].
pub fn is_patch_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| PATCH_EXTENSIONS.contains(&ext))
}

/// Which lookup rule produced the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Exact,
    MajorMinor,
    /// Version may not match the source tree
    BestEffort,
}

/// A located version directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub root: PathBuf,
    pub dir: PathBuf,
    pub rule: MatchRule,
}

/// Find the patch directory for `version`.
///
/// Only the first root that exists is searched; roots are never merged.
/// Returns `None` when no root exists or nothing under it matches.
pub fn locate(version: &str, roots: &[PathBuf], prefix: &str) -> Option<Located> {
    let root = roots.iter().find(|r| r.is_dir())?;

    let found = |dir: PathBuf, rule| Located {
        root: root.clone(),
        dir,
        rule,
    };

    let exact = root.join(format!("{}-{}", prefix, version));
    if exact.is_dir() {
        return Some(found(exact, MatchRule::Exact));
    }

    if let Some(mm) = version::major_minor(version)
        && mm != version
    {
        let dir = root.join(format!("{}-{}", prefix, mm));
        if dir.is_dir() {
            return Some(found(dir, MatchRule::MajorMinor));
        }
    }

    let mut candidates = prefixed_dirs(root, prefix);
    candidates.sort_by(|a, b| version::compare(&a.0, &b.0));
    candidates
        .into_iter()
        .next()
        .map(|(_, dir)| found(dir, MatchRule::BestEffort))
}

/// `<prefix>-*` directories under `root`, paired with their version suffix.
fn prefixed_dirs(root: &Path, prefix: &str) -> Vec<(String, PathBuf)> {
    let marker = format!("{}-", prefix);
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };

    entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            let suffix = name.strip_prefix(&marker)?.to_string();
            Some((suffix, e.path()))
        })
        .collect()
}
