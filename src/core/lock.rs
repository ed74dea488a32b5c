//! Source tree lock management
//!
//! Provides exclusive locking so only one orchestration mutates a tree at a time.
//! The lock file lives next to the tree, never inside it, so it cannot show up
//! in patch targets or packaged output.

use fs2::FileExt;
use std::fs::File;
use std::path::{Component, Path, PathBuf};

use super::error::PatchError;

/// How old a lock file can be before it's considered stale (2 hours)
const STALE_LOCK_AGE_SECS: u64 = 7200;

fn is_stale_lock(lock_path: &Path) -> bool {
    if let Ok(metadata) = std::fs::metadata(lock_path)
        && let Ok(modified) = metadata.modified()
        && let Ok(age) = std::time::SystemTime::now().duration_since(modified)
    {
        return age.as_secs() > STALE_LOCK_AGE_SECS;
    }
    false
}

/// Lock file path for a source tree: `<parent>/<name>.wine-builder.lock`
///
/// `tree` is made absolute and `.`/`..` are resolved first, so `.` and
/// `wine-10.4/src/..` still lock from outside the tree.
pub fn lock_path_for(tree: &Path) -> PathBuf {
    let tree = normalize(tree);
    let name = tree
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "source".to_string());
    let parent = tree.parent().unwrap_or(tree.as_path());
    parent.join(format!("{}.wine-builder.lock", name))
}

/// Absolute form of `path` with `.` and `..` resolved lexically.
fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Acquire an exclusive lock on a source tree.
/// Returns a guard that releases the lock when dropped.
pub fn acquire_tree_lock(tree: &Path) -> Result<TreeLock, PatchError> {
    let lock_path = lock_path_for(tree);

    if lock_path.exists() && is_stale_lock(&lock_path) {
        let _ = std::fs::remove_file(&lock_path);
    }

    let lock_file = File::create(&lock_path)?;

    if lock_file.try_lock_exclusive().is_err() {
        return Err(PatchError::Locked(tree.to_path_buf()));
    }

    Ok(TreeLock {
        _file: lock_file,
        path: lock_path,
    })
}

/// RAII guard - releases lock and deletes lock file when dropped
#[derive(Debug)]
pub struct TreeLock {
    _file: File,
    path: PathBuf,
}

impl Drop for TreeLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
