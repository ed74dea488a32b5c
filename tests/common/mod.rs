//! Shared fixtures: small Wine-like source trees and patch directories.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Relative path of the file every fixture patch touches
pub const LOADER: &str = "dlls/ntdll/loader.c";

/// Changes line 5; applies cleanly.
pub const CLEAN_PATCH: &str = "\
--- a/dlls/ntdll/loader.c
+++ b/dlls/ntdll/loader.c
@@ -2,7 +2,7 @@
 line 2
 line 3
 line 4
-line 5
+line 5 fixed
 line 6
 line 7
 line 8
";

/// Changes line 12; outer context lines are off, so it needs fuzz.
pub const FUZZY_PATCH: &str = "\
--- a/dlls/ntdll/loader.c
+++ b/dlls/ntdll/loader.c
@@ -9,7 +9,7 @@
 line nine
 line 10
 line 11
-line 12
+line 12 fixed
 line 13
 line 14
 line fifteen
";

/// Context matches nothing in the tree.
pub const CORRUPT_PATCH: &str = "\
--- a/dlls/ntdll/loader.c
+++ b/dlls/ntdll/loader.c
@@ -1,3 +1,3 @@
 nothing
-here
+there
 matches
";

/// Creates dlls/ntdll/new.c
pub const NEW_FILE_PATCH: &str = "\
--- /dev/null
+++ b/dlls/ntdll/new.c
@@ -0,0 +1,2 @@
+int x;
+int y;
";

pub fn loader_text() -> String {
    (1..=20).map(|i| format!("line {i}\n")).collect()
}

/// A `wine-<version>` tree with a VERSION file and one source file.
pub fn wine_tree(parent: &Path, version: &str) -> PathBuf {
    let tree = parent.join(format!("wine-{version}"));
    std::fs::create_dir_all(tree.join("dlls/ntdll")).unwrap();
    std::fs::write(tree.join("VERSION"), format!("Wine version {version}\n")).unwrap();
    std::fs::write(tree.join(LOADER), loader_text()).unwrap();
    tree
}

/// Write `patches` (name, body) into `<root>/<dir_name>/`.
pub fn patch_dir(root: &Path, dir_name: &str, patches: &[(&str, &str)]) -> PathBuf {
    let dir = root.join(dir_name);
    std::fs::create_dir_all(&dir).unwrap();
    for (name, body) in patches {
        std::fs::write(dir.join(name), body).unwrap();
    }
    dir
}

/// Snapshot of every regular file under `root`, sorted by path.
pub fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut files: Vec<_> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            (rel, std::fs::read(e.path()).unwrap())
        })
        .collect();
    files.sort();
    files
}

/// True when GNU patch is available to run integration tests against.
pub fn have_patch() -> bool {
    which::which("patch").is_ok()
}

pub fn tempdir() -> TempDir {
    TempDir::new().unwrap()
}
