//! Checksum manifests shipped alongside patch sets.
//!
//! Format is `sha256sum` output: `<hex digest>  <file name>` per line, with an
//! optional `*` before the name for binary mode. Blank lines and `#` comments
//! are ignored.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::core::error::PatchError;

use super::locate::PatchSet;

/// File names recognised as manifests. Never applied as patches.
pub const MANIFEST_NAMES: &[&str] = &["sha256sums.txt", "SHA256SUMS", "checksums.sha256"];

/// Parsed manifest: file name to lowercase hex digest.
pub type Manifest = BTreeMap<String, String>;

/// Parse manifest text.
pub fn parse_manifest(text: &str, path: &Path) -> Result<Manifest, PatchError> {
    let mut entries = Manifest::new();

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let malformed = || PatchError::MalformedManifest {
            path: path.to_path_buf(),
            line: idx + 1,
        };

        let (digest, name) = line.split_once(char::is_whitespace).ok_or_else(malformed)?;
        let name = name.trim_start().trim_start_matches('*');
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) || name.is_empty()
        {
            return Err(malformed());
        }
        entries.insert(name.to_string(), digest.to_ascii_lowercase());
    }

    Ok(entries)
}

/// SHA-256 of a file as lowercase hex.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify every patch in `set` against its manifest.
///
/// Returns the names of patches the manifest does not list so the caller can
/// warn about them. A set without a manifest verifies trivially.
pub fn verify_patch_set(set: &PatchSet) -> Result<Vec<String>, PatchError> {
    let Some(manifest_path) = &set.manifest else {
        return Ok(Vec::new());
    };
    let text = std::fs::read_to_string(manifest_path)?;
    let manifest = parse_manifest(&text, manifest_path)?;

    let mut unlisted = Vec::new();
    for patch in &set.patches {
        let name = patch
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let Some(expected) = manifest.get(&name) else {
            unlisted.push(name);
            continue;
        };

        let actual = sha256_file(patch)?;
        if &actual != expected {
            return Err(PatchError::ChecksumMismatch {
                patch: name,
                expected: expected.clone(),
                actual,
            });
        }
    }

    Ok(unlisted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // sha256("hello\n")
    const HELLO_SHA256: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    #[test]
    fn test_sha256_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.patch");
        std::fs::write(&path, "hello\n").unwrap();
        assert_eq!(sha256_file(&path).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn test_parse_manifest() {
        let text = format!(
            "# generated\n{}  0001-a.patch\n\n{} *0002-b.patch\n",
            HELLO_SHA256,
            HELLO_SHA256.to_uppercase()
        );
        let m = parse_manifest(&text, Path::new("sha256sums.txt")).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m["0001-a.patch"], HELLO_SHA256);
        assert_eq!(m["0002-b.patch"], HELLO_SHA256);
    }

    #[test]
    fn test_parse_manifest_rejects_bad_digest() {
        let err = parse_manifest("abc123  0001-a.patch\n", Path::new("SHA256SUMS")).unwrap_err();
        assert!(matches!(err, PatchError::MalformedManifest { line: 1, .. }));
    }

    fn set_with(tmp: &TempDir, manifest: &str) -> PatchSet {
        std::fs::write(tmp.path().join("0001-a.patch"), "hello\n").unwrap();
        std::fs::write(tmp.path().join("0002-b.patch"), "other\n").unwrap();
        std::fs::write(tmp.path().join("sha256sums.txt"), manifest).unwrap();
        PatchSet::from_dir(tmp.path()).unwrap()
    }

    #[test]
    fn test_verify_reports_unlisted() {
        let tmp = TempDir::new().unwrap();
        let set = set_with(&tmp, &format!("{}  0001-a.patch\n", HELLO_SHA256));
        let unlisted = verify_patch_set(&set).unwrap();
        assert_eq!(unlisted, vec!["0002-b.patch".to_string()]);
    }

    #[test]
    fn test_verify_detects_mismatch() {
        let tmp = TempDir::new().unwrap();
        let set = set_with(&tmp, &format!("{}  0002-b.patch\n", HELLO_SHA256));
        let err = verify_patch_set(&set).unwrap_err();
        assert!(matches!(err, PatchError::ChecksumMismatch { ref patch, .. } if patch == "0002-b.patch"));
    }

    #[test]
    fn test_verify_without_manifest() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("0001-a.patch"), "x").unwrap();
        let set = PatchSet::from_dir(tmp.path()).unwrap();
        assert!(verify_patch_set(&set).unwrap().is_empty());
    }
}
