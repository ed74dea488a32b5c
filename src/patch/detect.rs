//! Source tree version detection.
//!
//! Looks at the `VERSION` marker first (`Wine version 10.4`), then the
//! autoconf outputs: a `PACKAGE_VERSION='10.4'` assignment in `configure`,
//! or the `AC_INIT([Wine],[10.4], ...)` call in `configure` / `configure.ac`.
//! Never fails; anything unreadable degrades to [`DetectedVersion::Unknown`].

use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

/// Version marker file at the tree root
pub const VERSION_FILE: &str = "VERSION";

/// Build configuration scripts, in lookup order
pub const CONFIGURE_SCRIPTS: &[&str] = &["configure", "configure.ac"];

/// Variable carrying the release number in generated configure scripts
const VERSION_VARIABLE: &str = "PACKAGE_VERSION";

// "Wine version 10.4", "wine-10.4" or "Wine version 10.0-rc3"
static MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[A-Za-z])[ \t-]+v?([0-9]+(?:\.[0-9]+)*(?:-rc[0-9]+)?)")
        .expect("Invalid marker regex")
});

static ASSIGNMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r#"(?m)^\s*{}=['"]?([0-9][0-9A-Za-z.\-]*)['"]?"#, VERSION_VARIABLE);
    Regex::new(&pattern).expect("Invalid assignment regex")
});

// AC_INIT([Wine],[10.4],[bugs],...) with or without brackets
static INIT_MACRO_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"AC_INIT\(\s*\[?[^,\]\)]*\]?\s*,\s*\[?\s*([0-9]+(?:\.[0-9]+)*(?:-rc[0-9]+)?)")
        .expect("Invalid AC_INIT regex")
});

/// Result of probing a source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectedVersion {
    Known(String),
    Unknown,
}

impl DetectedVersion {
    pub fn as_known(&self) -> Option<&str> {
        match self {
            Self::Known(v) => Some(v),
            Self::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

impl fmt::Display for DetectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(v) => write!(f, "{}", v),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Detect the version of the source tree at `root`.
pub fn detect_version(root: &Path) -> DetectedVersion {
    let marker = root.join(VERSION_FILE);
    if marker.is_file() {
        if let Some(v) = std::fs::read_to_string(&marker)
            .ok()
            .and_then(|text| version_from_marker(&text))
        {
            return DetectedVersion::Known(v);
        }
    }

    for script in CONFIGURE_SCRIPTS {
        let path = root.join(script);
        if !path.is_file() {
            continue;
        }
        // configure can contain non-UTF-8 bytes; a lossy read is enough for matching
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        let text = String::from_utf8_lossy(&bytes);
        if let Some(v) = version_from_configure(&text) {
            return DetectedVersion::Known(v);
        }
    }

    DetectedVersion::Unknown
}

/// Extract the version from the first line of a marker file.
pub fn version_from_marker(text: &str) -> Option<String> {
    let first = text.lines().next()?.trim();
    MARKER_REGEX
        .captures(first)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract the version from a configure script or configure.ac.
///
/// An explicit assignment wins over the init macro.
pub fn version_from_configure(text: &str) -> Option<String> {
    if let Some(m) = ASSIGNMENT_REGEX.captures(text).and_then(|c| c.get(1)) {
        return Some(m.as_str().to_string());
    }
    INIT_MACRO_REGEX
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
