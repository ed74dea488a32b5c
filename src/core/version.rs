//! Dotted version strings.
//!
//! Wine uses `major.minor` release numbers (`10.4`, `9.22`), occasionally
//! with a third component or a release-candidate suffix (`10.0-rc3`).
//! Patch directories are ordered by these rules, not lexicographically,
//! so `wine-9.22` sorts before `wine-10.1`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VersionError {
    #[error("invalid version format: {0}")]
    InvalidFormat(String),
}

/// A dotted-decimal version with an optional prerelease suffix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Version {
    pub components: Vec<u64>,
    pub prerelease: Option<String>,
}

impl Version {
    /// First component, or 0.
    pub fn major(&self) -> u64 {
        self.components.first().copied().unwrap_or(0)
    }

    /// Second component, or 0.
    pub fn minor(&self) -> u64 {
        self.components.get(1).copied().unwrap_or(0)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::InvalidFormat("empty version".to_string()));
        }

        // Split off prerelease (-rc1, etc.)
        let (version_part, prerelease) = match s.find('-') {
            Some(idx) => (&s[..idx], Some(s[idx + 1..].to_string())),
            None => (s, None),
        };

        let components = version_part
            .split('.')
            .map(|p| p.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VersionError::InvalidFormat(s.to_string()))?;

        Ok(Version {
            components,
            prerelease,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.components.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", joined.join("."))?;
        if let Some(ref pre) = self.prerelease {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        // Prerelease versions sort before release versions
        match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => compare_prerelease(a, b),
        }
    }
}

/// `rc2` < `rc10`: a shared alphabetic tag compares by its numeric tail.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    match (split_numeric_tail(a), split_numeric_tail(b)) {
        (Some((tag_a, n_a)), Some((tag_b, n_b))) if tag_a == tag_b => n_a.cmp(&n_b),
        _ => a.cmp(b),
    }
}

fn split_numeric_tail(pre: &str) -> Option<(&str, u64)> {
    let tag = pre.trim_end_matches(|c: char| c.is_ascii_digit());
    let n = pre[tag.len()..].parse().ok()?;
    Some((tag, n))
}

/// Compare two version strings, falling back to byte order when either
/// side does not parse.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (a.parse::<Version>(), b.parse::<Version>()) {
        (Ok(va), Ok(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Truncate a version to its first two dot-separated components.
///
/// Returns `None` when there is nothing to truncate (fewer than two
/// components), since the result would equal the input.
pub fn major_minor(version: &str) -> Option<String> {
    let mut parts = version.split('.');
    let major = parts.next().filter(|p| !p.is_empty())?;
    let minor = parts.next().filter(|p| !p.is_empty())?;
    // Strip any prerelease suffix hanging off the minor component
    let minor = minor.split('-').next().unwrap_or(minor);
    Some(format!("{}.{}", major, minor))
}
