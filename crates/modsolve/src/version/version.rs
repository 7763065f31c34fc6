use std::cmp::Ordering;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::VersionError;

lazy_static! {
    static ref SEMANTIC_VERSION_RE: Regex = Regex::new(
        r"^[vV]?(\d+(?:\.\d+)*)(?:-([0-9A-Za-z.-]+))?(?:\+([0-9A-Za-z.-]+))?$"
    ).unwrap();
}

/// A single pre-release identifier, compared the way semver does it
#[derive(Debug, Clone, PartialEq, Eq)]
enum PreRelease {
    Numeric(u64),
    Alpha(String),
}

impl Ord for PreRelease {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PreRelease::Numeric(a), PreRelease::Numeric(b)) => a.cmp(b),
            (PreRelease::Numeric(_), PreRelease::Alpha(_)) => Ordering::Less,
            (PreRelease::Alpha(_), PreRelease::Numeric(_)) => Ordering::Greater,
            (PreRelease::Alpha(a), PreRelease::Alpha(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for PreRelease {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A mod version.
///
/// Numeric components are compared as numbers with missing trailing
/// components treated as zero, so `1.0` equals `1.0.0`. A version with a
/// pre-release tag sorts below the same version without one. Build metadata
/// is kept for display only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    raw: String,
    numbers: Vec<u64>,
    pre: Vec<PreRelease>,
}

impl Version {
    /// Parse a version string.
    ///
    /// Only an empty string is rejected; text that is not a semantic version
    /// becomes a raw version.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionError::InvalidVersion(input.to_string()));
        }

        let Some(captures) = SEMANTIC_VERSION_RE.captures(trimmed) else {
            return Ok(Self::raw(trimmed));
        };

        let mut numbers = Vec::new();
        for part in captures[1].split('.') {
            match part.parse::<u64>() {
                Ok(n) => numbers.push(n),
                // Components too large for u64 are not meaningful numbers
                Err(_) => return Ok(Self::raw(trimmed)),
            }
        }

        let pre = captures
            .get(2)
            .map(|m| {
                m.as_str()
                    .split('.')
                    .map(|ident| match ident.parse::<u64>() {
                        Ok(n) => PreRelease::Numeric(n),
                        Err(_) => PreRelease::Alpha(ident.to_string()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            raw: trimmed.to_string(),
            numbers,
            pre,
        })
    }

    /// Create a raw (non-semantic) version
    pub fn raw(input: impl Into<String>) -> Self {
        Self {
            raw: input.into(),
            numbers: Vec::new(),
            pre: Vec::new(),
        }
    }

    /// Build a numeric version from components
    pub fn from_parts(parts: &[u64]) -> Self {
        let raw = parts
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(".");
        Self {
            raw,
            numbers: parts.to_vec(),
            pre: Vec::new(),
        }
    }

    /// Whether this version was parsed as a semantic version
    pub fn is_semantic(&self) -> bool {
        !self.numbers.is_empty()
    }

    /// Whether this version carries a pre-release tag
    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// Numeric component at `index`, zero when absent
    pub fn component(&self, index: usize) -> u64 {
        self.numbers.get(index).copied().unwrap_or(0)
    }

    /// Number of numeric components
    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    /// Whether there are no numeric components (raw versions)
    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    /// The version as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn compare_numbers(&self, other: &Self) -> Ordering {
        let len = self.numbers.len().max(other.numbers.len());
        for i in 0..len {
            match self.component(i).cmp(&other.component(i)) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }

    fn compare_pre(&self, other: &Self) -> Ordering {
        match (self.pre.is_empty(), other.pre.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.pre.cmp(&other.pre),
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_semantic(), other.is_semantic()) {
            (true, true) => self
                .compare_numbers(other)
                .then_with(|| self.compare_pre(other)),
            (false, false) => self.raw.cmp(&other.raw),
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Version::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.raw
    }
}

impl std::str::FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_semantic() {
        let version = v("1.2.3-beta.1+build.5");
        assert!(version.is_semantic());
        assert!(version.is_prerelease());
        assert_eq!(version.component(0), 1);
        assert_eq!(version.component(2), 3);
        assert_eq!(version.component(7), 0);
        assert_eq!(version.to_string(), "1.2.3-beta.1+build.5");
    }

    #[test]
    fn test_parse_raw() {
        let version = v("snapshot-20w14a");
        assert!(!version.is_semantic());
        assert!(Version::parse("   ").is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(v("1.10.0") > v("1.9.9"));
        assert_eq!(v("1.0"), v("1.0.0"));
        assert!(v("2.0.0-rc.1") < v("2.0.0"));
        assert!(v("2.0.0-alpha") < v("2.0.0-beta"));
        assert!(v("2.0.0-alpha.2") < v("2.0.0-alpha.10"));
        assert!(v("1.0.0-1") < v("1.0.0-alpha"));
        assert!(v("0.0.1") > v("whatever"));
    }

    #[test]
    fn test_leading_v() {
        assert_eq!(v("v1.4"), v("1.4.0"));
    }

    #[test]
    fn test_serde_as_string() {
        let version: Version = serde_json::from_str("\"3.1.4\"").unwrap();
        assert_eq!(version, v("3.1.4"));
        assert_eq!(serde_json::to_string(&version).unwrap(), "\"3.1.4\"");
    }
}
