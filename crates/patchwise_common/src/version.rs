//! Catalog versions
//!
//! Catalog entries carry a display name such as "Release 1.2". The first
//! `\d+\.\d+` match becomes the version string; names without a match keep
//! their raw text. Ordering follows semantic versioning after a lenient parse
//! ("1.2" is treated as 1.2.0).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// Pattern used to pull a version out of a catalog display name
const VERSION_PATTERN: &str = r"\d+\.\d+";

/// Version reported when nothing newer than the current version exists
pub const BASELINE_VERSION: &str = "0.0.0";

fn version_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(VERSION_PATTERN).expect("version pattern is valid"))
}

/// A comparable version string
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Version {
    raw: String,
    parsed: Option<semver::Version>,
}

impl Version {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let parsed = parse_lenient(&raw);
        Self { raw, parsed }
    }

    /// The "no version" starting point used when tracking the latest version
    pub fn baseline() -> Self {
        Self::new(BASELINE_VERSION)
    }

    /// Extract a version from a catalog display name.
    ///
    /// "Release 1.1" yields "1.1"; a name without a `major.minor` pair is
    /// kept verbatim.
    pub fn from_display_name(name: &str) -> Self {
        match version_pattern().find(name) {
            Some(m) => Self::new(m.as_str()),
            None => Self::new(name),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the string parsed as a semantic version
    pub fn is_semantic(&self) -> bool {
        self.parsed.is_some()
    }

    /// Strictly newer by semantic ordering alone ("1.1" is not newer than "1.1.0")
    pub fn is_newer_than(&self, other: &Version) -> bool {
        self.semantic_cmp(other) == Ordering::Greater
    }

    fn semantic_cmp(&self, other: &Version) -> Ordering {
        match (&self.parsed, &other.parsed) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => self.raw.cmp(&other.raw),
        }
    }
}

/// Parse "1", "1.2", "v1.2.3" or "1.2.3-rc.1" into a semantic version.
///
/// Numeric parts are read as integers, so zero-padded parts such as the
/// "01" in "2024.01" are accepted and compare as 1.
fn parse_lenient(raw: &str) -> Option<semver::Version> {
    let trimmed = raw.trim().trim_start_matches(['v', 'V']);
    let (core, suffix) = match trimmed.find(['-', '+']) {
        Some(idx) => trimmed.split_at(idx),
        None => (trimmed, ""),
    };

    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 {
        return None;
    }
    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = part.parse().ok()?;
    }

    let mut version = semver::Version::new(numbers[0], numbers[1], numbers[2]);
    let (pre, build) = match suffix.find('+') {
        Some(idx) => (&suffix[..idx], &suffix[idx + 1..]),
        None => (suffix, ""),
    };
    if let Some(pre) = pre.strip_prefix('-') {
        if pre.is_empty() {
            return None;
        }
        version.pre = semver::Prerelease::new(pre).ok()?;
    }
    if suffix.contains('+') {
        if build.is_empty() {
            return None;
        }
        version.build = semver::BuildMetadata::new(build).ok()?;
    }
    Some(version)
}

impl Default for Version {
    fn default() -> Self {
        Self::baseline()
    }
}

impl From<String> for Version {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for Version {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.raw
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    // Raw text breaks semantic ties so the ordering agrees with equality
    fn cmp(&self, other: &Self) -> Ordering {
        self.semantic_cmp(other)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_display_name() {
        assert_eq!(Version::from_display_name("Release 1.1").as_str(), "1.1");
        assert_eq!(Version::from_display_name("Release 2.0").as_str(), "2.0");
        assert_eq!(Version::from_display_name("app-10.42.7.zip").as_str(), "10.42");
    }

    #[test]
    fn test_extract_falls_back_to_raw_name() {
        let version = Version::from_display_name("nightly");
        assert_eq!(version.as_str(), "nightly");
        assert!(!version.is_semantic());
    }

    #[test]
    fn test_lenient_parse() {
        assert!(Version::new("1").is_semantic());
        assert!(Version::new("1.2").is_semantic());
        assert!(Version::new("v1.2.3").is_semantic());
        assert!(Version::new("1.2-rc.1").is_semantic());
        assert!(!Version::new("1.x").is_semantic());
        assert!(!Version::new("1.2.3.4").is_semantic());
        assert!(!Version::new("").is_semantic());
    }

    #[test]
    fn test_zero_padded_parts() {
        let version = Version::new("2024.01");
        assert!(version.is_semantic());
        assert!(version.is_newer_than(&Version::new("2023.12")));
        assert!(!version.is_newer_than(&Version::new("2024.1")));
        assert!(Version::new("2024.02") > version);
        assert!(Version::new("1.02.003-rc.1+build.7").is_semantic());
        assert_eq!(Version::from_display_name("Release 2024.01"), version);
    }

    #[test]
    fn test_empty_suffix_parts_are_rejected() {
        assert!(!Version::new("1.2-").is_semantic());
        assert!(!Version::new("1.2+").is_semantic());
        assert!(!Version::new("1..2").is_semantic());
    }

    #[test]
    fn test_semantic_ordering() {
        assert!(Version::new("1.10") > Version::new("1.9"));
        assert!(Version::new("2.0") > Version::new("1.99"));
        assert!(Version::new("1.1") > Version::new("1.0"));
        assert!(Version::new("1.2.0-rc.1") < Version::new("1.2"));
    }

    #[test]
    fn test_is_newer_than_ignores_raw_spelling() {
        assert!(!Version::new("1.1.0").is_newer_than(&Version::new("1.1")));
        assert!(!Version::new("1.1").is_newer_than(&Version::new("1.1.0")));
        assert!(Version::new("1.2").is_newer_than(&Version::new("1.1.9")));
    }

    #[test]
    fn test_unparseable_sorts_below_semantic() {
        assert!(Version::new("nightly") < Version::baseline());
        assert!(!Version::new("nightly").is_newer_than(&Version::new("0.1")));
    }

    #[test]
    fn test_ord_agrees_with_eq() {
        let a = Version::new("1.1");
        let b = Version::new("1.1.0");
        assert_ne!(a, b);
        assert_ne!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a.cmp(&Version::new("1.1")), Ordering::Equal);
    }

    #[test]
    fn test_serde_as_plain_string() {
        let json = serde_json::to_string(&Version::new("1.4")).unwrap();
        assert_eq!(json, "\"1.4\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Version::new("1.4"));
        assert!(back.is_semantic());
    }
}
