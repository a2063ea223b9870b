//! Semantic version parsing and range matching
//!
//! Provides the version model shared by the manifest, resolver, and sources.

use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Errors that can occur while parsing versions or ranges
#[derive(Debug, Error)]
pub enum VersionError {
    /// Invalid version format
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// Invalid range format
    #[error("Invalid version range: {0}")]
    InvalidRange(String),
}

/// Semantic version (MAJOR.MINOR.PATCH, optional prerelease and build tags)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
    pub build: Option<String>,
}

/// A predicate over semantic versions
///
/// Ranges are immutable once parsed. The caret form is the one the manifest
/// records by default: `^1.2.0` matches any version with the same major
/// component that is at least `1.2.0`.
#[derive(Debug, Clone, PartialEq)]
pub enum VersionRange {
    /// Exact version (`1.2.3` or `=1.2.3`)
    Exact(Version),

    /// Caret range (`^1.2.3`: same major, >= 1.2.3)
    Caret(Version),

    /// Tilde range (`~1.2.3`: same major.minor, >= 1.2.3)
    Tilde(Version),

    /// Greater than (`>1.2.3`)
    GreaterThan(Version),

    /// Greater than or equal (`>=1.2.3`)
    GreaterThanOrEqual(Version),

    /// Less than (`<1.2.3`)
    LessThan(Version),

    /// Less than or equal (`<=1.2.3`)
    LessThanOrEqual(Version),

    /// Wildcard (`1.*` or `1.2.*`)
    Wildcard(u64, Option<u64>),

    /// Any version (`*`)
    Any,
}

impl Version {
    /// Create a version with no prerelease or build tag
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
            prerelease: None,
            build: None,
        }
    }

    /// Parse a version string
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();
        let s = s.strip_prefix('v').unwrap_or(s);

        // Split off build metadata, then the prerelease tag
        let (rest, build) = match s.split_once('+') {
            Some((v, b)) => (v, Some(b.to_string())),
            None => (s, None),
        };
        let (core, prerelease) = match rest.split_once('-') {
            Some((v, p)) => (v, Some(p.to_string())),
            None => (rest, None),
        };

        let mut parts = core.split('.');
        let major = parse_component(parts.next(), s)?;
        let minor = parse_component(parts.next(), s)?;
        let patch = parse_component(parts.next(), s)?;
        if parts.next().is_some() {
            return Err(VersionError::InvalidVersion(format!(
                "Expected MAJOR.MINOR.PATCH, got '{}'",
                s
            )));
        }

        Ok(Version {
            major,
            minor,
            patch,
            prerelease,
            build,
        })
    }

    /// Check if this is a prerelease version
    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }
}

fn parse_component(part: Option<&str>, whole: &str) -> Result<u64, VersionError> {
    let part = part.ok_or_else(|| {
        VersionError::InvalidVersion(format!("Expected MAJOR.MINOR.PATCH, got '{}'", whole))
    })?;
    part.parse().map_err(|_| {
        VersionError::InvalidVersion(format!("Invalid version component '{}' in '{}'", part, whole))
    })
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref pre) = self.prerelease {
            write!(f, "-{}", pre)?;
        }
        if let Some(ref build) = self.build {
            write!(f, "+{}", build)?;
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
        match self.major.cmp(&other.major) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.minor.cmp(&other.minor) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match self.patch.cmp(&other.patch) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // A prerelease sorts below the release it precedes
        match (&self.prerelease, &other.prerelease) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl VersionRange {
    /// Parse a range string
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();

        if s == "*" || s.eq_ignore_ascii_case("latest") {
            return Ok(VersionRange::Any);
        }

        if let Some(rest) = s.strip_prefix(">=") {
            return Ok(VersionRange::GreaterThanOrEqual(Version::parse(rest)?));
        }
        if let Some(rest) = s.strip_prefix("<=") {
            return Ok(VersionRange::LessThanOrEqual(Version::parse(rest)?));
        }
        if let Some(rest) = s.strip_prefix('>') {
            return Ok(VersionRange::GreaterThan(Version::parse(rest)?));
        }
        if let Some(rest) = s.strip_prefix('<') {
            return Ok(VersionRange::LessThan(Version::parse(rest)?));
        }
        if let Some(rest) = s.strip_prefix('^') {
            return Ok(VersionRange::Caret(Version::parse(rest)?));
        }
        if let Some(rest) = s.strip_prefix('~') {
            return Ok(VersionRange::Tilde(Version::parse(rest)?));
        }
        if let Some(rest) = s.strip_prefix('=') {
            return Ok(VersionRange::Exact(Version::parse(rest)?));
        }

        if s.contains('*') {
            return Self::parse_wildcard(s);
        }

        Ok(VersionRange::Exact(Version::parse(s)?))
    }

    fn parse_wildcard(s: &str) -> Result<Self, VersionError> {
        let parts: Vec<&str> = s.split('.').collect();
        let invalid = || VersionError::InvalidRange(format!("Invalid wildcard: {}", s));

        match parts.as_slice() {
            ["*"] => Ok(VersionRange::Any),
            [major, "*"] => {
                let major = major.parse().map_err(|_| invalid())?;
                Ok(VersionRange::Wildcard(major, None))
            }
            [major, minor, "*"] => {
                let major = major.parse().map_err(|_| invalid())?;
                let minor = minor.parse().map_err(|_| invalid())?;
                Ok(VersionRange::Wildcard(major, Some(minor)))
            }
            _ => Err(invalid()),
        }
    }

    /// Check whether a version satisfies this range
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionRange::Any => true,

            VersionRange::Exact(v) => {
                version.major == v.major
                    && version.minor == v.minor
                    && version.patch == v.patch
                    && version.prerelease == v.prerelease
            }

            // ^1.2.3: same major component, >= 1.2.3
            VersionRange::Caret(v) => version.major == v.major && version >= v,

            // ~1.2.3: same major.minor, >= 1.2.3
            VersionRange::Tilde(v) => {
                version.major == v.major && version.minor == v.minor && version >= v
            }

            VersionRange::GreaterThan(v) => version > v,
            VersionRange::GreaterThanOrEqual(v) => version >= v,
            VersionRange::LessThan(v) => version < v,
            VersionRange::LessThanOrEqual(v) => version <= v,

            VersionRange::Wildcard(major, minor) => match minor {
                Some(m) => version.major == *major && version.minor == *m,
                None => version.major == *major,
            },
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRange::Any => write!(f, "*"),
            VersionRange::Exact(v) => write!(f, "{}", v),
            VersionRange::Caret(v) => write!(f, "^{}", v),
            VersionRange::Tilde(v) => write!(f, "~{}", v),
            VersionRange::GreaterThan(v) => write!(f, ">{}", v),
            VersionRange::GreaterThanOrEqual(v) => write!(f, ">={}", v),
            VersionRange::LessThan(v) => write!(f, "<{}", v),
            VersionRange::LessThanOrEqual(v) => write!(f, "<={}", v),
            VersionRange::Wildcard(major, Some(minor)) => write!(f, "{}.{}.*", major, minor),
            VersionRange::Wildcard(major, None) => write!(f, "{}.*", major),
        }
    }
}
