//! Package sources
//!
//! A source lists the available versions of a package and fetches package
//! metadata plus content. Two variants exist: the bundled stdlib directory
//! and the remote registry.

mod local;
mod registry;

pub use local::{LocalSource, PackageNames, STDLIB_EXTENSION};
pub use registry::{content_checksum, PackageRecord, RegistrySource, VersionList};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::version::{Version, VersionError, VersionRange};

/// Errors that can occur while talking to a package source
#[derive(Debug, Error)]
pub enum SourceError {
    /// Package unknown to this source
    #[error("Package not found: {0}")]
    NotFound(String),

    /// Package known, requested version absent
    #[error("Version {version} not found for package {package}")]
    VersionNotFound { package: String, version: String },

    /// Network deadline exceeded after bounded retries
    #[error("Request for {package} timed out after {attempts} attempt(s)")]
    Timeout { package: String, attempts: u32 },

    /// Metadata that does not match the expected shape
    #[error("Malformed metadata for {package}: {reason}")]
    Malformed { package: String, reason: String },

    /// Registry reachable but answering with a non-success status
    #[error("Registry unavailable: {0}")]
    Unavailable(String),

    /// Transport-level HTTP failure (connection refused, TLS, DNS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Downloaded content does not match its declared checksum
    #[error("Checksum mismatch for {package}@{version}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        package: String,
        version: String,
        expected: String,
        actual: String,
    },

    /// Local filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache failure while persisting a fetch
    #[error("Cache error: {0}")]
    Cache(#[from] crate::cache::CacheError),
}

impl SourceError {
    /// Whether this error means "this source cannot supply the package"
    ///
    /// Such errors are non-fatal during resolution: another source may still
    /// satisfy the request. Timeouts and local IO failures are not absence
    /// and always surface.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            SourceError::NotFound(_)
                | SourceError::VersionNotFound { .. }
                | SourceError::Malformed { .. }
                | SourceError::Unavailable(_)
                | SourceError::Http(_)
                | SourceError::ChecksumMismatch { .. }
        )
    }
}

/// Package metadata as fetched from a source
///
/// Immutable once fetched; cached alongside the content by (name, version).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageMetadata {
    /// Package name
    pub name: String,

    /// Semver version
    pub version: String,

    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Supported hardware identifiers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hardware: Vec<String>,

    /// Declared dependencies: name -> version range string
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl PackageMetadata {
    /// Metadata for a package that declares nothing beyond its identity
    pub fn bare(name: &str, version: &Version) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            description: None,
            hardware: Vec::new(),
            dependencies: BTreeMap::new(),
        }
    }

    /// Parse the declared dependency map into typed ranges
    pub fn dependency_ranges(&self) -> Result<Vec<(String, VersionRange)>, VersionError> {
        let mut ranges = Vec::new();
        for (name, range) in &self.dependencies {
            ranges.push((name.clone(), VersionRange::parse(range)?));
        }
        Ok(ranges)
    }
}

/// A fetched package: metadata plus content blob
#[derive(Debug, Clone)]
pub struct FetchedPackage {
    pub metadata: PackageMetadata,
    pub content: Vec<u8>,
}

/// A source of packages
///
/// `list_versions` must be side-effect free; only `fetch` may populate the
/// cache.
pub trait PackageSource: Sync {
    /// Source name for display (e.g. "stdlib", "registry")
    fn name(&self) -> &str;

    /// List available versions of a package, highest first
    fn list_versions(&self, package: &str) -> Result<Vec<Version>, SourceError>;

    /// Fetch metadata and content for one version of a package
    fn fetch(&self, package: &str, version: &Version) -> Result<FetchedPackage, SourceError>;
}
