//! Remote registry source
//!
//! Blocking HTTP client for the Kinetrix package registry. Kinetrix packages
//! are single-file modules, so a version record carries the package source
//! inline together with its checksum; there is no separate download step.
//!
//! Timed-out requests are retried a bounded number of times with doubling
//! backoff before a `Timeout` error surfaces. A `fetch` is served from the
//! cache when a valid entry exists and populates it otherwise;
//! `list_versions` never touches the cache.

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use super::{FetchedPackage, PackageMetadata, PackageSource, SourceError};
use crate::cache::Cache;
use crate::config::Config;
use crate::version::Version;

/// Connection establishment deadline
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Initial retry backoff, doubled after each timed-out attempt
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Version listing for a package
///
/// Response from `GET {registry}/{name}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionList {
    /// Package name
    pub name: String,

    /// Available versions
    pub versions: Vec<String>,
}

/// One published version of a package
///
/// Response from `GET {registry}/{name}/{version}`; also the body of a
/// `PUT` when publishing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRecord {
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

    /// Declared dependencies: name -> version range
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    /// SHA-256 of `content`, hex-encoded
    pub checksum: String,

    /// The package source text
    pub content: String,
}

impl PackageRecord {
    /// The metadata half of this record
    pub fn metadata(&self) -> PackageMetadata {
        PackageMetadata {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            hardware: self.hardware.clone(),
            dependencies: self.dependencies.clone(),
        }
    }
}

/// SHA-256 checksum of package content, hex-encoded
pub fn content_checksum(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Package source backed by the remote registry
pub struct RegistrySource {
    client: Client,
    base_url: String,
    cache: Cache,
    attempts: u32,
}

impl RegistrySource {
    /// Create a registry source from the tool configuration
    pub fn new(config: &Config, cache: Cache) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(format!("kpm/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.registry_url.trim_end_matches('/').to_string(),
            cache,
            attempts: config.fetch_attempts.max(1),
        })
    }

    /// Publish a package record
    ///
    /// `PUT {registry}/{name}/{version}`.
    pub fn publish(&self, record: &PackageRecord) -> Result<(), SourceError> {
        let url = format!("{}/{}/{}", self.base_url, record.name, record.version);

        let response = self.client.put(url.as_str()).json(record).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!(
                "Registry refused publish with status {}",
                status
            )));
        }

        Ok(())
    }

    fn get_with_retry(
        &self,
        url: &str,
        package: &str,
    ) -> Result<reqwest::blocking::Response, SourceError> {
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => return Ok(response),
                Err(e) if e.is_timeout() => {
                    if attempt >= self.attempts {
                        return Err(SourceError::Timeout {
                            package: package.to_string(),
                            attempts: attempt,
                        });
                    }
                    thread::sleep(backoff);
                    backoff *= 2;
                }
                Err(e) => return Err(SourceError::Http(e)),
            }
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        package: &str,
        version: Option<&Version>,
    ) -> Result<T, SourceError> {
        let response = self.get_with_retry(url, package)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(match version {
                Some(v) => SourceError::VersionNotFound {
                    package: package.to_string(),
                    version: v.to_string(),
                },
                None => SourceError::NotFound(package.to_string()),
            });
        }
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!(
                "Registry returned status {}",
                status
            )));
        }

        response.json().map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout {
                    package: package.to_string(),
                    attempts: 1,
                }
            } else {
                SourceError::Malformed {
                    package: package.to_string(),
                    reason: e.to_string(),
                }
            }
        })
    }
}

impl PackageSource for RegistrySource {
    fn name(&self) -> &str {
        "registry"
    }

    fn list_versions(&self, package: &str) -> Result<Vec<Version>, SourceError> {
        let url = format!("{}/{}", self.base_url, package);
        let listing: VersionList = self.get_json(&url, package, None)?;

        let mut versions: Vec<Version> = listing
            .versions
            .iter()
            .filter_map(|v| Version::parse(v).ok())
            .collect();

        versions.sort_by(|a, b| b.cmp(a));
        Ok(versions)
    }

    fn fetch(&self, package: &str, version: &Version) -> Result<FetchedPackage, SourceError> {
        // A valid cache entry makes the network round trip unnecessary
        if let Ok(Some(record)) = self.cache.get_record(package, version) {
            if let Ok(Some(content)) = self.cache.get(package, version) {
                return Ok(FetchedPackage {
                    metadata: record.metadata,
                    content,
                });
            }
        }

        let url = format!("{}/{}/{}", self.base_url, package, version);
        let record: PackageRecord = self.get_json(&url, package, Some(version))?;

        let content = record.content.clone().into_bytes();
        let actual = content_checksum(&content);
        if actual != record.checksum {
            return Err(SourceError::ChecksumMismatch {
                package: package.to_string(),
                version: version.to_string(),
                expected: record.checksum,
                actual,
            });
        }

        let metadata = record.metadata();
        self.cache.put(package, version, &content, &metadata)?;

        Ok(FetchedPackage { metadata, content })
    }
}
