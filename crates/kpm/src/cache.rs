//! Package cache
//!
//! Content-addressed storage for fetched packages, shared across projects.
//!
//! Each entry is keyed by (name, version) and guarded by a SHA-256 hash over
//! name, version, and content. Reads recompute and check the hash before
//! returning content; a mismatch is treated as a cache miss and the stale
//! entry is discarded, never surfaced as an error. Entries are only removed
//! by an explicit [`Cache::clear`].
//!
//! Directory structure:
//! ```text
//! <root>/
//! ├── packages/
//! │   └── <name>-<version>/
//! │       ├── module.kx
//! │       └── metadata.json
//! ├── tmp/
//! └── cache.lock
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::source::PackageMetadata;
use crate::version::Version;

/// File holding an entry's content blob
const CONTENT_FILE: &str = "module.kx";

/// File holding an entry's metadata record
const METADATA_FILE: &str = "metadata.json";

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata serialization failed
    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Metadata record stored beside each cached blob
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheRecord {
    /// SHA-256 over (name, version, content), hex-encoded
    pub checksum: String,

    /// Unix timestamp of the first fetch
    pub cached_at: u64,

    /// Package metadata as fetched
    pub metadata: PackageMetadata,
}

/// Content-addressed package cache
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
}

impl Cache {
    /// Open (creating if needed) a cache rooted at `root`
    pub fn open(root: &Path) -> Result<Self, CacheError> {
        fs::create_dir_all(root.join("packages"))?;
        fs::create_dir_all(root.join("tmp"))?;

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// The cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Retrieve a package's content
    ///
    /// Returns `Ok(None)` when the entry is absent or fails its hash check;
    /// a failed check also discards the stale entry so the next `put` starts
    /// clean.
    pub fn get(&self, name: &str, version: &Version) -> Result<Option<Vec<u8>>, CacheError> {
        let dir = self.entry_dir(name, version);
        let content_path = dir.join(CONTENT_FILE);
        let metadata_path = dir.join(METADATA_FILE);

        if !content_path.exists() || !metadata_path.exists() {
            return Ok(None);
        }

        let content = match fs::read(&content_path) {
            Ok(bytes) => bytes,
            Err(_) => {
                self.discard(&dir);
                return Ok(None);
            }
        };

        let record: CacheRecord = match fs::read_to_string(&metadata_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
        {
            Some(record) => record,
            None => {
                self.discard(&dir);
                return Ok(None);
            }
        };

        if entry_checksum(name, version, &content) != record.checksum {
            self.discard(&dir);
            return Ok(None);
        }

        Ok(Some(content))
    }

    /// Retrieve the metadata record for a cached package, if valid
    pub fn get_record(&self, name: &str, version: &Version) -> Result<Option<CacheRecord>, CacheError> {
        if self.get(name, version)?.is_none() {
            return Ok(None);
        }

        let path = self.entry_dir(name, version).join(METADATA_FILE);
        let record = serde_json::from_str(&fs::read_to_string(path)?)?;
        Ok(Some(record))
    }

    /// Store a package's content and metadata
    ///
    /// Files are written to the tmp area first and renamed into place, so a
    /// crash never leaves a half-written entry that passes its hash check.
    pub fn put(
        &self,
        name: &str,
        version: &Version,
        content: &[u8],
        metadata: &PackageMetadata,
    ) -> Result<(), CacheError> {
        let record = CacheRecord {
            checksum: entry_checksum(name, version, content),
            cached_at: unix_now(),
            metadata: metadata.clone(),
        };

        let dir = self.entry_dir(name, version);
        fs::create_dir_all(&dir)?;

        let tag = format!("{}-{}-{}", name, version, std::process::id());

        let tmp_content = self.root.join("tmp").join(format!("{}.kx", tag));
        fs::write(&tmp_content, content)?;
        fs::rename(&tmp_content, dir.join(CONTENT_FILE))?;

        let tmp_metadata = self.root.join("tmp").join(format!("{}.json", tag));
        fs::write(&tmp_metadata, serde_json::to_string_pretty(&record)?)?;
        fs::rename(&tmp_metadata, dir.join(METADATA_FILE))?;

        Ok(())
    }

    /// Check whether a valid entry exists
    pub fn contains(&self, name: &str, version: &Version) -> bool {
        matches!(self.get(name, version), Ok(Some(_)))
    }

    /// Remove every entry, returning how many were deleted
    pub fn clear(&self) -> Result<usize, CacheError> {
        let packages = self.root.join("packages");
        let mut removed = 0;

        for entry in fs::read_dir(&packages)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
                removed += 1;
            }
        }

        Ok(removed)
    }

    fn entry_dir(&self, name: &str, version: &Version) -> PathBuf {
        self.root
            .join("packages")
            .join(format!("{}-{}", name, version))
    }

    fn discard(&self, dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }
}

/// Hash identifying one cache entry: SHA-256 over name, version, and content
pub fn entry_checksum(name: &str, version: &Version, content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(b"\0");
    hasher.update(version.to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(content);
    hex::encode(hasher.finalize())
}

fn unix_now() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
