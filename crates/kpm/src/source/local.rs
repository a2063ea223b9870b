//! Local stdlib source
//!
//! Reads the flat directory of bundled `.kx` packages shipped with the
//! Kinetrix toolchain. The stdlib is unversioned; every package is treated as
//! version 1.0.0 for uniformity. A package may carry a `<name>.json` sidecar
//! declaring its description, supported hardware, and dependencies.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::{FetchedPackage, PackageMetadata, PackageSource, SourceError};
use crate::version::Version;

/// File extension of Kinetrix package files
pub const STDLIB_EXTENSION: &str = "kx";

/// The version assigned to every stdlib package
fn stdlib_version() -> Version {
    Version::new(1, 0, 0)
}

/// Sidecar metadata file (`<name>.json`), all fields optional
#[derive(Debug, Default, Deserialize)]
struct Sidecar {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    hardware: Vec<String>,
    #[serde(default)]
    dependencies: std::collections::BTreeMap<String, String>,
}

/// Package source backed by the on-disk stdlib directory
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    /// Create a source over the given stdlib directory
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The stdlib directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazy iterator over the names of all packages in the stdlib
    ///
    /// The sequence is finite and restartable: each call walks the directory
    /// afresh. A missing stdlib directory yields an empty sequence.
    pub fn package_names(&self) -> PackageNames {
        PackageNames {
            entries: fs::read_dir(&self.root).ok(),
        }
    }

    /// Substring search over package names, case-insensitive, sorted
    pub fn search(&self, query: &str) -> Vec<String> {
        let needle = query.to_lowercase();
        let mut matches: Vec<String> = self
            .package_names()
            .filter(|name| name.to_lowercase().contains(&needle))
            .collect();
        matches.sort();
        matches
    }

    fn package_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, STDLIB_EXTENSION))
    }

    fn sidecar_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", name))
    }

    fn read_sidecar(&self, name: &str) -> Result<Sidecar, SourceError> {
        let path = self.sidecar_path(name);
        if !path.exists() {
            return Ok(Sidecar::default());
        }

        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| SourceError::Malformed {
            package: name.to_string(),
            reason: e.to_string(),
        })
    }
}

impl PackageSource for LocalSource {
    fn name(&self) -> &str {
        "stdlib"
    }

    fn list_versions(&self, package: &str) -> Result<Vec<Version>, SourceError> {
        if self.package_path(package).exists() {
            Ok(vec![stdlib_version()])
        } else {
            Err(SourceError::NotFound(package.to_string()))
        }
    }

    fn fetch(&self, package: &str, version: &Version) -> Result<FetchedPackage, SourceError> {
        let path = self.package_path(package);
        if !path.exists() {
            return Err(SourceError::NotFound(package.to_string()));
        }

        if *version != stdlib_version() {
            return Err(SourceError::VersionNotFound {
                package: package.to_string(),
                version: version.to_string(),
            });
        }

        let content = fs::read(&path)?;
        let sidecar = self.read_sidecar(package)?;

        let metadata = PackageMetadata {
            name: package.to_string(),
            version: version.to_string(),
            description: sidecar.description,
            hardware: sidecar.hardware,
            dependencies: sidecar.dependencies,
        };

        Ok(FetchedPackage { metadata, content })
    }
}

/// Lazy iterator over stdlib package names
pub struct PackageNames {
    entries: Option<fs::ReadDir>,
}

impl Iterator for PackageNames {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let entries = self.entries.as_mut()?;

        for entry in entries.by_ref() {
            let Ok(entry) = entry else { continue };
            let path = entry.path();

            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(STDLIB_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                return Some(stem.to_string());
            }
        }

        None
    }
}
