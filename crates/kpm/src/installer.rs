//! Package installation
//!
//! Materializes a resolved graph into the project's `kinetrix_modules/`
//! directory and records the direct dependencies in the manifest. Content
//! comes from the cache when possible and from the package sources
//! otherwise; missing blobs are fetched through a bounded worker pool and
//! fetch failures are aggregated rather than reported one at a time.
//!
//! The manifest is rewritten only after every module write has succeeded,
//! via temp-file-then-rename, so an interrupted install leaves it untouched.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::cache::{Cache, CacheError};
use crate::lock::{DirLock, LockError};
use crate::manifest::{Manifest, ManifestError, MANIFEST_FILE};
use crate::resolver::{ResolvedGraph, ResolvedPackage};
use crate::source::{PackageSource, SourceError, STDLIB_EXTENSION};
use crate::version::Version;

/// Directory installs are written into, inside the project
pub const MODULES_DIR: &str = "kinetrix_modules";

/// One package that could not be fetched
#[derive(Debug)]
pub struct FetchFailure {
    pub package: String,
    pub version: Version,
    pub error: SourceError,
}

/// Errors that can occur during installation
#[derive(Debug, Error)]
pub enum InstallError {
    /// One or more packages could not be fetched from any source
    #[error("Failed to fetch {} package(s): {}", failures.len(), format_failures(failures))]
    Fetch { failures: Vec<FetchFailure> },

    /// A module write failed; the packages already written are listed
    #[error("Failed to write {package}: {error}{}", format_written(written))]
    Write {
        package: String,
        error: std::io::Error,
        written: Vec<String>,
    },

    /// Manifest could not be read or rewritten
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// Cache failure
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Lock acquisition failure
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_failures(failures: &[FetchFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}@{} ({})", f.package, f.version, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_written(written: &[String]) -> String {
    if written.is_empty() {
        String::new()
    } else {
        format!(" (already written: {})", written.join(", "))
    }
}

/// Outcome of a successful install
#[derive(Debug, Default)]
pub struct InstallReport {
    /// Modules written this run
    pub installed: Vec<(String, Version)>,

    /// Modules whose on-disk content already matched
    pub up_to_date: Vec<(String, Version)>,

    /// Blobs served by the cache
    pub from_cache: usize,

    /// Blobs fetched from a source
    pub fetched: usize,
}

/// Installer over a cache and an ordered list of package sources
pub struct Installer<'a> {
    cache: &'a Cache,
    sources: Vec<&'a dyn PackageSource>,
    workers: usize,
}

impl<'a> Installer<'a> {
    /// Create an installer with no sources and the default pool size
    pub fn new(cache: &'a Cache) -> Self {
        Self {
            cache,
            sources: Vec::new(),
            workers: 8,
        }
    }

    /// Append a package source
    pub fn with_source(mut self, source: &'a dyn PackageSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Set the fetch worker pool size
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Install a resolved graph into `project_dir`
    ///
    /// Holds the project and cache locks for the whole operation. On a write
    /// failure the install aborts with the manifest untouched and the error
    /// names the modules already written.
    pub fn install(
        &self,
        graph: &ResolvedGraph,
        project_dir: &Path,
    ) -> Result<InstallReport, InstallError> {
        let _project_lock = DirLock::project(project_dir)?;
        let _cache_lock = DirLock::cache(self.cache.root())?;

        let mut report = InstallReport::default();

        // Content collection, cache first
        let mut blobs: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        let mut pending: Vec<&ResolvedPackage> = Vec::new();

        for pkg in graph.packages.values() {
            match self.cache.get(&pkg.name, &pkg.version)? {
                Some(content) => {
                    report.from_cache += 1;
                    blobs.insert(pkg.name.clone(), content);
                }
                None => pending.push(pkg),
            }
        }

        if !pending.is_empty() {
            let mut failures = Vec::new();
            for (pkg, result) in self.fetch_all(&pending) {
                match result {
                    Ok(content) => {
                        report.fetched += 1;
                        blobs.insert(pkg.name.clone(), content);
                    }
                    Err(error) => failures.push(FetchFailure {
                        package: pkg.name.clone(),
                        version: pkg.version.clone(),
                        error,
                    }),
                }
            }
            if !failures.is_empty() {
                failures.sort_by(|a, b| a.package.cmp(&b.package));
                return Err(InstallError::Fetch { failures });
            }
        }

        // Module writes, one file per package name
        let dest = project_dir.join(MODULES_DIR);
        fs::create_dir_all(&dest)?;

        let mut written: Vec<String> = Vec::new();
        for (name, pkg) in &graph.packages {
            let Some(blob) = blobs.get(name) else { continue };
            let path = dest.join(format!("{}.{}", name, STDLIB_EXTENSION));

            if let Ok(existing) = fs::read(&path) {
                if existing == *blob {
                    report.up_to_date.push((name.clone(), pkg.version.clone()));
                    continue;
                }
            }

            if let Err(error) = fs::write(&path, blob) {
                return Err(InstallError::Write {
                    package: name.clone(),
                    error,
                    written,
                });
            }
            written.push(name.clone());
            report.installed.push((name.clone(), pkg.version.clone()));
        }

        // Manifest update, atomic, only after every write succeeded
        let manifest_path = project_dir.join(MANIFEST_FILE);
        let mut manifest = Manifest::from_file(&manifest_path)?;
        manifest.dependencies = graph
            .direct
            .iter()
            .map(|(name, range)| (name.clone(), range.to_string()))
            .collect();
        manifest.to_file(&manifest_path)?;

        Ok(report)
    }

    /// Fetch pending blobs through a bounded worker pool
    fn fetch_all<'g>(
        &self,
        pending: &[&'g ResolvedPackage],
    ) -> Vec<(&'g ResolvedPackage, Result<Vec<u8>, SourceError>)> {
        let workers = self.workers.min(pending.len()).max(1);

        let (job_tx, job_rx) = crossbeam::channel::unbounded::<&ResolvedPackage>();
        let (result_tx, result_rx) = crossbeam::channel::unbounded();

        for pkg in pending {
            let _ = job_tx.send(*pkg);
        }
        drop(job_tx);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    while let Ok(pkg) = job_rx.recv() {
                        let result = self.fetch_one(pkg);
                        let _ = result_tx.send((pkg, result));
                    }
                });
            }
        });
        drop(result_tx);

        result_rx.iter().collect()
    }

    /// Fetch one package from the first source that can supply it
    fn fetch_one(&self, pkg: &ResolvedPackage) -> Result<Vec<u8>, SourceError> {
        let mut last_missing: Option<SourceError> = None;

        for source in &self.sources {
            match source.fetch(&pkg.name, &pkg.version) {
                Ok(fetched) => return Ok(fetched.content),
                Err(e) if e.is_missing() => last_missing = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_missing.unwrap_or_else(|| SourceError::NotFound(pkg.name.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_lists_every_failure() {
        let err = InstallError::Fetch {
            failures: vec![
                FetchFailure {
                    package: "imu".to_string(),
                    version: Version::new(2, 0, 0),
                    error: SourceError::NotFound("imu".to_string()),
                },
                FetchFailure {
                    package: "sensor-lib".to_string(),
                    version: Version::new(1, 0, 0),
                    error: SourceError::Timeout {
                        package: "sensor-lib".to_string(),
                        attempts: 3,
                    },
                },
            ],
        };

        let message = err.to_string();
        assert!(message.contains("2 package(s)"));
        assert!(message.contains("imu@2.0.0"));
        assert!(message.contains("sensor-lib@1.0.0"));
        assert!(message.contains("timed out"));
    }

    #[test]
    fn test_write_error_names_written_packages() {
        let err = InstallError::Write {
            package: "servo".to_string(),
            error: std::io::Error::other("disk full"),
            written: vec!["imu".to_string(), "motor-driver".to_string()],
        };

        let message = err.to_string();
        assert!(message.contains("servo"));
        assert!(message.contains("disk full"));
        assert!(message.contains("already written: imu, motor-driver"));
    }

    #[test]
    fn test_write_error_with_nothing_written() {
        let err = InstallError::Write {
            package: "servo".to_string(),
            error: std::io::Error::other("permission denied"),
            written: Vec::new(),
        };

        assert!(!err.to_string().contains("already written"));
    }
}
