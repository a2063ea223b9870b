//! Advisory directory locks
//!
//! One lock file per project directory and per cache directory prevents two
//! concurrent installs from corrupting the manifest or writing partial cache
//! entries. Locks are exclusive, block until acquired, and release on drop.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use thiserror::Error;

/// Lock file name used inside a project directory
pub const PROJECT_LOCK_FILE: &str = ".kpm.lock";

/// Lock file name used inside the cache root
pub const CACHE_LOCK_FILE: &str = "cache.lock";

/// Errors that can occur while acquiring a lock
#[derive(Debug, Error)]
pub enum LockError {
    /// Lock file could not be created or locked
    #[error("Failed to lock {name} in {dir}: {error}")]
    Acquire {
        dir: String,
        name: String,
        error: std::io::Error,
    },
}

/// An exclusive advisory lock on a directory, held until dropped
pub struct DirLock {
    _file: File,
}

impl DirLock {
    /// Acquire an exclusive lock on `dir`, blocking until available
    pub fn acquire(dir: &Path, name: &str) -> Result<Self, LockError> {
        let acquire_err = |error| LockError::Acquire {
            dir: dir.display().to_string(),
            name: name.to_string(),
            error,
        };

        std::fs::create_dir_all(dir).map_err(&acquire_err)?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(dir.join(name))
            .map_err(&acquire_err)?;

        file.lock_exclusive().map_err(&acquire_err)?;

        Ok(Self { _file: file })
    }

    /// Lock a project directory
    pub fn project(dir: &Path) -> Result<Self, LockError> {
        Self::acquire(dir, PROJECT_LOCK_FILE)
    }

    /// Lock a cache root
    pub fn cache(root: &Path) -> Result<Self, LockError> {
        Self::acquire(root, CACHE_LOCK_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_reacquire() {
        let dir = tempfile::tempdir().unwrap();

        let lock = DirLock::project(dir.path()).unwrap();
        assert!(dir.path().join(PROJECT_LOCK_FILE).exists());
        drop(lock);

        // Released on drop; a second acquisition must not block
        let _lock = DirLock::project(dir.path()).unwrap();
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("cache");

        let _lock = DirLock::cache(&nested).unwrap();
        assert!(nested.join(CACHE_LOCK_FILE).exists());
    }
}
