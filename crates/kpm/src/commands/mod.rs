//! CLI commands
//!
//! Implements the `kpm` command surface: init, install, list, search, info,
//! publish, and cache maintenance. Commands print user-facing output and
//! return typed errors; the binary maps any error to a non-zero exit.

pub mod cache;
pub mod info;
pub mod init;
pub mod install;
pub mod list;
pub mod publish;
pub mod search;

pub use cache::clear_cache;
pub use info::show_info;
pub use init::init_project;
pub use install::install_package;
pub use list::list_installed;
pub use publish::publish_package;
pub use search::search_packages;

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cache::CacheError;
use crate::installer::InstallError;
use crate::lock::LockError;
use crate::manifest::{find_project_root, ManifestError};
use crate::resolver::ResolveError;
use crate::source::SourceError;

/// Errors shared by the CLI commands
#[derive(Debug, Error)]
pub enum CommandError {
    /// No manifest in this directory or any parent
    #[error("No kinetrix.json found. Run `kpm init` first.")]
    NoManifest,

    /// Init refused to overwrite an existing project
    #[error("Project already initialized: {0} already exists")]
    AlreadyInitialized(String),

    /// Bad `name[@range]` argument
    #[error("Invalid package specifier '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    /// Package unknown to every configured source
    #[error("Package not found: {0}")]
    PackageNotFound(String),

    /// Publish found no entry point to pack
    #[error("Entry point {0} not found. Nothing to publish.")]
    MissingEntryPoint(String),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Locate the project root from an explicit start directory or the cwd
pub(crate) fn resolve_project_root(start_dir: Option<&Path>) -> Result<PathBuf, CommandError> {
    let start = match start_dir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir()?,
    };

    find_project_root(&start).ok_or(CommandError::NoManifest)
}
