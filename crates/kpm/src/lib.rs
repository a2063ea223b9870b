//! Kinetrix Package Manager Library
//!
//! This crate provides package management for the Kinetrix hardware
//! programming language, including:
//! - Manifest parsing and validation (`kinetrix.json`)
//! - Semver version parsing and range matching
//! - Dependency resolution across package sources
//! - Local stdlib and remote registry sources
//! - Content-addressed package caching
//! - Atomic installation into `kinetrix_modules/`

pub mod cache;
pub mod commands;
pub mod config;
pub mod installer;
pub mod lock;
pub mod manifest;
pub mod resolver;
pub mod source;
pub mod version;

pub use cache::{Cache, CacheError, CacheRecord};
pub use commands::CommandError;
pub use config::{Config, ConfigError, DEFAULT_REGISTRY};
pub use installer::{InstallError, InstallReport, Installer, MODULES_DIR};
pub use lock::{DirLock, LockError};
pub use manifest::{find_project_root, Manifest, ManifestError, MANIFEST_FILE};
pub use resolver::{
    Requirement, ResolveError, ResolvedGraph, ResolvedPackage, Resolver,
};
pub use source::{
    content_checksum, FetchedPackage, LocalSource, PackageMetadata, PackageRecord,
    PackageSource, RegistrySource, SourceError,
};
pub use version::{Version, VersionError, VersionRange};
