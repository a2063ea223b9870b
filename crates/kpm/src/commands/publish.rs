//! Publish command
//!
//! Packs the project's entry point into a package record and uploads it to
//! the registry.

use std::fs;
use std::path::Path;

use super::{resolve_project_root, CommandError};
use crate::cache::Cache;
use crate::config::Config;
use crate::manifest::{Manifest, MANIFEST_FILE};
use crate::source::{content_checksum, PackageRecord, RegistrySource};

/// Publish the surrounding project to the registry
pub fn publish_package(start_dir: Option<&Path>, config: &Config) -> Result<(), CommandError> {
    let project_root = resolve_project_root(start_dir)?;
    let manifest = Manifest::from_file(&project_root.join(MANIFEST_FILE))?;

    let main_file = manifest.main.clone().unwrap_or_else(|| "main.kx".to_string());
    let main_path = project_root.join(&main_file);
    if !main_path.exists() {
        return Err(CommandError::MissingEntryPoint(main_file));
    }

    let content = fs::read_to_string(&main_path)?;
    let record = PackageRecord {
        name: manifest.name.clone(),
        version: manifest.version.clone(),
        description: manifest.description.clone().filter(|d| !d.is_empty()),
        hardware: manifest.hardware.clone(),
        dependencies: manifest.dependencies.clone(),
        checksum: content_checksum(content.as_bytes()),
        content,
    };

    println!(
        "Publishing {} v{} to {}...",
        record.name, record.version, config.registry_url
    );

    let cache = Cache::open(&config.cache_dir)?;
    let registry = RegistrySource::new(config, cache)?;
    registry.publish(&record)?;

    println!("Published {}@{}", record.name, record.version);

    Ok(())
}
