//! Info command

use super::CommandError;
use crate::cache::Cache;
use crate::config::Config;
use crate::source::{LocalSource, PackageMetadata, PackageSource, RegistrySource};

/// Show metadata for a package, preferring the stdlib over the registry
pub fn show_info(package: &str, config: &Config) -> Result<(), CommandError> {
    let cache = Cache::open(&config.cache_dir)?;
    let stdlib = LocalSource::new(config.stdlib_dir.clone());
    let registry = RegistrySource::new(config, cache)?;

    let metadata = fetch_info(package, &[&stdlib, &registry])?;

    println!("{} v{}", metadata.name, metadata.version);
    if let Some(description) = metadata.description.as_deref() {
        if !description.is_empty() {
            println!("{}", description);
        }
    }

    if !metadata.hardware.is_empty() {
        println!();
        println!("Supported hardware:");
        println!("  {}", metadata.hardware.join(", "));
    }

    if !metadata.dependencies.is_empty() {
        println!();
        println!("Dependencies:");
        for (name, range) in &metadata.dependencies {
            println!("  {}@{}", name, range);
        }
    }

    Ok(())
}

/// Metadata of the latest available version across the given sources
fn fetch_info(
    package: &str,
    sources: &[&dyn PackageSource],
) -> Result<PackageMetadata, CommandError> {
    for source in sources {
        let versions = match source.list_versions(package) {
            Ok(versions) => versions,
            Err(e) if e.is_missing() => continue,
            Err(e) => return Err(e.into()),
        };

        let Some(latest) = versions.iter().find(|v| !v.is_prerelease()).or(versions.first())
        else {
            continue;
        };

        match source.fetch(package, latest) {
            Ok(fetched) => return Ok(fetched.metadata),
            Err(e) if e.is_missing() => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(CommandError::PackageNotFound(package.to_string()))
}
