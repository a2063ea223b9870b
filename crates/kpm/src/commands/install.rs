//! Install command
//!
//! Resolves and installs either everything the manifest declares or one
//! additional package given as `name` or `name@range`.

use std::path::Path;

use super::{resolve_project_root, CommandError};
use crate::cache::Cache;
use crate::config::Config;
use crate::installer::Installer;
use crate::manifest::{is_valid_package_name, Manifest, MANIFEST_FILE};
use crate::resolver::Resolver;
use crate::source::{LocalSource, PackageSource, RegistrySource};
use crate::version::{Version, VersionRange};

/// Parsed `name[@range]` argument
#[derive(Debug)]
struct PackageSpec {
    name: String,
    range: Option<VersionRange>,
}

impl PackageSpec {
    fn parse(spec: &str) -> Result<Self, CommandError> {
        let spec = spec.trim();
        let invalid = |reason: &str| CommandError::InvalidSpec {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        if spec.is_empty() {
            return Err(invalid("empty specifier"));
        }

        let (name, range) = match spec.split_once('@') {
            Some((name, range)) => {
                if range.is_empty() {
                    return Err(invalid("empty range after '@'"));
                }
                let range =
                    VersionRange::parse(range).map_err(|e| invalid(&e.to_string()))?;
                (name, Some(range))
            }
            None => (spec, None),
        };

        if !is_valid_package_name(name) {
            return Err(invalid("package names may contain only alphanumeric characters, hyphens, and underscores"));
        }

        Ok(Self {
            name: name.to_string(),
            range,
        })
    }
}

/// Install dependencies for the surrounding project
///
/// With a spec, the named package joins the manifest's direct dependencies
/// (at the given range, or caret on the latest stable version). Without one,
/// everything the manifest declares is installed.
pub fn install_package(
    spec: Option<&str>,
    start_dir: Option<&Path>,
    config: &Config,
) -> Result<(), CommandError> {
    let project_root = resolve_project_root(start_dir)?;
    let manifest = Manifest::from_file(&project_root.join(MANIFEST_FILE))?;

    let mut direct = manifest.dependency_ranges()?;

    let cache = Cache::open(&config.cache_dir)?;
    let stdlib = LocalSource::new(config.stdlib_dir.clone());
    let registry = RegistrySource::new(config, cache.clone())?;

    match spec {
        Some(spec) => {
            let spec = PackageSpec::parse(spec)?;
            let range = match spec.range {
                Some(range) => range,
                None => {
                    let latest = latest_version(&spec.name, &[&stdlib, &registry])?;
                    VersionRange::Caret(latest)
                }
            };
            println!("Installing {}@{}...", spec.name, range);
            direct.insert(spec.name, range);
        }
        None => {
            if direct.is_empty() {
                println!("No dependencies to install.");
                return Ok(());
            }
            println!("Installing dependencies for {}...", manifest.name);
        }
    }

    let resolver = Resolver::new().with_source(&stdlib).with_source(&registry);
    let graph = resolver.resolve(&manifest.name, &direct)?;

    let installer = Installer::new(&cache)
        .with_source(&stdlib)
        .with_source(&registry)
        .with_workers(config.fetch_workers);
    let report = installer.install(&graph, &project_root)?;

    for (name, version) in &report.installed {
        println!("  + {}@{}", name, version);
    }
    for (name, version) in &report.up_to_date {
        println!("  = {}@{} (up to date)", name, version);
    }
    println!(
        "{} package(s) resolved ({} from cache, {} fetched)",
        graph.packages.len(),
        report.from_cache,
        report.fetched
    );

    Ok(())
}

/// Highest stable version of a package across the given sources
fn latest_version(
    name: &str,
    sources: &[&dyn PackageSource],
) -> Result<Version, CommandError> {
    let mut best: Option<Version> = None;

    for source in sources {
        match source.list_versions(name) {
            Ok(versions) => {
                for version in versions {
                    if version.is_prerelease() {
                        continue;
                    }
                    if best.as_ref().map_or(true, |b| version > *b) {
                        best = Some(version);
                    }
                }
            }
            Err(e) if e.is_missing() => continue,
            Err(e) => return Err(e.into()),
        }
    }

    best.ok_or_else(|| CommandError::PackageNotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_name() {
        let spec = PackageSpec::parse("motor-driver").unwrap();
        assert_eq!(spec.name, "motor-driver");
        assert!(spec.range.is_none());
    }

    #[test]
    fn test_parse_name_with_range() {
        let spec = PackageSpec::parse("motor-driver@^1.2.0").unwrap();
        assert_eq!(spec.name, "motor-driver");
        assert!(matches!(spec.range, Some(VersionRange::Caret(_))));
    }

    #[test]
    fn test_parse_name_with_exact_version() {
        let spec = PackageSpec::parse("servo@1.0.0").unwrap();
        assert!(matches!(spec.range, Some(VersionRange::Exact(_))));
    }

    #[test]
    fn test_parse_rejects_empty_range() {
        assert!(matches!(
            PackageSpec::parse("servo@"),
            Err(CommandError::InvalidSpec { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_bad_name() {
        assert!(PackageSpec::parse("bad name").is_err());
        assert!(PackageSpec::parse("").is_err());
        assert!(PackageSpec::parse("@1.0.0").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_range() {
        assert!(PackageSpec::parse("servo@not-a-range").is_err());
    }
}
