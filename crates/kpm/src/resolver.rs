//! Dependency resolution
//!
//! Computes a flat, deduplicated install set from the manifest's direct
//! dependencies. Traversal is breadth-first over package names; every range
//! constraining a name is collected from all of its requirers, and the
//! highest version satisfying the whole set wins. Given the same available
//! versions, resolution is fully deterministic.

use std::collections::{BTreeMap, VecDeque};
use thiserror::Error;

use crate::source::{PackageMetadata, PackageSource, SourceError};
use crate::version::{Version, VersionError, VersionRange};

/// Upper bound on re-selections of a single package
const MAX_VISITS: u32 = 64;

/// Errors that can occur during resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Package has no available versions in any source
    #[error("Package not found: {package} (required by {})", requirers.join(", "))]
    NotFound {
        package: String,
        requirers: Vec<String>,
    },

    /// No version satisfies every active range
    #[error("Conflicting requirements for {package}: {}", format_requirements(requirements))]
    Conflict {
        package: String,
        requirements: Vec<Requirement>,
    },

    /// A fetched package declares an unparseable range
    #[error("Invalid range '{range}' declared for {package}: {error}")]
    InvalidRange {
        package: String,
        range: String,
        error: VersionError,
    },

    /// A source failed in a way that is not "package absent"
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// One range constraining a package, with the package that imposed it
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub requirer: String,
    pub range: VersionRange,
}

/// A package with its chosen version
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: Version,
    pub metadata: PackageMetadata,

    /// Name of the source that supplied it
    pub source: String,
}

/// The resolved install set
///
/// Invariants: one version per name, and for every edge the chosen version
/// of the target satisfies the requiring range.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGraph {
    /// Chosen version per package name
    pub packages: BTreeMap<String, ResolvedPackage>,

    /// Edges: target name -> every requirement recorded against it
    pub requirements: BTreeMap<String, Vec<Requirement>>,

    /// The direct dependencies resolution started from
    pub direct: BTreeMap<String, VersionRange>,
}

impl ResolvedGraph {
    /// Check the edge invariant: every chosen version satisfies every range
    /// recorded against it
    pub fn edges_satisfied(&self) -> bool {
        self.requirements.iter().all(|(name, reqs)| {
            self.packages
                .get(name)
                .is_some_and(|p| reqs.iter().all(|r| r.range.matches(&p.version)))
        })
    }
}

fn format_requirements(requirements: &[Requirement]) -> String {
    requirements
        .iter()
        .map(|r| format!("{} requires {}", r.requirer, r.range))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Dependency resolver over an ordered list of package sources
///
/// Source order matters twice: when several sources list the same version,
/// the earliest source supplies it, and a source failing with a
/// "package absent" error is skipped in favor of the ones after it.
pub struct Resolver<'a> {
    sources: Vec<&'a dyn PackageSource>,
}

impl<'a> Resolver<'a> {
    /// Create a resolver with no sources
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Append a package source
    pub fn with_source(mut self, source: &'a dyn PackageSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Resolve the direct dependencies of `root` into a full install set
    pub fn resolve(
        &self,
        root: &str,
        direct: &BTreeMap<String, VersionRange>,
    ) -> Result<ResolvedGraph, ResolveError> {
        let mut requirements: BTreeMap<String, Vec<Requirement>> = BTreeMap::new();
        let mut queue: VecDeque<String> = VecDeque::new();

        for (name, range) in direct {
            requirements.entry(name.clone()).or_default().push(Requirement {
                requirer: root.to_string(),
                range: range.clone(),
            });
            queue.push_back(name.clone());
        }

        let mut packages: BTreeMap<String, ResolvedPackage> = BTreeMap::new();
        let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut available: BTreeMap<String, Vec<(Version, usize)>> = BTreeMap::new();
        let mut visits: BTreeMap<String, u32> = BTreeMap::new();

        while let Some(name) = queue.pop_front() {
            let reqs = requirements.get(&name).cloned().unwrap_or_default();

            // Orphaned by a re-selection upstream: nothing requires it anymore
            if reqs.is_empty() {
                packages.remove(&name);
                requirements.remove(&name);
                retract_edges(&name, &mut children, &mut requirements, &mut queue);
                continue;
            }

            // Already chosen and still satisfying every active range
            if let Some(existing) = packages.get(&name) {
                if reqs.iter().all(|r| r.range.matches(&existing.version)) {
                    continue;
                }
            }

            let visit = visits.entry(name.clone()).or_insert(0);
            *visit += 1;
            if *visit > MAX_VISITS {
                return Err(ResolveError::Conflict {
                    package: name,
                    requirements: reqs,
                });
            }

            let candidates = self.available_versions(&name, &mut available)?;
            if candidates.is_empty() {
                return Err(ResolveError::NotFound {
                    package: name,
                    requirers: reqs.iter().map(|r| r.requirer.clone()).collect(),
                });
            }

            // Highest stable version satisfying the intersection of all ranges
            let pick = candidates
                .iter()
                .find(|(v, _)| !v.is_prerelease() && reqs.iter().all(|r| r.range.matches(v)))
                .cloned();

            let Some((version, source_index)) = pick else {
                return Err(ResolveError::Conflict {
                    package: name,
                    requirements: reqs,
                });
            };

            let fetched = match self.sources[source_index].fetch(&name, &version) {
                Ok(fetched) => fetched,
                Err(e) if e.is_missing() => {
                    // The listing was stale; drop the candidate and re-select
                    if let Some(list) = available.get_mut(&name) {
                        list.retain(|(v, i)| !(*v == version && *i == source_index));
                    }
                    queue.push_back(name);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            // Re-selection: retract the edges the previous choice contributed
            if packages.remove(&name).is_some() {
                retract_edges(&name, &mut children, &mut requirements, &mut queue);
            }

            let mut child_names = Vec::new();
            for (dep_name, range_str) in &fetched.metadata.dependencies {
                let range = VersionRange::parse(range_str).map_err(|error| {
                    ResolveError::InvalidRange {
                        package: dep_name.clone(),
                        range: range_str.clone(),
                        error,
                    }
                })?;
                requirements
                    .entry(dep_name.clone())
                    .or_default()
                    .push(Requirement {
                        requirer: name.clone(),
                        range,
                    });
                child_names.push(dep_name.clone());
                queue.push_back(dep_name.clone());
            }
            children.insert(name.clone(), child_names);

            packages.insert(
                name.clone(),
                ResolvedPackage {
                    name: name.clone(),
                    version,
                    metadata: fetched.metadata,
                    source: self.sources[source_index].name().to_string(),
                },
            );
        }

        requirements.retain(|name, _| packages.contains_key(name));

        Ok(ResolvedGraph {
            packages,
            requirements,
            direct: direct.clone(),
        })
    }

    /// Union of versions across sources, highest first, memoized per name
    fn available_versions(
        &self,
        name: &str,
        memo: &mut BTreeMap<String, Vec<(Version, usize)>>,
    ) -> Result<Vec<(Version, usize)>, ResolveError> {
        if let Some(cached) = memo.get(name) {
            return Ok(cached.clone());
        }

        let mut versions: Vec<(Version, usize)> = Vec::new();
        for (index, source) in self.sources.iter().enumerate() {
            match source.list_versions(name) {
                Ok(listed) => {
                    for version in listed {
                        // First source to list a version supplies it
                        if !versions.iter().any(|(v, _)| *v == version) {
                            versions.push((version, index));
                        }
                    }
                }
                Err(e) if e.is_missing() => continue,
                Err(e) => return Err(e.into()),
            }
        }

        versions.sort_by(|a, b| b.0.cmp(&a.0));
        memo.insert(name.to_string(), versions.clone());
        Ok(versions)
    }
}

impl Default for Resolver<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn retract_edges(
    name: &str,
    children: &mut BTreeMap<String, Vec<String>>,
    requirements: &mut BTreeMap<String, Vec<Requirement>>,
    queue: &mut VecDeque<String>,
) {
    if let Some(deps) = children.remove(name) {
        for dep in deps {
            if let Some(reqs) = requirements.get_mut(&dep) {
                reqs.retain(|r| r.requirer != name);
            }
            queue.push_back(dep);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FetchedPackage;

    struct StaticSource {
        label: String,
        packages: BTreeMap<String, Vec<(Version, PackageMetadata)>>,
    }

    impl StaticSource {
        fn new(label: &str) -> Self {
            Self {
                label: label.to_string(),
                packages: BTreeMap::new(),
            }
        }

        fn add(&mut self, name: &str, version: Version, deps: &[(&str, &str)]) {
            let mut metadata = PackageMetadata::bare(name, &version);
            for (dep, range) in deps {
                metadata
                    .dependencies
                    .insert(dep.to_string(), range.to_string());
            }
            self.packages
                .entry(name.to_string())
                .or_default()
                .push((version, metadata));
        }
    }

    impl PackageSource for StaticSource {
        fn name(&self) -> &str {
            &self.label
        }

        fn list_versions(&self, package: &str) -> Result<Vec<Version>, SourceError> {
            let entries = self
                .packages
                .get(package)
                .ok_or_else(|| SourceError::NotFound(package.to_string()))?;
            let mut versions: Vec<Version> = entries.iter().map(|(v, _)| v.clone()).collect();
            versions.sort_by(|a, b| b.cmp(a));
            Ok(versions)
        }

        fn fetch(&self, package: &str, version: &Version) -> Result<FetchedPackage, SourceError> {
            let entries = self
                .packages
                .get(package)
                .ok_or_else(|| SourceError::NotFound(package.to_string()))?;
            let (_, metadata) = entries
                .iter()
                .find(|(v, _)| v == version)
                .ok_or_else(|| SourceError::VersionNotFound {
                    package: package.to_string(),
                    version: version.to_string(),
                })?;
            Ok(FetchedPackage {
                metadata: metadata.clone(),
                content: format!("program {} {{}}", package).into_bytes(),
            })
        }
    }

    fn direct(entries: &[(&str, &str)]) -> BTreeMap<String, VersionRange> {
        entries
            .iter()
            .map(|(name, range)| (name.to_string(), VersionRange::parse(range).unwrap()))
            .collect()
    }

    #[test]
    fn test_picks_highest_satisfying() {
        let mut source = StaticSource::new("test");
        source.add("motor-driver", Version::new(1, 0, 0), &[]);
        source.add("motor-driver", Version::new(1, 2, 0), &[]);
        source.add("motor-driver", Version::new(2, 0, 0), &[]);

        let resolver = Resolver::new().with_source(&source);
        let graph = resolver
            .resolve("app", &direct(&[("motor-driver", "^1.0.0")]))
            .unwrap();

        assert_eq!(graph.packages["motor-driver"].version, Version::new(1, 2, 0));
    }

    #[test]
    fn test_transitive_dependency() {
        let mut source = StaticSource::new("test");
        source.add("sensor-lib", Version::new(1, 0, 0), &[("motor-driver", "^1.0.0")]);
        source.add("motor-driver", Version::new(1, 1, 0), &[]);

        let resolver = Resolver::new().with_source(&source);
        let graph = resolver
            .resolve("app", &direct(&[("sensor-lib", "^1.0.0")]))
            .unwrap();

        assert_eq!(graph.packages.len(), 2);
        assert!(graph.edges_satisfied());
        assert_eq!(
            graph.requirements["motor-driver"][0].requirer,
            "sensor-lib"
        );
    }

    #[test]
    fn test_conflict_names_requirers() {
        let mut source = StaticSource::new("test");
        source.add("a", Version::new(1, 0, 0), &[("b", "^1.0.0")]);
        source.add("c", Version::new(1, 0, 0), &[("b", "^2.0.0")]);
        source.add("b", Version::new(1, 0, 0), &[]);
        source.add("b", Version::new(2, 0, 0), &[]);

        let resolver = Resolver::new().with_source(&source);
        let result = resolver.resolve("app", &direct(&[("a", "^1.0.0"), ("c", "^1.0.0")]));

        match result {
            Err(ResolveError::Conflict { package, requirements }) => {
                assert_eq!(package, "b");
                let requirers: Vec<&str> =
                    requirements.iter().map(|r| r.requirer.as_str()).collect();
                assert!(requirers.contains(&"a"));
                assert!(requirers.contains(&"c"));
            }
            other => panic!("Expected Conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_not_found() {
        let source = StaticSource::new("test");
        let resolver = Resolver::new().with_source(&source);

        let result = resolver.resolve("app", &direct(&[("ghost", "^1.0.0")]));
        match result {
            Err(ResolveError::NotFound { package, requirers }) => {
                assert_eq!(package, "ghost");
                assert_eq!(requirers, vec!["app"]);
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_terminates() {
        let mut source = StaticSource::new("test");
        source.add("a", Version::new(1, 0, 0), &[("b", "^1.0.0")]);
        source.add("b", Version::new(1, 0, 0), &[("a", "^1.0.0")]);

        let resolver = Resolver::new().with_source(&source);
        let graph = resolver.resolve("app", &direct(&[("a", "^1.0.0")])).unwrap();

        assert_eq!(graph.packages.len(), 2);
        assert!(graph.edges_satisfied());
    }

    #[test]
    fn test_prerelease_not_selected() {
        let mut source = StaticSource::new("test");
        source.add("servo", Version::new(1, 0, 0), &[]);
        source.add("servo", Version::parse("1.1.0-rc.1").unwrap(), &[]);

        let resolver = Resolver::new().with_source(&source);
        let graph = resolver.resolve("app", &direct(&[("servo", "^1.0.0")])).unwrap();

        assert_eq!(graph.packages["servo"].version, Version::new(1, 0, 0));
    }

    #[test]
    fn test_first_source_wins() {
        let mut stdlib = StaticSource::new("stdlib");
        stdlib.add("servo", Version::new(1, 0, 0), &[]);

        let mut registry = StaticSource::new("registry");
        registry.add("servo", Version::new(1, 0, 0), &[]);

        let resolver = Resolver::new().with_source(&stdlib).with_source(&registry);
        let graph = resolver.resolve("app", &direct(&[("servo", "^1.0.0")])).unwrap();

        assert_eq!(graph.packages["servo"].source, "stdlib");
    }

    #[test]
    fn test_later_source_supplies_newer_versions() {
        let mut stdlib = StaticSource::new("stdlib");
        stdlib.add("servo", Version::new(1, 0, 0), &[]);

        let mut registry = StaticSource::new("registry");
        registry.add("servo", Version::new(1, 0, 0), &[]);
        registry.add("servo", Version::new(1, 4, 0), &[]);

        let resolver = Resolver::new().with_source(&stdlib).with_source(&registry);
        let graph = resolver.resolve("app", &direct(&[("servo", "^1.0.0")])).unwrap();

        assert_eq!(graph.packages["servo"].version, Version::new(1, 4, 0));
        assert_eq!(graph.packages["servo"].source, "registry");
    }

    #[test]
    fn test_timeout_is_fatal() {
        struct TimingOut;
        impl PackageSource for TimingOut {
            fn name(&self) -> &str {
                "slow"
            }
            fn list_versions(&self, package: &str) -> Result<Vec<Version>, SourceError> {
                Err(SourceError::Timeout {
                    package: package.to_string(),
                    attempts: 3,
                })
            }
            fn fetch(&self, package: &str, _: &Version) -> Result<FetchedPackage, SourceError> {
                Err(SourceError::Timeout {
                    package: package.to_string(),
                    attempts: 3,
                })
            }
        }

        let source = TimingOut;
        let resolver = Resolver::new().with_source(&source);

        let result = resolver.resolve("app", &direct(&[("sensor-lib", "^1.0.0")]));
        match result {
            Err(ResolveError::Source(SourceError::Timeout { package, attempts })) => {
                assert_eq!(package, "sensor-lib");
                assert_eq!(attempts, 3);
            }
            other => panic!("Expected Timeout, got {:?}", other),
        }
    }
}
