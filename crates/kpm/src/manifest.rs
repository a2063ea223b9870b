//! Project manifest (`kinetrix.json`)
//!
//! Provides the typed model, validation, and atomic persistence for Kinetrix
//! project manifests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::version::{Version, VersionError, VersionRange};

/// Manifest file name
pub const MANIFEST_FILE: &str = "kinetrix.json";

/// Errors that can occur during manifest operations
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Failed to read or write the manifest file
    #[error("Failed to access manifest: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unknown-shaped JSON
    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    /// Structurally valid JSON that violates a manifest rule
    #[error("Invalid manifest: {0}")]
    Validation(String),

    /// A dependency entry carries an unparseable range
    #[error("Invalid range for dependency '{name}': {error}")]
    InvalidRange { name: String, error: VersionError },
}

/// Project manifest (`kinetrix.json`)
///
/// The single source of truth for a project's required packages. The
/// dependency map is only rewritten by the installer, atomically, after a
/// successful install.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Package name (must be non-empty; alphanumeric, hyphens, underscores)
    pub name: String,

    /// Semver version
    pub version: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// License identifier (SPDX)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Entry point (defaults to "main.kx")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,

    /// Keywords/tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    /// Supported hardware identifiers (e.g. "arduino-uno", "esp32")
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hardware: Vec<String>,

    /// Dependencies: package name -> version range string
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl Manifest {
    /// Create a fresh manifest with the defaults a new project gets
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            description: Some(String::new()),
            author: Some(String::new()),
            license: Some("MIT".to_string()),
            main: Some("main.kx".to_string()),
            keywords: Vec::new(),
            hardware: vec!["arduino-uno".to_string()],
            dependencies: BTreeMap::new(),
        }
    }

    /// Parse a manifest from a file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a manifest from a string
    pub fn from_str(content: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate the manifest
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.name.is_empty() {
            return Err(ManifestError::Validation(
                "Package name cannot be empty".to_string(),
            ));
        }

        if !is_valid_package_name(&self.name) {
            return Err(ManifestError::Validation(format!(
                "Invalid package name: {}. Names may contain only alphanumeric characters, hyphens, and underscores",
                self.name
            )));
        }

        Version::parse(&self.version).map_err(|_| {
            ManifestError::Validation(format!(
                "Invalid version: {}. Must be valid semver (e.g., 1.2.3)",
                self.version
            ))
        })?;

        for (name, range) in &self.dependencies {
            if !is_valid_package_name(name) {
                return Err(ManifestError::Validation(format!(
                    "Invalid dependency name: {}",
                    name
                )));
            }
            VersionRange::parse(range).map_err(|error| ManifestError::InvalidRange {
                name: name.clone(),
                error,
            })?;
        }

        Ok(())
    }

    /// Write the manifest atomically (temp file, then rename)
    pub fn to_file(&self, path: &Path) -> Result<(), ManifestError> {
        let json = serde_json::to_string_pretty(self)?;

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let tmp_path = dir.join(format!(".{}.tmp", MANIFEST_FILE));
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, path)?;

        Ok(())
    }

    /// Parse the dependency map into typed ranges
    pub fn dependency_ranges(&self) -> Result<BTreeMap<String, VersionRange>, ManifestError> {
        let mut ranges = BTreeMap::new();
        for (name, range) in &self.dependencies {
            let parsed = VersionRange::parse(range).map_err(|error| {
                ManifestError::InvalidRange {
                    name: name.clone(),
                    error,
                }
            })?;
            ranges.insert(name.clone(), parsed);
        }
        Ok(ranges)
    }

    /// Record a dependency range, replacing any existing entry
    pub fn set_dependency(&mut self, name: &str, range: &VersionRange) {
        self.dependencies.insert(name.to_string(), range.to_string());
    }

    /// Check whether the manifest declares any dependencies
    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }
}

/// Validate a package name (alphanumeric, hyphens, underscores)
pub fn is_valid_package_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Find the project root by walking up from `start` looking for the manifest
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;

    loop {
        if current.join(MANIFEST_FILE).exists() {
            return Some(current.to_path_buf());
        }
        current = current.parent()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_manifest() {
        let json = r#"{
            "name": "line-follower",
            "version": "1.0.0",
            "description": "A line-following robot",
            "hardware": ["arduino-uno"],
            "dependencies": {
                "motor-driver": "^1.0.0",
                "ir-sensor": "~2.1.0"
            }
        }"#;

        let manifest = Manifest::from_str(json).unwrap();
        assert_eq!(manifest.name, "line-follower");
        assert_eq!(manifest.version, "1.0.0");
        assert_eq!(manifest.dependencies.len(), 2);
        assert_eq!(manifest.hardware, vec!["arduino-uno"]);
    }

    #[test]
    fn test_parse_minimal_manifest() {
        let json = r#"{ "name": "bare", "version": "0.1.0" }"#;

        let manifest = Manifest::from_str(json).unwrap();
        assert_eq!(manifest.name, "bare");
        assert!(manifest.dependencies.is_empty());
        assert!(manifest.description.is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = r#"{ "name": "x", "version": "1.0.0", "dependancies": {} }"#;

        let result = Manifest::from_str(json);
        assert!(matches!(result, Err(ManifestError::Parse(_))));
    }

    #[test]
    fn test_empty_name_rejected() {
        let json = r#"{ "name": "", "version": "1.0.0" }"#;
        assert!(matches!(
            Manifest::from_str(json),
            Err(ManifestError::Validation(_))
        ));
    }

    #[test]
    fn test_bad_version_rejected() {
        let json = r#"{ "name": "x", "version": "1.0" }"#;
        assert!(matches!(
            Manifest::from_str(json),
            Err(ManifestError::Validation(_))
        ));
    }

    #[test]
    fn test_bad_dependency_range_rejected() {
        let json = r#"{
            "name": "x",
            "version": "1.0.0",
            "dependencies": { "servo": "one-point-oh" }
        }"#;

        let result = Manifest::from_str(json);
        assert!(matches!(result, Err(ManifestError::InvalidRange { .. })));
    }

    #[test]
    fn test_valid_package_names() {
        assert!(is_valid_package_name("motor-driver"));
        assert!(is_valid_package_name("pid_controller"));
        assert!(is_valid_package_name("servo2"));

        assert!(!is_valid_package_name(""));
        assert!(!is_valid_package_name("bad name"));
        assert!(!is_valid_package_name("bad.name"));
        assert!(!is_valid_package_name("bad/name"));
    }

    #[test]
    fn test_dependency_ranges() {
        let json = r#"{
            "name": "x",
            "version": "1.0.0",
            "dependencies": { "servo": "^1.2.0", "lcd": "*" }
        }"#;

        let manifest = Manifest::from_str(json).unwrap();
        let ranges = manifest.dependency_ranges().unwrap();

        assert!(matches!(ranges["servo"], VersionRange::Caret(_)));
        assert!(matches!(ranges["lcd"], VersionRange::Any));
    }

    #[test]
    fn test_new_manifest_is_valid() {
        let manifest = Manifest::new("my-robot");
        assert!(manifest.validate().is_ok());
        assert_eq!(manifest.version, "1.0.0");
        assert_eq!(manifest.main.as_deref(), Some("main.kx"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);

        let mut manifest = Manifest::new("roundtrip");
        manifest.set_dependency("servo", &VersionRange::Caret(Version::new(1, 0, 0)));
        manifest.to_file(&path).unwrap();

        let reloaded = Manifest::from_file(&path).unwrap();
        assert_eq!(manifest, reloaded);
        assert_eq!(reloaded.dependencies["servo"], "^1.0.0");
    }

    #[test]
    fn test_find_project_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join(MANIFEST_FILE), r#"{"name":"r","version":"1.0.0"}"#).unwrap();

        let nested = root.join("src").join("deep");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested), Some(root.to_path_buf()));
    }

    #[test]
    fn test_find_project_root_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_project_root(dir.path()), None);
    }
}
