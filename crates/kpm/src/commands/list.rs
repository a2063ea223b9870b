//! List command

use std::path::Path;

use super::{resolve_project_root, CommandError};
use crate::manifest::{Manifest, MANIFEST_FILE};

/// Print the dependencies recorded in the project manifest
pub fn list_installed(start_dir: Option<&Path>) -> Result<(), CommandError> {
    let project_root = resolve_project_root(start_dir)?;
    let manifest = Manifest::from_file(&project_root.join(MANIFEST_FILE))?;

    if manifest.dependencies.is_empty() {
        println!("No packages installed");
        return Ok(());
    }

    println!("Installed packages:");
    for (name, range) in &manifest.dependencies {
        println!("  {}@{}", name, range);
    }

    Ok(())
}
