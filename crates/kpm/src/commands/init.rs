//! Project initialization command
//!
//! Scaffolds a new Kinetrix package: a `kinetrix.json` manifest and a
//! blink-an-LED entry point.

use std::fs;
use std::path::Path;

use super::CommandError;
use crate::manifest::{Manifest, MANIFEST_FILE};

const HELLO_PROGRAM: &str = r#"program blink {
    loop forever {
        turn on pin 13
        wait 500
        turn off pin 13
        wait 500
    }
}
"#;

/// Initialize a new Kinetrix package in `dir`
///
/// The package name defaults to the directory name. Refuses to touch a
/// directory that already has a manifest.
pub fn init_project(dir: &Path, name: Option<&str>) -> Result<(), CommandError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if manifest_path.exists() {
        return Err(CommandError::AlreadyInitialized(
            manifest_path.display().to_string(),
        ));
    }

    let package_name = match name {
        Some(n) => n.to_string(),
        None => dir
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("my-robot")
            .to_string(),
    };

    let manifest = Manifest::new(&package_name);
    manifest.validate()?;

    fs::create_dir_all(dir)?;
    manifest.to_file(&manifest_path)?;

    let main_path = dir.join("main.kx");
    if !main_path.exists() {
        fs::write(&main_path, HELLO_PROGRAM)?;
    }

    println!("Created package '{}'", package_name);
    println!("  - {}", MANIFEST_FILE);
    println!("  - main.kx");

    Ok(())
}
