//! Search command

use crate::config::Config;
use crate::source::LocalSource;

use super::CommandError;

/// Substring search over the stdlib package names
pub fn search_packages(query: &str, config: &Config) -> Result<(), CommandError> {
    let stdlib = LocalSource::new(config.stdlib_dir.clone());
    let results = stdlib.search(query);

    if results.is_empty() {
        println!("No packages found");
        return Ok(());
    }

    println!("Found {} package(s):", results.len());
    for name in results {
        println!("  {}", name);
    }

    Ok(())
}
