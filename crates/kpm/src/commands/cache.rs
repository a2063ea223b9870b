//! Cache maintenance commands

use super::CommandError;
use crate::cache::Cache;
use crate::config::Config;
use crate::lock::DirLock;

/// Remove every cached package
///
/// The only way cache entries are ever evicted.
pub fn clear_cache(config: &Config) -> Result<(), CommandError> {
    let cache = Cache::open(&config.cache_dir)?;
    let _lock = DirLock::cache(cache.root())?;

    let removed = cache.clear()?;
    println!("Cleared {} cached package(s)", removed);

    Ok(())
}
