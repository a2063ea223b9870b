//! Tool configuration
//!
//! All components take their registry URL, stdlib path, cache directory, and
//! network tuning from an explicit `Config` built once at process start;
//! nothing reads ambient globals.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default registry root
pub const DEFAULT_REGISTRY: &str = "https://packages.kinetrix.dev";

/// Environment override for the registry root
pub const REGISTRY_ENV: &str = "KINETRIX_REGISTRY";

/// Environment override for the stdlib directory
pub const STDLIB_ENV: &str = "KINETRIX_STDLIB";

/// Errors that can occur while building the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No home directory to place the cache under
    #[error("Could not determine home directory")]
    NoHome,

    /// Could not locate the running executable (for the bundled stdlib)
    #[error("Could not locate the kpm executable: {0}")]
    NoExecutable(std::io::Error),
}

/// Runtime configuration threaded through every component
#[derive(Debug, Clone)]
pub struct Config {
    /// Registry root URL
    pub registry_url: String,

    /// Directory holding the bundled stdlib packages
    pub stdlib_dir: PathBuf,

    /// Root of the package cache
    pub cache_dir: PathBuf,

    /// Per-request network timeout
    pub fetch_timeout: Duration,

    /// Total attempts for a timed-out request before surfacing the error
    pub fetch_attempts: u32,

    /// Maximum concurrent fetches
    pub fetch_workers: usize,
}

impl Config {
    /// Build the configuration from the environment
    ///
    /// The registry URL and stdlib directory honor the `KINETRIX_REGISTRY`
    /// and `KINETRIX_STDLIB` environment variables; the stdlib otherwise
    /// defaults to the `stdlib/` directory beside the executable, and the
    /// cache to `~/.kinetrix/cache`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let registry_url = std::env::var(REGISTRY_ENV)
            .unwrap_or_else(|_| DEFAULT_REGISTRY.to_string())
            .trim_end_matches('/')
            .to_string();

        let stdlib_dir = match std::env::var(STDLIB_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => {
                let exe = std::env::current_exe().map_err(ConfigError::NoExecutable)?;
                exe.parent()
                    .map(|p| p.join("stdlib"))
                    .unwrap_or_else(|| PathBuf::from("stdlib"))
            }
        };

        let home = dirs::home_dir().ok_or(ConfigError::NoHome)?;
        let cache_dir = home.join(".kinetrix").join("cache");

        Ok(Self {
            registry_url,
            stdlib_dir,
            cache_dir,
            fetch_timeout: Duration::from_secs(30),
            fetch_attempts: 3,
            fetch_workers: 8,
        })
    }

    /// Override the registry URL
    pub fn with_registry_url(mut self, url: &str) -> Self {
        self.registry_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Override the stdlib directory
    pub fn with_stdlib_dir(mut self, dir: PathBuf) -> Self {
        self.stdlib_dir = dir;
        self
    }

    /// Override the cache directory
    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = dir;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            registry_url: DEFAULT_REGISTRY.to_string(),
            stdlib_dir: PathBuf::from("/tmp/stdlib"),
            cache_dir: PathBuf::from("/tmp/cache"),
            fetch_timeout: Duration::from_secs(30),
            fetch_attempts: 3,
            fetch_workers: 8,
        }
    }

    #[test]
    fn test_with_registry_url_strips_trailing_slash() {
        let config = test_config().with_registry_url("https://mirror.example.com/");
        assert_eq!(config.registry_url, "https://mirror.example.com");
    }

    #[test]
    fn test_overrides() {
        let config = test_config()
            .with_stdlib_dir(PathBuf::from("/opt/kinetrix/stdlib"))
            .with_cache_dir(PathBuf::from("/var/cache/kinetrix"));

        assert_eq!(config.stdlib_dir, PathBuf::from("/opt/kinetrix/stdlib"));
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/kinetrix"));
    }
}
