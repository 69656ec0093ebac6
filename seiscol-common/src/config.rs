//! Configuration loading and config-file resolution
//!
//! Config files are TOML. The file used is resolved in priority order:
//! 1. Explicit path (e.g. a command-line argument from the caller)
//! 2. Environment variable (`SEISCOL_CONFIG` by default)
//! 3. Per-user config directory (`~/.config/seiscol/config.toml` on Linux)
//! 4. No file: compiled defaults
//!
//! A missing file never aborts; the loader warns and falls back to defaults.
//! A file that exists but does not parse is an error.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable consulted for the config file path
pub const CONFIG_ENV_VAR: &str = "SEISCOL_CONFIG";

/// Name of the per-user config directory and default file
const APP_DIR: &str = "seiscol";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where a resolved config path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit,
    Environment,
    UserConfigDir,
}

/// Resolves which config file (if any) should be loaded.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    env_var: String,
    user_dir: Option<PathBuf>,
}

impl ConfigResolver {
    /// Resolver using `SEISCOL_CONFIG` and the platform config directory.
    pub fn new() -> Self {
        Self {
            env_var: CONFIG_ENV_VAR.to_string(),
            user_dir: dirs::config_dir().map(|d| d.join(APP_DIR)),
        }
    }

    /// Override the environment variable name.
    pub fn with_env_var(mut self, name: &str) -> Self {
        self.env_var = name.to_string();
        self
    }

    /// Override the per-user directory searched for `config.toml`.
    pub fn with_user_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.user_dir = dir;
        self
    }

    /// Resolve the config path. `None` means compiled defaults should be used.
    pub fn resolve(&self, explicit: Option<&Path>) -> Option<(PathBuf, ConfigSource)> {
        if let Some(path) = explicit {
            return Some((path.to_path_buf(), ConfigSource::Explicit));
        }

        if let Ok(path) = std::env::var(&self.env_var) {
            if !path.is_empty() {
                return Some((PathBuf::from(path), ConfigSource::Environment));
            }
        }

        let user_file = self.user_dir.as_ref()?.join(CONFIG_FILE_NAME);
        if user_file.exists() {
            return Some((user_file, ConfigSource::UserConfigDir));
        }

        None
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a TOML document into `T`.
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(toml::from_str(content)?)
}

/// Read and parse a TOML file.
pub fn load_toml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
    parse_toml(&content)
}

/// Load `T` from the resolved config file, falling back to `T::default()`.
///
/// Missing files produce a warning. Unreadable or malformed files are errors.
pub fn load_or_default<T>(resolver: &ConfigResolver, explicit: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match resolver.resolve(explicit) {
        Some((path, source)) => {
            if !path.exists() {
                warn!(
                    "Config file {} ({:?}) not found, using built-in defaults",
                    path.display(),
                    source
                );
                return Ok(T::default());
            }
            info!("Loading configuration from {}", path.display());
            load_toml_file(&path)
        }
        None => {
            info!("No config file found, using built-in defaults");
            Ok(T::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default)]
        logging: LoggingConfig,
    }

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.file.is_none());
    }

    #[test]
    fn test_parse_toml_partial_logging_section() {
        let parsed: Sample = parse_toml("[logging]\nlevel = \"debug\"\n").unwrap();
        assert_eq!(parsed.logging.level, "debug");
        assert!(parsed.logging.file.is_none());
    }

    #[test]
    fn test_parse_toml_rejects_malformed() {
        let result: Result<Sample> = parse_toml("[logging\nlevel = 3");
        assert!(matches!(result, Err(Error::TomlParse(_))));
    }

    #[test]
    fn test_explicit_path_wins() {
        let resolver = ConfigResolver::new()
            .with_env_var("SEISCOL_TEST_UNUSED_VAR")
            .with_user_dir(None);
        let explicit = PathBuf::from("/tmp/explicit.toml");
        let (path, source) = resolver.resolve(Some(&explicit)).unwrap();
        assert_eq!(path, explicit);
        assert_eq!(source, ConfigSource::Explicit);
    }

    #[test]
    fn test_no_sources_resolves_to_none() {
        let resolver = ConfigResolver::new()
            .with_env_var("SEISCOL_TEST_UNSET_VAR_9F2C")
            .with_user_dir(None);
        assert!(resolver.resolve(None).is_none());
    }
}
