use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::{Config, RouterModeKind};

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl Config {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/pagekit/config.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("pagekit").join("config.toml")
    }

    /// Loads configuration from the default config file.
    ///
    /// - If the file doesn't exist, returns `Config::default()`.
    /// - Otherwise behaves like [`Config::load_from`].
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Config::default());
        }

        Self::load_from(&path)
    }

    /// Loads, parses and validates the configuration at `path`.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - param mode has a non-empty query key
    /// - the root container is set
    /// - the initial path is absolute
    /// - the listener limit is positive
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.router.mode == RouterModeKind::Param && self.router.query_key.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "router.query_key must not be empty in param mode".to_string(),
            });
        }

        if self.router.root_container.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "router.root_container must not be empty".to_string(),
            });
        }

        if !self.router.initial_path.starts_with('/') {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "router.initial_path '{}' must start with '/'",
                    self.router.initial_path
                ),
            });
        }

        if self.events.max_listeners == 0 {
            return Err(ConfigError::ValidationError {
                message: "events.max_listeners must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}
