//! Configuration for threadline
//!
//! Settings come from an optional `config.toml` in the platform config
//! directory; every field has a default so the file may be partial or absent.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_LOG_FILTER: &str = "threadline=info,threadline_core=info";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "threadline", "threadline")
}

/// Platform data directory, home of the default database.
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Platform config directory, home of `config.toml` and preferences.
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Configuration loading error
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid preferences file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Value out of range: {0}")]
    OutOfRange(String),
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file; the platform data directory when unset
    pub database_path: Option<PathBuf>,
    /// Name of the local user created on first run
    pub user_name: String,
    /// Period of the elapsed-time refresh while a session runs
    pub tick_interval_ms: u64,
    /// `tracing` filter used when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            user_name: "me".to_string(),
            tick_interval_ms: 1000,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Path of the config file in the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Load from the default location, falling back to defaults when there
    /// is no file.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::OutOfRange(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.user_name.trim().is_empty() {
            return Err(ConfigError::OutOfRange(
                "user_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml("user_name = \"ada\"\n").unwrap();
        assert_eq!(config.user_name, "ada");
        assert_eq!(config.tick_interval_ms, 1000);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config {
            database_path: Some(PathBuf::from("/tmp/t.db")),
            ..Config::default()
        };
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_zero_tick_rejected() {
        assert!(matches!(
            Config::from_toml("tick_interval_ms = 0"),
            Err(ConfigError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "log_filter = \"debug\"").unwrap();
        assert_eq!(Config::load_from(&path).unwrap().log_filter, "debug");
        assert!(matches!(
            Config::load_from(&dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
