//! Connection configuration
//!
//! Settings are stored as JSON. Fields missing from the file take their
//! defaults, so an empty object is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::laser::Variant;
use crate::protocol::{
    ChannelTiming, DEFAULT_BAUD_RATE, DEFAULT_OPEN_TIMEOUT_MS, DEFAULT_TIMEOUT_MS,
};

/// Errors loading or saving a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written
    #[error("Config file {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON
    #[error("Invalid config file {path}: {source}")]
    Parse {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// No per-user config directory on this host
    #[error("Could not find a config directory")]
    NoConfigDir,
}

/// Serial settings and session overrides for one laser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaserConfig {
    /// Baud rate
    pub baud_rate: u32,
    /// Default reply timeout in milliseconds
    pub timeout_ms: u64,
    /// Open timeout for explicit ports and scan probes in milliseconds
    pub open_timeout_ms: u64,
    /// Force a command set instead of classifying the model number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,
}

impl Default for LaserConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            open_timeout_ms: DEFAULT_OPEN_TIMEOUT_MS,
            variant: None,
        }
    }
}

impl LaserConfig {
    /// Channel timing derived from these settings
    pub fn timing(&self) -> ChannelTiming {
        ChannelTiming::with_timeout(Duration::from_millis(self.timeout_ms))
    }

    /// Open timeout as a duration
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    /// Default config file location
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir()
            .or_else(dirs::home_dir)
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(base.join("coboltlink").join("config.json"))
    }

    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load settings, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save settings as pretty-printed JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = LaserConfig::default();
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.timing().default_timeout, Duration::from_millis(1000));
        assert_eq!(config.timing().min_interval, Duration::from_millis(100));
        assert_eq!(config.open_timeout(), Duration::from_millis(1000));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: LaserConfig = serde_json::from_str(r#"{"timeout_ms": 250}"#).unwrap();
        assert_eq!(
            config,
            LaserConfig {
                timeout_ms: 250,
                ..LaserConfig::default()
            }
        );

        let config: LaserConfig = serde_json::from_str(r#"{"variant": "mld"}"#).unwrap();
        assert_eq!(config.variant, Some(Variant::Mld));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = LaserConfig {
            baud_rate: 9600,
            variant: Some(Variant::Dpl),
            ..LaserConfig::default()
        };
        config.save(&path).unwrap();

        assert_eq!(LaserConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            LaserConfig::load(&missing),
            Err(ConfigError::Io { .. })
        ));
        assert_eq!(
            LaserConfig::load_or_default(&missing).unwrap(),
            LaserConfig::default()
        );

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(
            LaserConfig::load(&broken),
            Err(ConfigError::Parse { .. })
        ));
    }
}
