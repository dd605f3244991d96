//! The `Config` struct and its persistence.
//!
//! Covers:
//! - `load` / `save` (YAML file I/O with atomic write) at the default path
//! - `load_from` / `save_to` for explicit paths
//! - path helpers (`config_path`, `config_dir`)
//! - semantic validation

use crate::defaults;
use crate::error::ConfigError;
use crate::types::LogLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Coalescing window for batched tab UI updates, in milliseconds.
    ///
    /// Asynchronous invalidations scheduled within this window are merged and
    /// applied in a single flush.
    #[serde(default = "defaults::ui_update_coalesce_ms")]
    pub ui_update_coalesce_ms: u64,

    /// Deadline after which a tab that has not answered a beforeunload or
    /// unload request is force-removed from the close attempt.
    ///
    /// `None` waits indefinitely.
    #[serde(default = "defaults::unload_timeout_ms")]
    pub unload_timeout_ms: Option<u64>,

    /// Request process termination once the last window has been closed.
    #[serde(default = "defaults::bool_true")]
    pub quit_on_last_window_closed: bool,

    /// Refuse to close a window while any of its tabs has an active transfer.
    #[serde(default = "defaults::bool_true")]
    pub block_close_with_active_transfers: bool,

    /// Verbosity of the debug log file.
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ui_update_coalesce_ms: defaults::ui_update_coalesce_ms(),
            unload_timeout_ms: defaults::unload_timeout_ms(),
            quit_on_last_window_closed: true,
            block_close_with_active_transfers: true,
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default path, creating a default file if
    /// none exists yet.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        log::info!("Config path: {:?}", config_path);

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            log::info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            if let Err(e) = config.save() {
                log::error!("Failed to save default config: {}", e);
                return Err(e);
            }
            Ok(config)
        }
    }

    /// Load and validate configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        log::info!("Loading config from {:?}", path);
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml_ng::from_str(&contents).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml_ng::to_string(self).map_err(ConfigError::Serialize)?;

        // Atomic save: write to temp file then rename to prevent corruption on crash
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, &yaml)?;
        fs::rename(&temp_path, path)?;

        log::info!("Config saved to {:?}", path);
        Ok(())
    }

    /// Check field values that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ui_update_coalesce_ms == 0 {
            return Err(ConfigError::Validation(
                "ui_update_coalesce_ms must be greater than zero".to_string(),
            ));
        }
        if self.unload_timeout_ms == Some(0) {
            return Err(ConfigError::Validation(
                "unload_timeout_ms must be greater than zero (set it to null to wait indefinitely)"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Coalescing window as a `Duration`.
    pub fn ui_update_coalesce_interval(&self) -> Duration {
        Duration::from_millis(self.ui_update_coalesce_ms)
    }

    /// Unload deadline as a `Duration`, if one is configured.
    pub fn unload_timeout(&self) -> Option<Duration> {
        self.unload_timeout_ms.map(Duration::from_millis)
    }

    /// Path of the config file: `<config dir>/tabshell/config.yaml`.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    /// Directory holding tabshell's configuration.
    pub fn config_dir() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("tabshell")
        } else {
            PathBuf::from(".")
        }
    }
}
