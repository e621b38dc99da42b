//! Overlayhub configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::frame::CoordinatorConfig;
use crate::manager::ManagerConfig;

/// Main Overlayhub configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frame handshake timing
    pub coordinator: CoordinatorConfig,

    /// Overlay manager timing and z-index bands
    pub manager: ManagerConfig,

    /// Log level for the `oh` binary (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Check values that would make the hub misbehave
    pub fn validate(&self) -> Result<()> {
        let bands = &self.manager.z_index;
        if !(bands.default < bands.modal && bands.modal < bands.auto_close && bands.auto_close < bands.foreground) {
            return Err(eyre::eyre!(
                "z-index bands must be strictly ordered: default < modal < auto-close < foreground"
            ));
        }
        if self.coordinator.poll_interval_ms > self.coordinator.handshake_timeout_ms {
            return Err(eyre::eyre!(
                "poll-interval-ms ({}) exceeds handshake-timeout-ms ({})",
                self.coordinator.poll_interval_ms,
                self.coordinator.handshake_timeout_ms
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .overlayhub.yml
        let local_config = PathBuf::from(".overlayhub.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/overlayhub/overlayhub.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("overlayhub").join("overlayhub.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Log level from the config file, read before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}
