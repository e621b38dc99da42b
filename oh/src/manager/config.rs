//! Manager configuration and per-open configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{CssSize, Point};

/// Overlay manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Delay between close and unmount of instant-mounted overlays
    #[serde(rename = "unmount-delay-ms", default = "default_unmount_delay_ms")]
    pub unmount_delay_ms: u64,

    #[serde(rename = "z-index", default)]
    pub z_index: ZIndexBands,
}

fn default_unmount_delay_ms() -> u64 {
    debug!("default_unmount_delay_ms: called");
    1000
}

impl Default for ManagerConfig {
    fn default() -> Self {
        debug!("ManagerConfig::default: called");
        Self {
            unmount_delay_ms: 1000,
            z_index: ZIndexBands::default(),
        }
    }
}

impl ManagerConfig {
    pub fn unmount_delay(&self) -> Duration {
        Duration::from_millis(self.unmount_delay_ms)
    }
}

/// Base z-index of each band, lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZIndexBands {
    pub default: i64,
    pub modal: i64,
    #[serde(rename = "auto-close")]
    pub auto_close: i64,
    pub foreground: i64,
}

impl Default for ZIndexBands {
    fn default() -> Self {
        Self {
            default: 10,
            modal: 1000,
            auto_close: 2000,
            foreground: 3000,
        }
    }
}

/// Open-time configuration of one overlay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpenConfig {
    pub size: Option<CssSize>,
    pub position: Option<Point>,
    pub popup_in_center_of_view_port: bool,
    pub modal: bool,
    pub force_foreground: bool,
}

impl OpenConfig {
    pub fn modal() -> Self {
        Self {
            modal: true,
            ..Default::default()
        }
    }

    pub fn foreground() -> Self {
        Self {
            force_foreground: true,
            ..Default::default()
        }
    }
}
