//! Frame coordinator configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Handshake timing for embedded documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Interval between client readiness probes
    #[serde(rename = "poll-interval-ms", default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up on a silent client after this long
    #[serde(rename = "handshake-timeout-ms", default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    debug!("default_poll_interval_ms: called");
    50
}

fn default_handshake_timeout_ms() -> u64 {
    debug!("default_handshake_timeout_ms: called");
    5000
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            poll_interval_ms: 50,
            handshake_timeout_ms: 5000,
        }
    }
}

impl CoordinatorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.handshake_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: CoordinatorConfig = serde_yaml::from_str("handshake-timeout-ms: 250").unwrap();
        assert_eq!(config.handshake_timeout_ms, 250);
        assert_eq!(config.poll_interval_ms, 50);
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let config = CoordinatorConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }
}
