//! Configuration loading for bgtimer-client.
//!
//! Configuration is loaded from a TOML file. Every section and key is
//! optional; missing values take the defaults below.

use bgtimer_types::TimerMode;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for a session client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Turn timer configuration.
    #[serde(default)]
    pub timer: TimerConfig,
    /// Replication configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Presence configuration.
    #[serde(default)]
    pub presence: PresenceConfig,
}

/// Turn timer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TimerConfig {
    /// Clock direction for new games (default: countup).
    #[serde(default)]
    pub mode: TimerMode,
    /// Count-down allowance in seconds (default: 600).
    #[serde(default = "default_initial_seconds")]
    pub initial_seconds: u64,
    /// Tick cadence in milliseconds (default: 1000).
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

/// Replication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Quiet period before a host publishes (default: 500).
    #[serde(default = "default_publish_debounce_millis")]
    pub publish_debounce_millis: u64,
    /// Upper bound on any single store call (default: 5000).
    #[serde(default = "default_store_timeout_millis")]
    pub store_timeout_millis: u64,
}

/// Presence configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresenceConfig {
    /// Entries not seen for this long are not counted as connected
    /// (default: 0 = never stale).
    #[serde(default)]
    pub stale_after_secs: u64,
    /// Interval for rewriting this device's `lastSeen`
    /// (default: 0 = never).
    #[serde(default)]
    pub heartbeat_secs: u64,
}

fn default_initial_seconds() -> u64 {
    600
}

fn default_tick_millis() -> u64 {
    1000
}

fn default_publish_debounce_millis() -> u64 {
    500
}

fn default_store_timeout_millis() -> u64 {
    5000
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            mode: TimerMode::default(),
            initial_seconds: default_initial_seconds(),
            tick_millis: default_tick_millis(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            publish_debounce_millis: default_publish_debounce_millis(),
            store_timeout_millis: default_store_timeout_millis(),
        }
    }
}

impl TimerConfig {
    /// Tick cadence.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }
}

impl SyncConfig {
    /// Publish debounce window.
    pub fn publish_debounce(&self) -> Duration {
        Duration::from_millis(self.publish_debounce_millis)
    }

    /// Store call timeout.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_millis)
    }
}

impl PresenceConfig {
    /// Staleness window, if enabled.
    pub fn stale_after(&self) -> Option<Duration> {
        (self.stale_after_secs > 0).then(|| Duration::from_secs(self.stale_after_secs))
    }

    /// Heartbeat interval, if enabled.
    pub fn heartbeat(&self) -> Option<Duration> {
        (self.heartbeat_secs > 0).then(|| Duration::from_secs(self.heartbeat_secs))
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}
