//! Client configuration: reconnect pacing, send retry policy, and the
//! optional endpoint override, persisted as JSON.
//!
//! Defaults reproduce the stock client behavior: a fixed 1000 ms
//! reconnect delay with no retry cap, 3 send retries spaced 500 ms
//! apart, and subscription replay after reconnect.

use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_VERSION: u32 = 1;

// ============================================
// POLICY STRUCTS
// ============================================

/// Pacing for reconnection attempts after a transport drop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Delay between a drop and the next connection attempt.
    #[serde(default = "default_reconnect_delay_ms")]
    pub delay_ms: u64,

    /// Total window to keep retrying. `None` retries forever.
    pub max_elapsed_ms: Option<u64>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay_ms: default_reconnect_delay_ms(),
            max_elapsed_ms: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn max_elapsed(&self) -> Option<Duration> {
        self.max_elapsed_ms.map(Duration::from_millis)
    }
}

/// Retry policy for writes that fail on an open transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRetryPolicy {
    /// How many times a failed write is retried before giving up.
    #[serde(default = "default_send_max_retries")]
    pub max_retries: u32,

    /// Spacing between retry attempts.
    #[serde(default = "default_send_retry_delay_ms")]
    pub delay_ms: u64,
}

impl Default for SendRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_send_max_retries(),
            delay_ms: default_send_retry_delay_ms(),
        }
    }
}

impl SendRetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Endpoint override for apps that load their target from disk.
    pub endpoint: Option<String>,

    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    #[serde(default)]
    pub send_retry: SendRetryPolicy,

    /// Replay non-empty channels with `private/subscribe` on every
    /// successful open. `false` preserves the stock silent-loss behavior.
    #[serde(default = "default_resubscribe_on_reconnect")]
    pub resubscribe_on_reconnect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            endpoint: None,
            reconnect: ReconnectPolicy::default(),
            send_retry: SendRetryPolicy::default(),
            resubscribe_on_reconnect: default_resubscribe_on_reconnect(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_reconnect_delay_ms() -> u64 {
    1000
}
fn default_send_max_retries() -> u32 {
    3
}
fn default_send_retry_delay_ms() -> u64 {
    500
}
fn default_resubscribe_on_reconnect() -> bool {
    true
}

// ============================================
// IMPLEMENTATION
// ============================================

impl ClientConfig {
    /// Load config from {config_dir}/config.json.
    ///
    /// A missing file is not an error; defaults are returned.
    ///
    /// # Returns
    ///
    /// Returns `Ok(ClientConfig)` if loaded successfully or defaults if the
    /// file is missing. Returns `Err(ConfigError)` if the file exists but is
    /// corrupted/invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        // Read file
        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::caller(),
                path: config_path.clone(),
                source: e,
            }
        })?;

        // Parse JSON
        let config: ClientConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::caller(),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        // Validate
        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to {config_dir}/config.json using atomic write.
    ///
    /// Uses temp file + rename for atomicity (no corruption on crash).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - Directory creation fails
    /// - Serialization fails
    /// - Write fails
    /// - Rename fails
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        // Validate before saving
        self.validate()?;

        // Ensure directory exists
        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::caller(),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        // Serialize to JSON
        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::caller(),
            reason: e.to_string(),
        })?;

        // Write to temp file
        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::caller(),
            path: temp_path.clone(),
            source: e,
        })?;

        // Atomic rename (POSIX guarantees atomicity)
        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::caller(),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Version check
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::caller(),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        // Reconnect delay bounds
        if self.reconnect.delay_ms < 10 || self.reconnect.delay_ms > 3_600_000 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::caller(),
                reason: format!(
                    "Invalid reconnect delay: {} ms (must be 10-3600000)",
                    self.reconnect.delay_ms
                ),
            });
        }

        // Send retry bounds
        if self.send_retry.delay_ms < 10 || self.send_retry.delay_ms > 3_600_000 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::caller(),
                reason: format!(
                    "Invalid send retry delay: {} ms (must be 10-3600000)",
                    self.send_retry.delay_ms
                ),
            });
        }
        if self.send_retry.max_retries > 10 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::caller(),
                reason: format!(
                    "Invalid send retry count: {} (must be 0-10)",
                    self.send_retry.max_retries
                ),
            });
        }

        // Endpoint validation (if set)
        if let Some(ref endpoint) = self.endpoint {
            if endpoint.is_empty() {
                return Err(ConfigError::ValidationError {
                    location: ErrorLocation::caller(),
                    reason: "endpoint cannot be empty string".to_string(),
                });
            }

            // Basic URL format check
            if !endpoint.starts_with("ws://") && !endpoint.starts_with("wss://") {
                return Err(ConfigError::ValidationError {
                    location: ErrorLocation::caller(),
                    reason: format!("Invalid endpoint format: {}", endpoint),
                });
            }
        }

        Ok(())
    }
}
