//! Configuration structure and defaults.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Log verbosity level.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Debug messages.
    Debug,
    /// Informational messages (default).
    #[default]
    Info,
    /// Warnings only.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// The env-filter directive for this level.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port the bridge listens on for client connections.
    pub listen_port: u16,
    /// Host the forwarding proxy runs on.
    pub proxy_host: String,
    /// Port of the forwarding proxy's device listing.
    pub proxy_port: u16,
    /// Discovery polling interval in milliseconds.
    pub discovery_interval_ms: u64,
    /// Log verbosity.
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: 9000,
            proxy_host: "localhost".into(),
            proxy_port: 9221,
            discovery_interval_ms: 1000,
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_port == 0 {
            return Err(ConfigError::Validation("listen_port must be non-zero".into()));
        }
        if self.proxy_port == 0 {
            return Err(ConfigError::Validation("proxy_port must be non-zero".into()));
        }
        if self.discovery_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "discovery_interval_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
