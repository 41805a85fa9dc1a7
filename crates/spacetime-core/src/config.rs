//! Runtime configuration
//!
//! Configuration is layered: defaults, then an optional TOML file, then
//! `SPACETIME_*` environment variables. Call [`SimulationConfig::validate`]
//! after the last layer.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default bounded wait for listener-side reads
pub const DEFAULT_LISTEN_READ_TIMEOUT_MS: u64 = 10_000;

/// Default transport connect deadline
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

/// Default upper bound for one length-prefixed frame
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const ENV_PREFIX: &str = "SPACETIME_";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for this schema
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override could not be parsed
    #[error("Invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable name
        key: String,
        /// Offending value
        value: String,
    },

    /// A value is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings shared by the simulation modules and transports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Bounded wait for listener-side reads, in milliseconds
    pub listen_read_timeout_ms: u64,
    /// Deadline for establishing outbound connections, in milliseconds
    pub connect_timeout_ms: u64,
    /// Largest accepted length-prefixed frame, in bytes
    pub max_frame_size: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            listen_read_timeout_ms: DEFAULT_LISTEN_READ_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl SimulationConfig {
    /// Parse from a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Apply `SPACETIME_*` overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<(), ConfigError> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply `SPACETIME_*` overrides from the given key/value pairs
    pub fn merge_with_vars<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "LISTEN_READ_TIMEOUT_MS" => self.listen_read_timeout_ms = parse_var(&key, &value)?,
                "CONNECT_TIMEOUT_MS" => self.connect_timeout_ms = parse_var(&key, &value)?,
                "MAX_FRAME_SIZE" => self.max_frame_size = parse_var(&key, &value)?,
                _ => tracing::debug!(key = %key, "ignoring unknown configuration variable"),
            }
        }
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_read_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "listen_read_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "connect_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::Invalid(
                "max_frame_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Listener-read deadline
    pub fn listen_read_timeout(&self) -> Duration {
        Duration::from_millis(self.listen_read_timeout_ms)
    }

    /// Connect deadline
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Builder-style override of the listener-read deadline
    pub fn with_listen_read_timeout(mut self, timeout: Duration) -> Self {
        self.listen_read_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
