//! Transport configuration

use spacetime_core::config::{SimulationConfig, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MAX_FRAME_SIZE};
use std::time::Duration;

/// Settings for the tokio and in-memory transports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Disable Nagle's algorithm on TCP streams
    pub nodelay: bool,
    /// Deadline for outbound connects
    pub connect_timeout: Duration,
    /// Scratch buffer for `read_max` and UDP datagrams; also the in-memory
    /// pipe capacity
    pub read_buffer_size: usize,
    /// Largest accepted length-prefixed frame
    pub max_frame_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            nodelay: true,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            read_buffer_size: 64 * 1024,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl TransportConfig {
    /// Derive transport settings from the simulation configuration
    pub fn from_simulation(config: &SimulationConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            max_frame_size: config.max_frame_size,
            ..Self::default()
        }
    }
}
