//! Transport boundary
//!
//! These traits are what the simulation modules drive. Real backends (tokio
//! TCP/UDP) and the in-memory simulated network in `spacetime-transport`
//! implement them; the modules never see anything more concrete.
//!
//! # Effect Classification
//!
//! - **Category**: Infrastructure boundary
//! - **Implementation**: `spacetime-transport`
//! - **Usage**: `spacetime-simulation` network modules

use crate::config::DEFAULT_MAX_FRAME_SIZE;
use crate::effects::ConnectionType;
use crate::framing::{self, FramingError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Underlying I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the connection, or it was closed locally
    #[error("Connection closed")]
    Closed,

    /// Nothing is listening at the address
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// Another listener already holds the address
    #[error("Address in use: {0}")]
    AddressInUse(String),

    /// Length-prefix framing failed
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    /// Operation not offered by this transport kind
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Transport-level deadline elapsed
    #[error("Timed out: {0}")]
    Timeout(String),
}

/// Result alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// One open connection
///
/// Methods take `&self` so that reads and writes can be in flight at the same
/// time; implementations serialize access to each direction internally.
#[async_trait]
pub trait Connection: Send + Sync + fmt::Debug {
    /// Read exactly `size` bytes
    async fn read(&self, size: usize) -> TransportResult<Vec<u8>>;

    /// Read exactly `size` bytes, allowing an unchecked fast path
    async fn unsafe_read(&self, size: usize) -> TransportResult<Vec<u8>> {
        self.read(size).await
    }

    /// Read between 1 and `max_size` bytes
    async fn read_max(&self, max_size: usize) -> TransportResult<Vec<u8>>;

    /// Read one length-prefixed frame and return its payload
    async fn read_with_length_prefix(&self, prefix_bits: u8) -> TransportResult<Vec<u8>> {
        let width = framing::prefix_len(prefix_bits)?;
        let prefix = self.read(width).await?;
        let len = framing::decode_length_prefix(&prefix, prefix_bits)?;
        let len = framing::checked_frame_len(len, self.max_frame_size())?;
        if len == 0 {
            return Ok(Vec::new());
        }
        self.read(len).await
    }

    /// Write all of `data`
    async fn write(&self, data: &[u8]) -> TransportResult<()>;

    /// Write `data` as one length-prefixed frame
    async fn write_with_length_prefix(&self, data: &[u8], prefix_bits: u8) -> TransportResult<()> {
        let frame = framing::encode_frame(data, prefix_bits)?;
        self.write(&frame).await
    }

    /// Release the connection; never fails
    async fn close(&self);

    /// Largest frame `read_with_length_prefix` accepts
    fn max_frame_size(&self) -> usize {
        DEFAULT_MAX_FRAME_SIZE
    }
}

/// One bound listener
#[async_trait]
pub trait Listener: Send + Sync + fmt::Debug {
    /// Wait for the next inbound connection
    async fn accept(&self) -> TransportResult<Arc<dyn Connection>>;

    /// Stop listening; never fails
    async fn close(&self);
}

/// Factory for connections and listeners
#[async_trait]
pub trait NetworkProvider: Send + Sync + fmt::Debug {
    /// Open an outbound connection
    async fn connect(
        &self,
        address: &str,
        port: u16,
        kind: ConnectionType,
    ) -> TransportResult<Arc<dyn Connection>>;

    /// Bind a listener
    async fn listen(
        &self,
        address: &str,
        port: u16,
        kind: ConnectionType,
    ) -> TransportResult<Arc<dyn Listener>>;
}
