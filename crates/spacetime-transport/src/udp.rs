//! UDP transport
//!
//! A connected datagram socket presented as a byte stream. Received datagrams
//! are appended to a pending buffer; exact-size reads drain it once enough
//! bytes have arrived, max-size reads drain whatever one datagram delivered.

use crate::config::TransportConfig;
use async_trait::async_trait;
use spacetime_core::framing::checked_frame_len;
use spacetime_core::{Connection, TransportError, TransportResult};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::Mutex;

/// Largest payload a single UDP datagram can carry
const MAX_DATAGRAM: usize = 65_507;

/// Connection over a connected UDP socket
pub struct UdpConnection {
    socket: UdpSocket,
    peer: SocketAddr,
    pending: Mutex<Vec<u8>>,
    closed: AtomicBool,
    max_frame_size: usize,
}

impl UdpConnection {
    /// Bind an ephemeral local socket and connect it to `address:port`
    pub async fn connect(address: &str, port: u16, config: &TransportConfig) -> TransportResult<Self> {
        let peer = lookup_host((address, port))
            .await?
            .next()
            .ok_or_else(|| TransportError::ConnectionRefused(format!("{address}:{port}")))?;
        let bind_addr: SocketAddr = if peer.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(peer).await?;
        Ok(Self {
            socket,
            peer,
            pending: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            max_frame_size: config.max_frame_size,
        })
    }

    /// Remote address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Local address
    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    async fn receive_into(&self, pending: &mut Vec<u8>) -> TransportResult<()> {
        let mut datagram = vec![0u8; MAX_DATAGRAM];
        let n = self.socket.recv(&mut datagram).await?;
        pending.extend_from_slice(&datagram[..n]);
        Ok(())
    }

    fn ensure_open(&self) -> TransportResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for UdpConnection {
    async fn read(&self, size: usize) -> TransportResult<Vec<u8>> {
        self.ensure_open()?;
        let size = checked_frame_len(size as u64, self.max_frame_size)?;
        let mut pending = self.pending.lock().await;
        while pending.len() < size {
            self.receive_into(&mut pending).await?;
        }
        Ok(pending.drain(..size).collect())
    }

    async fn read_max(&self, max_size: usize) -> TransportResult<Vec<u8>> {
        self.ensure_open()?;
        if max_size == 0 {
            return Ok(Vec::new());
        }
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            self.receive_into(&mut pending).await?;
        }
        let n = max_size.min(pending.len());
        Ok(pending.drain(..n).collect())
    }

    async fn write(&self, data: &[u8]) -> TransportResult<()> {
        self.ensure_open()?;
        let sent = self.socket.send(data).await?;
        if sent != data.len() {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("datagram truncated: sent {sent} of {} bytes", data.len()),
            )));
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl fmt::Debug for UdpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdpConnection")
            .field("peer", &self.peer)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
