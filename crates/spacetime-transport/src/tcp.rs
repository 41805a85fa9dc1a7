//! TCP transport and the tokio network provider
//!
//! Real sockets via `tokio::net`. TCP supports connect and listen; UDP
//! supports connect only.

use crate::config::TransportConfig;
use crate::stream::StreamConnection;
use crate::udp::UdpConnection;
use async_trait::async_trait;
use parking_lot::Mutex;
use spacetime_core::{
    Connection, ConnectionType, Listener, NetworkProvider, TransportError, TransportResult,
};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::timeout;

/// Connection over a TCP stream
pub type TcpConnection = StreamConnection<OwnedReadHalf, OwnedWriteHalf>;

fn wrap_stream(stream: TcpStream, config: &TransportConfig) -> TransportResult<TcpConnection> {
    stream.set_nodelay(config.nodelay)?;
    let label = format!("tcp-{}-{}", stream.local_addr()?, stream.peer_addr()?);
    let (reader, writer) = stream.into_split();
    Ok(StreamConnection::new(
        label,
        reader,
        writer,
        config.read_buffer_size,
        config.max_frame_size,
    ))
}

fn map_bind_error(error: std::io::Error, address: &str, port: u16) -> TransportError {
    match error.kind() {
        ErrorKind::AddrInUse => TransportError::AddressInUse(format!("{address}:{port}")),
        _ => TransportError::Io(error),
    }
}

fn map_connect_error(error: std::io::Error, address: &str, port: u16) -> TransportError {
    match error.kind() {
        ErrorKind::ConnectionRefused => {
            TransportError::ConnectionRefused(format!("{address}:{port}"))
        }
        _ => TransportError::Io(error),
    }
}

/// Bound TCP listener
///
/// `close` releases the socket and wakes any pending `accept` with
/// `TransportError::Closed`.
#[derive(Debug)]
pub struct TcpListenerHandle {
    listener: Mutex<Option<Arc<TcpListener>>>,
    local_addr: SocketAddr,
    closed: watch::Sender<bool>,
    config: TransportConfig,
}

impl TcpListenerHandle {
    /// Wrap a bound tokio listener
    pub fn new(listener: TcpListener, config: TransportConfig) -> TransportResult<Self> {
        let local_addr = listener.local_addr()?;
        let (closed, _) = watch::channel(false);
        Ok(Self {
            listener: Mutex::new(Some(Arc::new(listener))),
            local_addr,
            closed,
            config,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl Listener for TcpListenerHandle {
    async fn accept(&self) -> TransportResult<Arc<dyn Connection>> {
        let mut closed = self.closed.subscribe();
        let listener = self.listener.lock().clone().ok_or(TransportError::Closed)?;
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                tracing::debug!(local = %self.local_addr, peer = %peer, "accepted tcp connection");
                Ok(Arc::new(wrap_stream(stream, &self.config)?))
            }
            _ = crate::wait_closed(&mut closed) => Err(TransportError::Closed),
        }
    }

    async fn close(&self) {
        self.listener.lock().take();
        self.closed.send_replace(true);
    }
}

/// Provider backed by real tokio sockets
#[derive(Debug, Clone, Default)]
pub struct TokioNetworkProvider {
    config: TransportConfig,
}

impl TokioNetworkProvider {
    /// Create with the given configuration
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Connect a TCP stream, honouring the connect deadline
    pub async fn connect_tcp(&self, address: &str, port: u16) -> TransportResult<TcpConnection> {
        let stream = timeout(self.config.connect_timeout, TcpStream::connect((address, port)))
            .await
            .map_err(|_| TransportError::Timeout(format!("TCP connect to {address}:{port}")))?
            .map_err(|e| map_connect_error(e, address, port))?;
        wrap_stream(stream, &self.config)
    }

    /// Bind a TCP listener
    pub async fn bind_tcp(&self, address: &str, port: u16) -> TransportResult<TcpListenerHandle> {
        let listener = TcpListener::bind((address, port))
            .await
            .map_err(|e| map_bind_error(e, address, port))?;
        TcpListenerHandle::new(listener, self.config.clone())
    }
}

#[async_trait]
impl NetworkProvider for TokioNetworkProvider {
    async fn connect(
        &self,
        address: &str,
        port: u16,
        kind: ConnectionType,
    ) -> TransportResult<Arc<dyn Connection>> {
        match kind {
            ConnectionType::Tcp => Ok(Arc::new(self.connect_tcp(address, port).await?)),
            ConnectionType::Udp => Ok(Arc::new(
                UdpConnection::connect(address, port, &self.config).await?,
            )),
        }
    }

    async fn listen(
        &self,
        address: &str,
        port: u16,
        kind: ConnectionType,
    ) -> TransportResult<Arc<dyn Listener>> {
        match kind {
            ConnectionType::Tcp => Ok(Arc::new(self.bind_tcp(address, port).await?)),
            ConnectionType::Udp => Err(TransportError::Unsupported(
                "UDP listeners are not supported".to_string(),
            )),
        }
    }
}
