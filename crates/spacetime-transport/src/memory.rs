//! In-Memory Network
//!
//! Deterministic in-process network for simulation and testing. Listeners
//! register under `address:port`; `connect` builds a `tokio::io::duplex`
//! pipe and hands the far end to the listener's accept queue. No sockets,
//! no ports, no timing beyond what the caller does.

use crate::config::TransportConfig;
use crate::stream::StreamConnection;
use async_trait::async_trait;
use parking_lot::Mutex;
use spacetime_core::{
    Connection, ConnectionType, Listener, NetworkProvider, TransportError, TransportResult,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{duplex, split, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, watch};

/// Connection over one end of an in-memory pipe
pub type MemoryConnection = StreamConnection<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

type Endpoint = (String, u16);

struct Registration {
    listener_id: u64,
    incoming: mpsc::UnboundedSender<Arc<MemoryConnection>>,
}

#[derive(Default)]
struct Registry {
    listeners: Mutex<HashMap<Endpoint, Registration>>,
    next_listener_id: AtomicU64,
    next_client_port: AtomicU64,
}

/// Simulated network shared by every handle cloned from it
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    registry: Arc<Registry>,
    config: TransportConfig,
}

impl MemoryNetwork {
    /// Create an empty network
    pub fn new(config: TransportConfig) -> Self {
        Self {
            registry: Arc::default(),
            config,
        }
    }

    /// Whether a listener is bound at `address:port`
    pub fn is_listening(&self, address: &str, port: u16) -> bool {
        self.registry
            .listeners
            .lock()
            .contains_key(&(address.to_string(), port))
    }

    /// Number of bound listeners
    pub fn listener_count(&self) -> usize {
        self.registry.listeners.lock().len()
    }

    fn endpoint(&self, label: String, stream: DuplexStream) -> MemoryConnection {
        let (reader, writer) = split(stream);
        StreamConnection::new(
            label,
            reader,
            writer,
            self.config.read_buffer_size,
            self.config.max_frame_size,
        )
    }

    /// Connect to the listener at `address:port`
    pub fn connect_memory(&self, address: &str, port: u16) -> TransportResult<MemoryConnection> {
        let endpoint = (address.to_string(), port);
        let listeners = self.registry.listeners.lock();
        let registration = listeners
            .get(&endpoint)
            .ok_or_else(|| TransportError::ConnectionRefused(format!("{address}:{port}")))?;

        let client_port = self.registry.next_client_port.fetch_add(1, Ordering::Relaxed);
        let (client_end, server_end) = duplex(self.config.read_buffer_size);
        let client = self.endpoint(format!("mem-client-{client_port}->{address}:{port}"), client_end);
        let server = self.endpoint(format!("mem-{address}:{port}<-client-{client_port}"), server_end);

        registration
            .incoming
            .send(Arc::new(server))
            .map_err(|_| TransportError::ConnectionRefused(format!("{address}:{port}")))?;
        Ok(client)
    }

    /// Bind a listener at `address:port`
    pub fn bind_memory(&self, address: &str, port: u16) -> TransportResult<MemoryListener> {
        let endpoint = (address.to_string(), port);
        let mut listeners = self.registry.listeners.lock();
        if listeners.contains_key(&endpoint) {
            return Err(TransportError::AddressInUse(format!("{address}:{port}")));
        }
        let listener_id = self.registry.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let (incoming, rx) = mpsc::unbounded_channel();
        listeners.insert(
            endpoint.clone(),
            Registration {
                listener_id,
                incoming,
            },
        );
        let (closed, _) = watch::channel(false);
        Ok(MemoryListener {
            registry: Arc::clone(&self.registry),
            endpoint,
            listener_id,
            incoming: tokio::sync::Mutex::new(rx),
            closed,
        })
    }
}

impl fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryNetwork")
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl NetworkProvider for MemoryNetwork {
    async fn connect(
        &self,
        address: &str,
        port: u16,
        _kind: ConnectionType,
    ) -> TransportResult<Arc<dyn Connection>> {
        Ok(Arc::new(self.connect_memory(address, port)?))
    }

    async fn listen(
        &self,
        address: &str,
        port: u16,
        _kind: ConnectionType,
    ) -> TransportResult<Arc<dyn Listener>> {
        Ok(Arc::new(self.bind_memory(address, port)?))
    }
}

/// Listener bound on a [`MemoryNetwork`]
pub struct MemoryListener {
    registry: Arc<Registry>,
    endpoint: Endpoint,
    listener_id: u64,
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<Arc<MemoryConnection>>>,
    closed: watch::Sender<bool>,
}

impl MemoryListener {
    /// Accept the next connection as its concrete type
    pub async fn accept_memory(&self) -> TransportResult<Arc<MemoryConnection>> {
        let mut closed = self.closed.subscribe();
        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            connection = incoming.recv() => connection.ok_or(TransportError::Closed),
            _ = crate::wait_closed(&mut closed) => Err(TransportError::Closed),
        }
    }

    fn unregister(&self) {
        let mut listeners = self.registry.listeners.lock();
        let owned = listeners
            .get(&self.endpoint)
            .is_some_and(|registration| registration.listener_id == self.listener_id);
        if owned {
            listeners.remove(&self.endpoint);
        }
    }
}

#[async_trait]
impl Listener for MemoryListener {
    async fn accept(&self) -> TransportResult<Arc<dyn Connection>> {
        let connection: Arc<dyn Connection> = self.accept_memory().await?;
        Ok(connection)
    }

    async fn close(&self) {
        self.unregister();
        self.closed.send_replace(true);
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        self.unregister();
    }
}

impl fmt::Debug for MemoryListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryListener")
            .field("address", &self.endpoint.0)
            .field("port", &self.endpoint.1)
            .finish_non_exhaustive()
    }
}
