//! Caller-side proxies
//!
//! Each method builds one effect, waits for its reply through the bus and
//! interprets the event. A `Failure` or any event kind the request does not
//! expect becomes [`UniverseError::BadResponse`].

use crate::error::UniverseError;
use crate::universe::Universe;
use spacetime_core::{
    ConnectionType, CorrelationId, Effect, EffectPayload, Event, EventPayload, ReadStyle,
};

/// Which module owns a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Connect,
    Listen,
}

#[derive(Debug, Clone)]
struct SocketProxy {
    universe: Universe,
    socket_id: CorrelationId,
    side: Side,
}

impl SocketProxy {
    async fn read(&self, style: ReadStyle) -> Result<Vec<u8>, UniverseError> {
        let payload = match self.side {
            Side::Connect => EffectPayload::ConnectRead {
                socket_id: self.socket_id,
                style,
            },
            Side::Listen => EffectPayload::ListenRead {
                socket_id: self.socket_id,
                style,
            },
        };
        let request = payload.kind();
        let event = self.universe.process_effect(Effect::new(payload)).await?;
        match event.into_parts() {
            (_, EventPayload::ReadSuccess { data, .. }) => Ok(data),
            (effect_id, other) => Err(self.bad_response(request, Event::from_parts(effect_id, other))),
        }
    }

    async fn write(&self, data: &[u8], length_prefix_bits: Option<u8>) -> Result<(), UniverseError> {
        let data = data.to_vec();
        let payload = match self.side {
            Side::Connect => EffectPayload::ConnectWrite {
                socket_id: self.socket_id,
                data,
                length_prefix_bits,
            },
            Side::Listen => EffectPayload::ListenWrite {
                socket_id: self.socket_id,
                data,
                length_prefix_bits,
            },
        };
        let request = payload.kind();
        let event = self.universe.process_effect(Effect::new(payload)).await?;
        match event.payload() {
            EventPayload::Affected => Ok(()),
            _ => Err(self.bad_response(request, event)),
        }
    }

    async fn close(&self) {
        let payload = match self.side {
            Side::Connect => EffectPayload::ConnectClose {
                socket_id: self.socket_id,
            },
            Side::Listen => EffectPayload::ListenClose {
                socket_id: self.socket_id,
            },
        };
        close_quietly(&self.universe, payload).await;
    }

    fn bad_response(&self, request: &'static str, event: Event) -> UniverseError {
        tracing::warn!(socket_id = %self.socket_id, request, response = %event, "unexpected response");
        UniverseError::bad_response(request, event)
    }
}

async fn close_quietly(universe: &Universe, payload: EffectPayload) {
    let effect = Effect::new(payload);
    match universe.process_effect(effect).await {
        Ok(event) if event.is_failure() => {
            tracing::debug!(event = %event, "close answered with failure");
        }
        Ok(_) => {}
        Err(error) => tracing::debug!(error = %error, "close not delivered"),
    }
}

/// Outbound connection opened through the network-connect module
#[derive(Debug, Clone)]
pub struct UniverseConnection {
    proxy: SocketProxy,
}

impl UniverseConnection {
    /// Proxy for an already-open connection
    pub fn from_id(universe: &Universe, socket_id: CorrelationId) -> Self {
        Self {
            proxy: SocketProxy {
                universe: universe.clone(),
                socket_id,
                side: Side::Connect,
            },
        }
    }

    /// Resource id of the socket
    pub fn id(&self) -> CorrelationId {
        self.proxy.socket_id
    }

    /// Read exactly `size` bytes
    ///
    /// Sizes above the transport's frame limit fail without reading.
    pub async fn read(&self, size: usize) -> Result<Vec<u8>, UniverseError> {
        self.proxy.read(ReadStyle::ExactSize(size)).await
    }

    /// Read exactly `size` bytes, allowing the transport's unchecked path
    pub async fn unsafe_read(&self, size: usize) -> Result<Vec<u8>, UniverseError> {
        self.proxy.read(ReadStyle::UnsafeExactSize(size)).await
    }

    /// Read between 1 and `max_size` bytes
    pub async fn read_max(&self, max_size: usize) -> Result<Vec<u8>, UniverseError> {
        self.proxy.read(ReadStyle::MaxSize(max_size)).await
    }

    /// Read one length-prefixed frame
    pub async fn read_with_length_prefix(&self, prefix_bits: u8) -> Result<Vec<u8>, UniverseError> {
        self.proxy
            .read(ReadStyle::LengthPrefixSizeInBits(prefix_bits))
            .await
    }

    /// Write all of `data`
    pub async fn write(&self, data: &[u8]) -> Result<(), UniverseError> {
        self.proxy.write(data, None).await
    }

    /// Write `data` as one length-prefixed frame
    pub async fn write_with_length_prefix(
        &self,
        data: &[u8],
        prefix_bits: u8,
    ) -> Result<(), UniverseError> {
        self.proxy.write(data, Some(prefix_bits)).await
    }

    /// Close the socket; never fails
    pub async fn close(&self) {
        self.proxy.close().await;
    }
}

/// Inbound connection accepted through the network-listen module
///
/// Same operations as [`UniverseConnection`]. Reads are bounded by the listen
/// module's read timeout; a read the peer does not answer in time fails with
/// [`UniverseError::BadResponse`].
#[derive(Debug, Clone)]
pub struct ListenConnection {
    proxy: SocketProxy,
}

impl ListenConnection {
    /// Proxy for an already-accepted connection
    pub fn from_id(universe: &Universe, socket_id: CorrelationId) -> Self {
        Self {
            proxy: SocketProxy {
                universe: universe.clone(),
                socket_id,
                side: Side::Listen,
            },
        }
    }

    /// Resource id of the socket
    pub fn id(&self) -> CorrelationId {
        self.proxy.socket_id
    }

    /// Read exactly `size` bytes
    pub async fn read(&self, size: usize) -> Result<Vec<u8>, UniverseError> {
        self.proxy.read(ReadStyle::ExactSize(size)).await
    }

    /// Read exactly `size` bytes, allowing the transport's unchecked path
    pub async fn unsafe_read(&self, size: usize) -> Result<Vec<u8>, UniverseError> {
        self.proxy.read(ReadStyle::UnsafeExactSize(size)).await
    }

    /// Read between 1 and `max_size` bytes
    pub async fn read_max(&self, max_size: usize) -> Result<Vec<u8>, UniverseError> {
        self.proxy.read(ReadStyle::MaxSize(max_size)).await
    }

    /// Read one length-prefixed frame
    pub async fn read_with_length_prefix(&self, prefix_bits: u8) -> Result<Vec<u8>, UniverseError> {
        self.proxy
            .read(ReadStyle::LengthPrefixSizeInBits(prefix_bits))
            .await
    }

    /// Write all of `data`
    pub async fn write(&self, data: &[u8]) -> Result<(), UniverseError> {
        self.proxy.write(data, None).await
    }

    /// Write `data` as one length-prefixed frame
    pub async fn write_with_length_prefix(
        &self,
        data: &[u8],
        prefix_bits: u8,
    ) -> Result<(), UniverseError> {
        self.proxy.write(data, Some(prefix_bits)).await
    }

    /// Close the socket; never fails
    pub async fn close(&self) {
        self.proxy.close().await;
    }
}

/// Listener bound through the network-listen module
#[derive(Debug, Clone)]
pub struct UniverseListener {
    universe: Universe,
    listener_id: CorrelationId,
}

impl UniverseListener {
    /// Bind a listener at `address:port`
    pub async fn bind(
        universe: &Universe,
        address: impl Into<String>,
        port: u16,
        kind: ConnectionType,
    ) -> Result<Self, UniverseError> {
        let effect = Effect::listen(address, port, kind);
        let event = universe.process_effect(effect).await?;
        match event.payload() {
            EventPayload::ListenSuccess { socket_id } => Ok(Self::from_id(universe, *socket_id)),
            _ => Err(UniverseError::bad_response("ListenRequest", event)),
        }
    }

    /// Proxy for an already-bound listener
    pub fn from_id(universe: &Universe, listener_id: CorrelationId) -> Self {
        Self {
            universe: universe.clone(),
            listener_id,
        }
    }

    /// Resource id of the listener
    pub fn id(&self) -> CorrelationId {
        self.listener_id
    }

    /// Wait for the next inbound connection
    pub async fn accept(&self) -> Result<ListenConnection, UniverseError> {
        let event = self
            .universe
            .process_effect(Effect::accept(self.listener_id))
            .await?;
        match event.payload() {
            EventPayload::AcceptSuccess { socket_id } => {
                Ok(ListenConnection::from_id(&self.universe, *socket_id))
            }
            _ => Err(UniverseError::bad_response("AcceptRequest", event)),
        }
    }

    /// Stop listening; never fails
    pub async fn close(&self) {
        close_quietly(
            &self.universe,
            EffectPayload::ListenClose {
                socket_id: self.listener_id,
            },
        )
        .await;
    }
}

impl Universe {
    /// Open an outbound connection
    pub async fn connect(
        &self,
        address: impl Into<String>,
        port: u16,
        kind: ConnectionType,
    ) -> Result<UniverseConnection, UniverseError> {
        let event = self.process_effect(Effect::connect(address, port, kind)).await?;
        match event.payload() {
            EventPayload::ConnectSuccess { socket_id } => {
                Ok(UniverseConnection::from_id(self, *socket_id))
            }
            _ => Err(UniverseError::bad_response("ConnectRequest", event)),
        }
    }

    /// Bind a listener
    pub async fn listen(
        &self,
        address: impl Into<String>,
        port: u16,
        kind: ConnectionType,
    ) -> Result<UniverseListener, UniverseError> {
        UniverseListener::bind(self, address, port, kind).await
    }

    /// Draw a uniformly distributed `u64`
    pub async fn random(&self) -> Result<u64, UniverseError> {
        let event = self.process_effect(Effect::random()).await?;
        match event.payload() {
            EventPayload::RandomSuccess { value } => Ok(*value),
            _ => Err(UniverseError::bad_response("RandomRequest", event)),
        }
    }
}
