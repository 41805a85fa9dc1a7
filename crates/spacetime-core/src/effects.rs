//! Effect vocabulary
//!
//! An [`Effect`] is a request addressed to one module. It is immutable once
//! built and consumed exactly once by the module it is routed to.

use crate::identifiers::{CorrelationId, ModuleName};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport kind requested by `connect`/`listen`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    /// Stream transport
    #[default]
    Tcp,
    /// Datagram transport
    Udp,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionType::Tcp => f.write_str("tcp"),
            ConnectionType::Udp => f.write_str("udp"),
        }
    }
}

/// How a read request consumes bytes from the transport
///
/// Each style is a distinct contract against the underlying connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadStyle {
    /// Block until exactly `n` bytes are available, or fail
    ExactSize(usize),
    /// Like `ExactSize`, but the transport may take an unchecked fast path
    UnsafeExactSize(usize),
    /// Return between 1 and `n` bytes, whatever is currently available
    MaxSize(usize),
    /// Read a length prefix of the given width in bits, then that many bytes
    LengthPrefixSizeInBits(u8),
}

impl fmt::Display for ReadStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadStyle::ExactSize(size) => write!(f, "exactSize({size})"),
            ReadStyle::UnsafeExactSize(size) => write!(f, "unsafeExactSize({size})"),
            ReadStyle::MaxSize(size) => write!(f, "maxSize({size})"),
            ReadStyle::LengthPrefixSizeInBits(bits) => write!(f, "lengthPrefixSizeInBits({bits})"),
        }
    }
}

/// Request payloads understood by the built-in modules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectPayload {
    /// Open an outbound connection
    Connect {
        /// Host name or IP address
        address: String,
        /// Remote port
        port: u16,
        /// Transport kind
        kind: ConnectionType,
    },
    /// Read from an outbound connection
    ConnectRead {
        /// Connection resource id
        socket_id: CorrelationId,
        /// Read contract
        style: ReadStyle,
    },
    /// Write to an outbound connection
    ConnectWrite {
        /// Connection resource id
        socket_id: CorrelationId,
        /// Bytes to send
        data: Vec<u8>,
        /// Frame the write with a length prefix of this many bits
        length_prefix_bits: Option<u8>,
    },
    /// Close an outbound connection
    ConnectClose {
        /// Connection resource id
        socket_id: CorrelationId,
    },
    /// Bind a listener
    Listen {
        /// Bind address
        address: String,
        /// Bind port
        port: u16,
        /// Transport kind
        kind: ConnectionType,
    },
    /// Accept one inbound connection on a listener
    Accept {
        /// Listener resource id
        listener_id: CorrelationId,
    },
    /// Read from an accepted connection (bounded wait)
    ListenRead {
        /// Accepted connection resource id
        socket_id: CorrelationId,
        /// Read contract
        style: ReadStyle,
    },
    /// Write to an accepted connection
    ListenWrite {
        /// Accepted connection resource id
        socket_id: CorrelationId,
        /// Bytes to send
        data: Vec<u8>,
        /// Frame the write with a length prefix of this many bits
        length_prefix_bits: Option<u8>,
    },
    /// Close an accepted connection or a listener
    ListenClose {
        /// Accepted connection or listener resource id
        socket_id: CorrelationId,
    },
    /// Produce a uniformly distributed `u64`
    Random,
}

impl EffectPayload {
    /// Module that owns this payload variant
    pub fn module(&self) -> ModuleName {
        match self {
            EffectPayload::Connect { .. }
            | EffectPayload::ConnectRead { .. }
            | EffectPayload::ConnectWrite { .. }
            | EffectPayload::ConnectClose { .. } => ModuleName::NETWORK_CONNECT,
            EffectPayload::Listen { .. }
            | EffectPayload::Accept { .. }
            | EffectPayload::ListenRead { .. }
            | EffectPayload::ListenWrite { .. }
            | EffectPayload::ListenClose { .. } => ModuleName::NETWORK_LISTEN,
            EffectPayload::Random => ModuleName::RANDOM,
        }
    }

    /// Short variant name, used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            EffectPayload::Connect { .. } => "ConnectRequest",
            EffectPayload::ConnectRead { .. } => "ConnectReadRequest",
            EffectPayload::ConnectWrite { .. } => "ConnectWriteRequest",
            EffectPayload::ConnectClose { .. } => "ConnectCloseRequest",
            EffectPayload::Listen { .. } => "ListenRequest",
            EffectPayload::Accept { .. } => "AcceptRequest",
            EffectPayload::ListenRead { .. } => "ListenReadRequest",
            EffectPayload::ListenWrite { .. } => "ListenWriteRequest",
            EffectPayload::ListenClose { .. } => "ListenCloseRequest",
            EffectPayload::Random => "RandomRequest",
        }
    }
}

/// A request addressed to one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    id: CorrelationId,
    module: ModuleName,
    payload: EffectPayload,
}

impl Effect {
    /// Build an effect routed to the payload's owning module
    pub fn new(payload: EffectPayload) -> Self {
        Self {
            id: CorrelationId::new(),
            module: payload.module(),
            payload,
        }
    }

    /// Build an effect routed to an explicit module
    ///
    /// Used by custom modules and to exercise unsupported-variant handling.
    pub fn addressed(module: ModuleName, payload: EffectPayload) -> Self {
        Self {
            id: CorrelationId::new(),
            module,
            payload,
        }
    }

    /// Outbound connection request
    pub fn connect(address: impl Into<String>, port: u16, kind: ConnectionType) -> Self {
        Self::new(EffectPayload::Connect {
            address: address.into(),
            port,
            kind,
        })
    }

    /// Listener bind request
    pub fn listen(address: impl Into<String>, port: u16, kind: ConnectionType) -> Self {
        Self::new(EffectPayload::Listen {
            address: address.into(),
            port,
            kind,
        })
    }

    /// Accept request on a listener
    pub fn accept(listener_id: CorrelationId) -> Self {
        Self::new(EffectPayload::Accept { listener_id })
    }

    /// Random value request
    pub fn random() -> Self {
        Self::new(EffectPayload::Random)
    }

    /// Correlation id of this request
    pub fn id(&self) -> CorrelationId {
        self.id
    }

    /// Module this effect is routed to
    pub fn module(&self) -> &ModuleName {
        &self.module
    }

    /// Request payload
    pub fn payload(&self) -> &EffectPayload {
        &self.payload
    }

    /// Split into id and payload
    pub fn into_parts(self) -> (CorrelationId, EffectPayload) {
        (self.id, self.payload)
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}[id: {}]", self.module, self.payload.kind(), self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_routes_to_owning_module() {
        assert_eq!(Effect::random().module(), &ModuleName::RANDOM);
        assert_eq!(
            Effect::connect("127.0.0.1", 80, ConnectionType::Tcp).module(),
            &ModuleName::NETWORK_CONNECT
        );
        assert_eq!(
            Effect::accept(CorrelationId::new()).module(),
            &ModuleName::NETWORK_LISTEN
        );
    }

    #[test]
    fn addressed_effect_keeps_explicit_module() {
        let effect = Effect::addressed(ModuleName::NETWORK_CONNECT, EffectPayload::Random);
        assert_eq!(effect.module(), &ModuleName::NETWORK_CONNECT);
        assert_eq!(effect.payload(), &EffectPayload::Random);
    }

    #[test]
    fn every_effect_gets_a_fresh_id() {
        assert_ne!(Effect::random().id(), Effect::random().id());
    }

    #[test]
    fn display_names_module_and_variant() {
        let effect = Effect::random();
        assert_eq!(
            effect.to_string(),
            format!("random.RandomRequest[id: {}]", effect.id())
        );
    }

    #[test]
    fn effects_carry_their_id_through_json() {
        let effect = Effect::new(EffectPayload::ListenRead {
            socket_id: CorrelationId::new(),
            style: ReadStyle::LengthPrefixSizeInBits(32),
        });
        let json = serde_json::to_value(&effect).unwrap();
        assert_eq!(json["module"], "networkListen");
        let back: Effect = serde_json::from_value(json).unwrap();
        assert_eq!(back, effect);
        assert_eq!(
            serde_json::to_value(ConnectionType::Udp).unwrap(),
            serde_json::json!("udp")
        );
    }
}
