//! Event vocabulary
//!
//! An [`Event`] either answers one effect (`effect_id` set) or is
//! unsolicited (`effect_id` unset) and goes to the broadcast handler.

use crate::identifiers::CorrelationId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Response payloads produced by the built-in modules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    /// Outbound connection opened
    ConnectSuccess {
        /// New connection resource id
        socket_id: CorrelationId,
    },
    /// Listener bound
    ListenSuccess {
        /// New listener resource id
        socket_id: CorrelationId,
    },
    /// Inbound connection accepted
    AcceptSuccess {
        /// New accepted connection resource id
        socket_id: CorrelationId,
    },
    /// Bytes read from a connection
    ReadSuccess {
        /// Connection the bytes came from
        socket_id: CorrelationId,
        /// Bytes read
        data: Vec<u8>,
    },
    /// Generic acknowledgement (successful write)
    Affected,
    /// Resource closed
    Closed {
        /// Resource that was closed
        socket_id: CorrelationId,
    },
    /// Random value produced
    RandomSuccess {
        /// The value
        value: u64,
    },
    /// The request could not be completed
    Failure,
}

impl EventPayload {
    /// Short variant name, used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::ConnectSuccess { .. } => "ConnectResponse",
            EventPayload::ListenSuccess { .. } => "ListenResponse",
            EventPayload::AcceptSuccess { .. } => "AcceptResponse",
            EventPayload::ReadSuccess { .. } => "ReadResponse",
            EventPayload::Affected => "Affected",
            EventPayload::Closed { .. } => "CloseResponse",
            EventPayload::RandomSuccess { .. } => "RandomResponse",
            EventPayload::Failure => "Failure",
        }
    }
}

/// A response or unsolicited notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    effect_id: Option<CorrelationId>,
    payload: EventPayload,
}

impl Event {
    /// Reply to the effect with the given id
    pub fn reply(effect_id: CorrelationId, payload: EventPayload) -> Self {
        Self {
            effect_id: Some(effect_id),
            payload,
        }
    }

    /// Event not tied to any request
    pub fn unsolicited(payload: EventPayload) -> Self {
        Self {
            effect_id: None,
            payload,
        }
    }

    /// `Failure` keyed to the given request id
    pub fn failure(effect_id: CorrelationId) -> Self {
        Self::reply(effect_id, EventPayload::Failure)
    }

    /// Correlation id of the answered effect, if any
    pub fn effect_id(&self) -> Option<CorrelationId> {
        self.effect_id
    }

    /// Response payload
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Take the payload
    pub fn into_payload(self) -> EventPayload {
        self.payload
    }

    /// Split into correlation id and payload
    pub fn into_parts(self) -> (Option<CorrelationId>, EventPayload) {
        (self.effect_id, self.payload)
    }

    /// Rebuild an event from [`Event::into_parts`]
    pub fn from_parts(effect_id: Option<CorrelationId>, payload: EventPayload) -> Self {
        Self { effect_id, payload }
    }

    /// Whether this is a `Failure`
    pub fn is_failure(&self) -> bool {
        matches!(self.payload, EventPayload::Failure)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.effect_id {
            Some(id) => write!(f, "{}[effectId: {}]", self.payload.kind(), id),
            None => write!(f, "{}[unsolicited]", self.payload.kind()),
        }
    }
}
