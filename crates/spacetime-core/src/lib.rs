//! Spacetime Core - Effect/Event Vocabulary
//!
//! This crate defines the message vocabulary and the seams of the Spacetime
//! runtime. It contains no executors and no real I/O; those live in
//! `spacetime-transport`, `spacetime-simulation` and `spacetime-universe`.
//!
//! # Contents
//!
//! - [`Effect`] / [`Event`]: closed tagged variants exchanged between callers
//!   and modules, correlated by [`CorrelationId`]
//! - [`Module`]: capability-scoped effect handler contract
//! - [`transport`]: `Connection`, `Listener` and `NetworkProvider` traits the
//!   simulation modules drive
//! - [`framing`]: length-prefix framing shared by every transport
//! - [`config`]: TOML/env configuration
//! - [`observability`]: injectable log sink

#![forbid(unsafe_code)]

/// Correlation and module identifiers
pub mod identifiers;

/// Effects (requests) and their payload variants
pub mod effects;

/// Events (responses) and unsolicited notifications
pub mod events;

/// Outbound effect and inbound event queues
pub mod queue;

/// Module contract
pub mod module;

/// Transport boundary consumed by the simulation modules
pub mod transport;

/// Length-prefix framing
pub mod framing;

/// Runtime configuration
pub mod config;

/// Injectable logging collaborator
pub mod observability;

pub use config::{ConfigError, SimulationConfig};
pub use effects::{ConnectionType, Effect, EffectPayload, ReadStyle};
pub use events::{Event, EventPayload};
pub use framing::FramingError;
pub use identifiers::{CorrelationId, ModuleName};
pub use module::Module;
pub use queue::{effect_queue, event_queue, EffectReceiver, EffectSender, EventReceiver, EventSender};
pub use observability::{LogLevel, LogRecord, LogSink, MemoryLogSink, SharedLogSink, TracingLogSink};
pub use transport::{Connection, Listener, NetworkProvider, TransportError, TransportResult};
