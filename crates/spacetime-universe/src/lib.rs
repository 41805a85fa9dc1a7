//! Spacetime Universe - Correlation Bus
//!
//! Caller side of the effect/event runtime. Application code submits effects
//! through a [`Universe`] and awaits the correlated reply, either directly
//! with [`Universe::process_effect`] or through the proxies:
//!
//! - [`Universe::connect`] / [`UniverseConnection`]
//! - [`Universe::listen`] / [`UniverseListener`] / [`ListenConnection`]
//! - [`Universe::random`]
//!
//! Whatever drains the effect queue (usually `spacetime_simulation::Simulation`)
//! decides whether the effects hit a real network or a simulated one.

#![forbid(unsafe_code)]

pub mod error;
pub mod proxy;
pub mod universe;

pub use error::UniverseError;
pub use proxy::{ListenConnection, UniverseConnection, UniverseListener};
pub use universe::{Application, IgnoreUnsolicited, UnsolicitedEventHandler, Universe};
