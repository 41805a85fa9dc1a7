//! Spacetime Simulation - Effect Modules
//!
//! Capability modules that answer effects, and the dispatcher that routes
//! effects to them:
//!
//! - [`RandomModule`]: pure computation, answered inline
//! - [`NetworkConnectModule`]: outbound connections
//! - [`NetworkListenModule`]: listeners, accepted connections, bounded-wait
//!   reads
//! - [`Simulation`]: drains the effect queue and routes by module name
//!
//! Network modules never block the dispatcher. Every I/O operation runs on
//! its own tokio task, tracked in a pending-operation table on the resource
//! it targets, and enqueues exactly one terminal event.

#![forbid(unsafe_code)]

pub mod network;
pub mod random;
pub mod registry;
pub mod resources;
pub mod simulation;

pub use network::{
    NetworkConnectModule, NetworkListenModule, SimulationConnection, SimulationListener,
};
pub use random::RandomModule;
pub use registry::{ModuleRegistry, RegistryError};
pub use resources::{PendingOperations, ResourceTable};
pub use simulation::Simulation;
