//! Spacetime Transport - Network Backends
//!
//! Implementations of the `spacetime-core` transport traits:
//!
//! - [`TokioNetworkProvider`]: real sockets (TCP connect/listen, UDP connect)
//! - [`MemoryNetwork`]: in-process, deterministic network for simulation and
//!   tests, built on `tokio::io::duplex`
//!
//! Both hand out [`StreamConnection`]s for stream transports, so read-style
//! semantics are identical whichever backend is chosen.

#![forbid(unsafe_code)]

pub mod config;
pub mod memory;
pub mod stream;
pub mod tcp;
pub mod udp;

pub use config::TransportConfig;
pub use memory::{MemoryConnection, MemoryListener, MemoryNetwork};
pub use stream::StreamConnection;
pub use tcp::{TcpConnection, TcpListenerHandle, TokioNetworkProvider};
pub use udp::UdpConnection;

/// Resolve once the watched close flag is set or its sender is dropped
pub(crate) async fn wait_closed(closed: &mut tokio::sync::watch::Receiver<bool>) {
    loop {
        let is_closed = *closed.borrow_and_update();
        if is_closed || closed.changed().await.is_err() {
            return;
        }
    }
}
