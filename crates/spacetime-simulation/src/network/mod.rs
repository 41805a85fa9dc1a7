//! Network modules and the resources they own

pub mod connect;
pub mod connection;
pub mod listen;
pub mod listener;

pub use connect::NetworkConnectModule;
pub use connection::SimulationConnection;
pub use listen::NetworkListenModule;
pub use listener::SimulationListener;
