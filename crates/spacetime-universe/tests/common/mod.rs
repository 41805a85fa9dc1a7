//! Universe wired to a simulation over the in-memory network

use spacetime_core::{effect_queue, event_queue, SimulationConfig, TracingLogSink};
use spacetime_simulation::{ModuleRegistry, NetworkConnectModule, NetworkListenModule, RandomModule, Simulation};
use spacetime_transport::MemoryNetwork;
use spacetime_universe::Universe;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A running universe plus handles for inspecting module state
pub struct Harness {
    pub universe: Universe,
    pub network: MemoryNetwork,
    pub connect: Arc<NetworkConnectModule>,
    pub listen: Arc<NetworkListenModule>,
}

pub fn harness(config: SimulationConfig) -> Harness {
    init_tracing();
    let network = MemoryNetwork::default();
    let provider = Arc::new(network.clone());
    let log = TracingLogSink::shared();
    let connect = Arc::new(NetworkConnectModule::new(provider.clone(), config.clone(), log.clone()));
    let listen = Arc::new(NetworkListenModule::new(provider, config, log));

    let mut registry = ModuleRegistry::new();
    registry.register(Arc::new(RandomModule::seeded(7))).unwrap();
    registry.register(connect.clone()).unwrap();
    registry.register(listen.clone()).unwrap();

    let (effects, effects_rx) = effect_queue();
    let (events, events_rx) = event_queue();
    Simulation::new(registry, events).spawn(effects_rx);
    Harness {
        universe: Universe::new(effects, events_rx),
        network,
        connect,
        listen,
    }
}
