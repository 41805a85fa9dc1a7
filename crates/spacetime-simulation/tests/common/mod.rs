//! Shared helpers for simulation integration tests

use spacetime_core::{
    effect_queue, event_queue, EffectSender, EventReceiver, NetworkProvider, SharedLogSink,
    SimulationConfig,
};
use spacetime_simulation::Simulation;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Start a dispatcher over the built-in modules
pub fn start(
    provider: Arc<dyn NetworkProvider>,
    config: SimulationConfig,
    log: SharedLogSink,
) -> (EffectSender, EventReceiver) {
    init_tracing();
    let (effects, effects_rx) = effect_queue();
    let (events, events_rx) = event_queue();
    Simulation::with_builtin_modules(provider, config, log, events).spawn(effects_rx);
    (effects, events_rx)
}
