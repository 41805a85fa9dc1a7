//! Effect dispatcher
//!
//! Drains the outbound effect queue and routes each effect to the module
//! registered under its target name. Inline answers are enqueued on the
//! event queue immediately; modules that go asynchronous enqueue their own
//! event later.

use crate::registry::{ModuleRegistry, RegistryError};
use spacetime_core::{
    Effect, EffectReceiver, Event, EventSender, Module, NetworkProvider, SharedLogSink,
    SimulationConfig,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Routes effects to modules
#[derive(Debug, Clone)]
pub struct Simulation {
    registry: ModuleRegistry,
    events: EventSender,
}

impl Simulation {
    /// Dispatcher over `registry`, answering on `events`
    pub fn new(registry: ModuleRegistry, events: EventSender) -> Self {
        Self { registry, events }
    }

    /// Dispatcher over the built-in modules
    pub fn with_builtin_modules(
        provider: Arc<dyn NetworkProvider>,
        config: SimulationConfig,
        log: SharedLogSink,
        events: EventSender,
    ) -> Self {
        Self::new(ModuleRegistry::builtin(provider, config, log), events)
    }

    /// Add a module
    pub fn register(&mut self, module: Arc<dyn Module>) -> Result<(), RegistryError> {
        self.registry.register(module)
    }

    /// Registered modules
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Route one effect
    ///
    /// An effect addressed to an unregistered module is answered with
    /// `Failure` so the caller never waits forever.
    pub fn dispatch(&self, effect: Effect) {
        let Some(module) = self.registry.get(effect.module()) else {
            tracing::warn!(effect = %effect, "no module registered for effect");
            self.events.send(Event::failure(effect.id()));
            return;
        };
        tracing::trace!(effect = %effect, "dispatching effect");
        if let Some(event) = module.handle_effect(effect, &self.events) {
            self.events.send(event);
        }
    }

    /// Hand an event that answers no effect to every module
    pub fn broadcast_external(&self, event: &Event) {
        for module in self.registry.modules() {
            module.handle_external_event(event);
        }
    }

    /// Dispatch effects until every sender is dropped
    pub async fn run(self, mut effects: EffectReceiver) {
        tracing::debug!(modules = ?self.registry.names(), "simulation dispatcher started");
        while let Some(effect) = effects.recv().await {
            self.dispatch(effect);
        }
        tracing::debug!("effect queue closed, simulation dispatcher stopping");
    }

    /// Run the dispatcher on its own task
    pub fn spawn(self, effects: EffectReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(effects))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use spacetime_core::{
        effect_queue, event_queue, EffectPayload, EventPayload, ModuleName, TracingLogSink,
    };
    use spacetime_transport::MemoryNetwork;

    fn builtin(events: EventSender) -> Simulation {
        Simulation::with_builtin_modules(
            Arc::new(MemoryNetwork::default()),
            SimulationConfig::default(),
            TracingLogSink::shared(),
            events,
        )
    }

    #[tokio::test]
    async fn unknown_module_fails_the_effect() {
        let (events, mut rx) = event_queue();
        let simulation = builtin(events);
        let effect = Effect::addressed(ModuleName::new("clock"), EffectPayload::Random);

        simulation.dispatch(effect.clone());
        assert_eq!(rx.recv().await.unwrap(), Event::failure(effect.id()));
    }

    #[tokio::test]
    async fn inline_answers_are_enqueued() {
        let (events, mut rx) = event_queue();
        let simulation = builtin(events);
        let effect = Effect::random();

        simulation.dispatch(effect.clone());
        let event = rx.recv().await.unwrap();
        assert_eq!(event.effect_id(), Some(effect.id()));
        assert_matches!(event.payload(), EventPayload::RandomSuccess { .. });
    }

    #[tokio::test]
    async fn run_drains_the_queue_until_senders_drop() {
        let (events, mut rx) = event_queue();
        let (effects_tx, effects_rx) = effect_queue();
        let task = builtin(events).spawn(effects_rx);

        let ids: Vec<_> = (0..3)
            .map(|_| {
                let effect = Effect::random();
                let id = effect.id();
                effects_tx.send(effect).unwrap();
                id
            })
            .collect();
        for id in ids {
            assert_eq!(rx.recv().await.unwrap().effect_id(), Some(id));
        }

        drop(effects_tx);
        task.await.unwrap();
    }

    #[derive(Debug, Default)]
    struct Recorder {
        seen: Mutex<Vec<Event>>,
    }

    impl Module for Recorder {
        fn name(&self) -> ModuleName {
            ModuleName::new("recorder")
        }

        fn handle_effect(&self, effect: Effect, _events: &EventSender) -> Option<Event> {
            Some(Event::failure(effect.id()))
        }

        fn handle_external_event(&self, event: &Event) {
            self.seen.lock().push(event.clone());
        }
    }

    #[tokio::test]
    async fn external_events_reach_every_module() {
        let (events, _rx) = event_queue();
        let mut simulation = builtin(events);
        let recorder = Arc::new(Recorder::default());
        simulation.register(recorder.clone()).unwrap();

        let event = Event::unsolicited(EventPayload::Affected);
        simulation.broadcast_external(&event);
        assert_eq!(*recorder.seen.lock(), vec![event]);
    }
}
