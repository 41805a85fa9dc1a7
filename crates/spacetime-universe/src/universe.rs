//! Correlation bus
//!
//! [`Universe`] turns queue-mediated effect/event traffic into a call that
//! waits for its own reply. Each call registers a one-shot channel under the
//! effect's id before the effect is enqueued; a single dispatch loop drains
//! the event queue and delivers each reply to the channel registered for it.
//!
//! Replies for ids nobody is waiting on (a duplicate, or a read that lost its
//! race against the listener timeout) are logged and dropped. Events without
//! an effect id go to the [`UnsolicitedEventHandler`].

use crate::error::UniverseError;
use async_trait::async_trait;
use parking_lot::Mutex;
use spacetime_core::{CorrelationId, Effect, EffectSender, Event, EventReceiver};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

type Channels = Arc<Mutex<HashMap<CorrelationId, oneshot::Sender<Event>>>>;

/// Receives events that answer no effect
pub trait UnsolicitedEventHandler: Send + Sync {
    /// Handle one unsolicited event
    fn handle_event(&self, _event: Event) {}
}

/// Handler that discards unsolicited events
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreUnsolicited;

impl UnsolicitedEventHandler for IgnoreUnsolicited {}

/// Program run against a [`Universe`]
#[async_trait]
pub trait Application: Send + Sync {
    /// Entry point
    async fn main(&self, universe: &Universe) -> Result<(), UniverseError>;
}

struct Inner {
    effects: EffectSender,
    channels: Channels,
    dispatch: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.dispatch.abort();
    }
}

/// Handle to the correlation bus; clones share one dispatch loop
#[derive(Clone)]
pub struct Universe {
    inner: Arc<Inner>,
}

impl fmt::Debug for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Universe")
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

/// Removes a registered channel if the waiting call goes away first
struct PendingReply {
    id: CorrelationId,
    channels: Channels,
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.channels.lock().remove(&self.id);
    }
}

impl Universe {
    /// Start a bus over the given queues; must be called inside a tokio runtime
    pub fn new(effects: EffectSender, events: EventReceiver) -> Self {
        Self::with_handler(effects, events, Arc::new(IgnoreUnsolicited))
    }

    /// Start a bus that hands unsolicited events to `handler`
    pub fn with_handler(
        effects: EffectSender,
        events: EventReceiver,
        handler: Arc<dyn UnsolicitedEventHandler>,
    ) -> Self {
        let channels: Channels = Arc::default();
        let dispatch = tokio::spawn(distribute_events(
            events,
            Arc::clone(&channels),
            handler,
        ));
        Self {
            inner: Arc::new(Inner {
                effects,
                channels,
                dispatch,
            }),
        }
    }

    /// Number of calls waiting for a reply
    pub fn pending_count(&self) -> usize {
        self.inner.channels.lock().len()
    }

    fn register(&self, effect: Effect) -> Result<(PendingReply, oneshot::Receiver<Event>), UniverseError> {
        let id = effect.id();
        let (tx, rx) = oneshot::channel();
        self.inner.channels.lock().insert(id, tx);
        let pending = PendingReply {
            id,
            channels: Arc::clone(&self.inner.channels),
        };
        self.inner.effects.send(effect).map_err(|effect| {
            tracing::debug!(effect = %effect, "effect queue closed");
            UniverseError::Closed
        })?;
        Ok((pending, rx))
    }

    /// Submit an effect and wait for the event that answers it
    ///
    /// Waits as long as it takes; use [`Universe::process_effect_with_timeout`]
    /// to bound the wait.
    pub async fn process_effect(&self, effect: Effect) -> Result<Event, UniverseError> {
        let (_pending, reply) = self.register(effect)?;
        reply.await.map_err(|_| UniverseError::Closed)
    }

    /// Like [`Universe::process_effect`], giving up after `timeout`
    ///
    /// A reply that arrives after the deadline is dropped by the dispatch loop.
    pub async fn process_effect_with_timeout(
        &self,
        effect: Effect,
        timeout: Duration,
    ) -> Result<Event, UniverseError> {
        let effect_id = effect.id();
        tokio::time::timeout(timeout, self.process_effect(effect))
            .await
            .map_err(|_| UniverseError::Timeout { effect_id, timeout })?
    }

    /// Submit an effect and block the current thread until it is answered
    ///
    /// For synchronous callers on threads that are not runtime workers, such
    /// as `spawn_blocking` tasks. Calling this from async code panics.
    pub fn process_effect_blocking(&self, effect: Effect) -> Result<Event, UniverseError> {
        let (_pending, reply) = self.register(effect)?;
        reply.blocking_recv().map_err(|_| UniverseError::Closed)
    }

    /// Run an application against this bus
    pub async fn run<A>(&self, app: &A) -> Result<(), UniverseError>
    where
        A: Application + ?Sized,
    {
        tracing::info!("universe application starting");
        let result = app.main(self).await;
        match &result {
            Ok(()) => tracing::info!("universe application finished"),
            Err(error) => tracing::error!(error = %error, "universe application failed"),
        }
        result
    }
}

async fn distribute_events(
    mut events: EventReceiver,
    channels: Channels,
    handler: Arc<dyn UnsolicitedEventHandler>,
) {
    while let Some(event) = events.recv().await {
        let Some(effect_id) = event.effect_id() else {
            handler.handle_event(event);
            continue;
        };
        let channel = channels.lock().remove(&effect_id);
        match channel {
            Some(channel) => {
                if channel.send(event).is_err() {
                    tracing::debug!(effect_id = %effect_id, "caller stopped waiting before reply");
                }
            }
            None => {
                tracing::warn!(effect_id = %effect_id, event = %event, "unknown correlation id, dropping event");
            }
        }
    }
    tracing::debug!("event queue closed, releasing waiting callers");
    channels.lock().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use spacetime_core::{effect_queue, event_queue, EffectReceiver, EventPayload, EventSender};

    fn bus() -> (Universe, EffectReceiver, EventSender) {
        let (effects, effects_rx) = effect_queue();
        let (events, events_rx) = event_queue();
        (Universe::new(effects, events_rx), effects_rx, events)
    }

    #[tokio::test]
    async fn reply_reaches_the_caller_that_asked() {
        let (universe, mut effects, events) = bus();
        let responder = tokio::spawn(async move {
            let effect = effects.recv().await.unwrap();
            events.send(Event::reply(effect.id(), EventPayload::RandomSuccess { value: 9 }));
            (effects, events)
        });

        let effect = Effect::random();
        let event = universe.process_effect(effect.clone()).await.unwrap();
        assert_eq!(event.effect_id(), Some(effect.id()));
        assert_eq!(event.payload(), &EventPayload::RandomSuccess { value: 9 });
        assert_eq!(universe.pending_count(), 0);
        drop(responder.await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_replies_are_delivered_once() {
        let (universe, mut effects, events) = bus();
        let responder = tokio::spawn(async move {
            let effect = effects.recv().await.unwrap();
            events.send(Event::reply(effect.id(), EventPayload::Affected));
            events.send(Event::failure(effect.id()));
            let next = effects.recv().await.unwrap();
            events.send(Event::reply(next.id(), EventPayload::Affected));
            (effects, events)
        });

        let first = universe.process_effect(Effect::random()).await.unwrap();
        assert_eq!(first.payload(), &EventPayload::Affected);
        let second = universe.process_effect(Effect::random()).await.unwrap();
        assert_eq!(second.payload(), &EventPayload::Affected);
        drop(responder.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn caller_timeout_cleans_up_its_channel() {
        let (universe, _effects, _events) = bus();
        let effect = Effect::random();
        let id = effect.id();
        assert_matches!(
            universe
                .process_effect_with_timeout(effect, Duration::from_secs(1))
                .await,
            Err(UniverseError::Timeout { effect_id, .. }) if effect_id == id
        );
        assert_eq!(universe.pending_count(), 0);
    }

    #[tokio::test]
    async fn closed_effect_queue_fails_fast() {
        let (universe, effects, _events) = bus();
        drop(effects);
        assert_matches!(
            universe.process_effect(Effect::random()).await,
            Err(UniverseError::Closed)
        );
        assert_eq!(universe.pending_count(), 0);
    }

    #[tokio::test]
    async fn closed_event_queue_releases_waiters() {
        let (universe, mut effects, events) = bus();
        let waiter = {
            let universe = universe.clone();
            tokio::spawn(async move { universe.process_effect(Effect::random()).await })
        };
        effects.recv().await.unwrap();
        drop(events);
        assert_matches!(waiter.await.unwrap(), Err(UniverseError::Closed));
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<Event>>);

    impl UnsolicitedEventHandler for Collect {
        fn handle_event(&self, event: Event) {
            self.0.lock().push(event);
        }
    }

    #[tokio::test]
    async fn unsolicited_events_go_to_the_handler() {
        let (effects, _effects_rx) = effect_queue();
        let (events, events_rx) = event_queue();
        let handler = Arc::new(Collect::default());
        let _universe = Universe::with_handler(effects, events_rx, handler.clone());

        let event = Event::unsolicited(EventPayload::Closed {
            socket_id: CorrelationId::new(),
        });
        events.send(event.clone());
        drop(events);
        for _ in 0..100 {
            if !handler.0.lock().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(*handler.0.lock(), vec![event]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_callers_get_their_reply() {
        let (universe, mut effects, events) = bus();
        tokio::spawn(async move {
            while let Some(effect) = effects.recv().await {
                events.send(Event::reply(effect.id(), EventPayload::Affected));
            }
        });
        let event = tokio::task::spawn_blocking(move || universe.process_effect_blocking(Effect::random()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.payload(), &EventPayload::Affected);
    }
}
