//! Effect and event queues
//!
//! Both queues are unbounded, multi-producer and single-consumer. The
//! outbound effect queue is drained by the simulation dispatcher; the inbound
//! event queue is drained by the bus dispatch loop.

use crate::effects::Effect;
use crate::events::Event;
use tokio::sync::mpsc;

/// Create the outbound effect queue
pub fn effect_queue() -> (EffectSender, EffectReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EffectSender { tx }, EffectReceiver { rx })
}

/// Create the inbound event queue
pub fn event_queue() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}

/// Producer side of the effect queue
#[derive(Debug, Clone)]
pub struct EffectSender {
    tx: mpsc::UnboundedSender<Effect>,
}

impl EffectSender {
    /// Enqueue an effect, handing it back if the consumer is gone
    pub fn send(&self, effect: Effect) -> Result<(), Effect> {
        self.tx.send(effect).map_err(|e| e.0)
    }

    /// Whether the consumer has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the effect queue
#[derive(Debug)]
pub struct EffectReceiver {
    rx: mpsc::UnboundedReceiver<Effect>,
}

impl EffectReceiver {
    /// Wait for the next effect; `None` once every sender is dropped
    pub async fn recv(&mut self) -> Option<Effect> {
        self.rx.recv().await
    }
}

/// Producer side of the event queue
///
/// Modules and their tasks hold clones of this to enqueue replies.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSender {
    /// Enqueue an event
    ///
    /// Returns `false` if the dispatch loop has shut down; the event is dropped.
    pub fn send(&self, event: Event) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                tracing::debug!(event = %event, "event queue closed, dropping event");
                false
            }
        }
    }

    /// Whether the consumer has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the event queue
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventReceiver {
    /// Wait for the next event; `None` once every sender is dropped
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}
