//! Module contract
//!
//! A module owns one capability and the resources that capability creates.
//! The dispatcher hands it every effect addressed to its name.

use crate::effects::Effect;
use crate::events::Event;
use crate::identifiers::ModuleName;
use crate::queue::EventSender;

/// Capability-scoped effect handler
///
/// `handle_effect` is called from the dispatcher task and must not block.
/// Modules that do I/O spawn a tokio task and return `None`; that task later
/// enqueues exactly one event through `events`. Inline answers (unknown
/// resource, unsupported variant, pure computation) are returned as
/// `Some(event)` and the dispatcher enqueues them.
///
/// Unsupported variants must answer `Failure` keyed to the effect id.
pub trait Module: Send + Sync {
    /// Stable routing name
    fn name(&self) -> ModuleName;

    /// Answer or start answering one effect
    fn handle_effect(&self, effect: Effect, events: &EventSender) -> Option<Event>;

    /// Observe an event not produced for one of this module's effects
    fn handle_external_event(&self, _event: &Event) {}
}
