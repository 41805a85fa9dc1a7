//! Caller-side errors

use spacetime_core::{CorrelationId, Event};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to callers of the bus and its proxies
#[derive(Debug, Error)]
pub enum UniverseError {
    /// The effect queue or the dispatch loop has shut down
    #[error("Universe is shut down")]
    Closed,

    /// No reply arrived within the caller's own deadline
    #[error("Effect {effect_id} got no reply within {timeout:?}")]
    Timeout {
        /// Effect that went unanswered
        effect_id: CorrelationId,
        /// Deadline the caller chose
        timeout: Duration,
    },

    /// The reply was a failure or a different event kind than the request expects
    #[error("Unexpected response to {request}: {response}")]
    BadResponse {
        /// Request kind
        request: &'static str,
        /// Event that came back
        response: Box<Event>,
    },
}

impl UniverseError {
    pub(crate) fn bad_response(request: &'static str, response: Event) -> Self {
        Self::BadResponse {
            request,
            response: Box::new(response),
        }
    }
}
