//! Resource and pending-operation tables
//!
//! A [`ResourceTable`] is a module's arena of live resources keyed by the id
//! handed back to the caller. A [`PendingOperations`] table tracks in-flight
//! operations on one resource, keyed by an operation-local id and mapping to
//! the request id the operation answers.

use parking_lot::Mutex;
use spacetime_core::{CorrelationId, Event, EventSender, LogLevel, SharedLogSink};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Live resources owned by one module
#[derive(Debug)]
pub struct ResourceTable<T> {
    entries: Arc<Mutex<HashMap<CorrelationId, Arc<T>>>>,
}

impl<T> Clone for ResourceTable<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T> Default for ResourceTable<T> {
    fn default() -> Self {
        Self {
            entries: Arc::default(),
        }
    }
}

impl<T> ResourceTable<T> {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource under its id
    pub fn insert(&self, id: CorrelationId, resource: Arc<T>) {
        self.entries.lock().insert(id, resource);
    }

    /// Look up a resource
    pub fn get(&self, id: &CorrelationId) -> Option<Arc<T>> {
        self.entries.lock().get(id).cloned()
    }

    /// Deregister a resource
    pub fn remove(&self, id: &CorrelationId) -> Option<Arc<T>> {
        self.entries.lock().remove(id)
    }

    /// Whether the id names a live resource
    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Number of live resources
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// In-flight operations on one resource
#[derive(Debug, Clone, Default)]
pub struct PendingOperations {
    operations: Arc<Mutex<HashMap<CorrelationId, CorrelationId>>>,
}

impl PendingOperations {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a started operation; returns its operation id
    pub fn start(&self, request_id: CorrelationId) -> CorrelationId {
        let operation_id = CorrelationId::new();
        self.operations.lock().insert(operation_id, request_id);
        operation_id
    }

    /// Forget a finished operation
    pub fn finish(&self, operation_id: &CorrelationId) {
        self.operations.lock().remove(operation_id);
    }

    /// Forget every operation
    pub fn clear(&self) {
        self.operations.lock().clear();
    }

    /// Number of in-flight operations
    pub fn len(&self) -> usize {
        self.operations.lock().len()
    }

    /// Whether nothing is in flight
    pub fn is_empty(&self) -> bool {
        self.operations.lock().is_empty()
    }

    /// Request ids of the in-flight operations
    pub fn request_ids(&self) -> Vec<CorrelationId> {
        self.operations.lock().values().copied().collect()
    }

    /// Run `operation` on its own task, tracked in this table
    ///
    /// Exactly one event answers `request_id`: the operation's own, or
    /// `Failure` if its task panics. The entry is gone before the event is
    /// sent.
    pub fn spawn<F>(
        &self,
        request_id: CorrelationId,
        resource_id: CorrelationId,
        log: &SharedLogSink,
        events: EventSender,
        operation: F,
    ) -> JoinHandle<()>
    where
        F: Future<Output = Event> + Send + 'static,
    {
        let operation_id = self.start(request_id);
        let pending = self.clone();
        let log = Arc::clone(log);
        let task = tokio::spawn(operation);
        tokio::spawn(async move {
            let event = match task.await {
                Ok(event) => event,
                Err(join_error) => {
                    log.log(
                        LogLevel::Error,
                        &format!("operation for {request_id} on {resource_id} died: {join_error}"),
                    );
                    Event::failure(request_id)
                }
            };
            pending.finish(&operation_id);
            events.send(event);
        })
    }
}
