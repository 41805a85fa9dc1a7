//! Simulated listener resource

use crate::network::connection::SimulationConnection;
use crate::resources::{PendingOperations, ResourceTable};
use spacetime_core::{
    CorrelationId, Event, EventPayload, EventSender, Listener, LogLevel, SharedLogSink,
};
use std::fmt;
use std::sync::Arc;

/// One bound listener owned by the listen module
pub struct SimulationListener {
    id: CorrelationId,
    listener: Arc<dyn Listener>,
    log: SharedLogSink,
    accepts: PendingOperations,
}

impl SimulationListener {
    /// Wrap a transport listener under the resource id `id`
    pub fn new(id: CorrelationId, listener: Arc<dyn Listener>, log: SharedLogSink) -> Self {
        Self {
            id,
            listener,
            log,
            accepts: PendingOperations::new(),
        }
    }

    /// Resource id handed back to callers
    pub fn id(&self) -> CorrelationId {
        self.id
    }

    /// Accepts in flight
    pub fn pending_accepts(&self) -> usize {
        self.accepts.len()
    }

    /// Accept one connection, registering it in `connections`
    ///
    /// Answers `AcceptSuccess` with the new connection's resource id.
    pub fn accept(
        self: &Arc<Self>,
        request_id: CorrelationId,
        connections: &ResourceTable<SimulationConnection>,
        events: &EventSender,
    ) {
        let this = Arc::clone(self);
        let connections = connections.clone();
        self.accepts.spawn(request_id, self.id, &self.log, events.clone(), async move {
            match this.listener.accept().await {
                Ok(connection) => {
                    let socket_id = CorrelationId::new();
                    connections.insert(
                        socket_id,
                        Arc::new(SimulationConnection::new(
                            socket_id,
                            connection,
                            Arc::clone(&this.log),
                        )),
                    );
                    this.log.log(
                        LogLevel::Debug,
                        &format!("listener {} accepted {socket_id}", this.id),
                    );
                    Event::reply(request_id, EventPayload::AcceptSuccess { socket_id })
                }
                Err(error) => {
                    this.log.log(
                        LogLevel::Error,
                        &format!("accept on listener {} failed: {error}", this.id),
                    );
                    Event::failure(request_id)
                }
            }
        });
    }

    /// Stop listening, answering `request_id` with `Closed`
    pub fn close<F>(self: &Arc<Self>, request_id: CorrelationId, deregister: F, events: &EventSender)
    where
        F: FnOnce(CorrelationId) + Send + 'static,
    {
        let this = Arc::clone(self);
        let events = events.clone();
        tokio::spawn(async move {
            this.listener.close().await;
            deregister(this.id);
            this.log.log(LogLevel::Debug, &format!("listener {} closed", this.id));
            events.send(Event::reply(
                request_id,
                EventPayload::Closed { socket_id: this.id },
            ));
        });
    }
}

impl fmt::Debug for SimulationListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationListener")
            .field("id", &self.id)
            .field("listener", &self.listener)
            .field("accepts", &self.accepts.len())
            .finish_non_exhaustive()
    }
}
