//! Network listen module
//!
//! Binds listeners, accepts inbound connections and serves reads, writes and
//! closes on the accepted connections. Reads on accepted connections race the
//! configured `listen_read_timeout`; whichever finishes first answers the
//! request.

use crate::network::connection::SimulationConnection;
use crate::network::listener::SimulationListener;
use crate::resources::ResourceTable;
use spacetime_core::{
    ConnectionType, CorrelationId, Effect, EffectPayload, Event, EventPayload, EventSender,
    LogLevel, Module, ModuleName, NetworkProvider, SharedLogSink, SimulationConfig,
};
use std::sync::Arc;

/// Answers `Listen`, `Accept`, `ListenRead`, `ListenWrite` and `ListenClose`
#[derive(Debug)]
pub struct NetworkListenModule {
    provider: Arc<dyn NetworkProvider>,
    config: SimulationConfig,
    log: SharedLogSink,
    listeners: ResourceTable<SimulationListener>,
    connections: ResourceTable<SimulationConnection>,
}

impl NetworkListenModule {
    /// Create the module over `provider`
    pub fn new(
        provider: Arc<dyn NetworkProvider>,
        config: SimulationConfig,
        log: SharedLogSink,
    ) -> Self {
        Self {
            provider,
            config,
            log,
            listeners: ResourceTable::new(),
            connections: ResourceTable::new(),
        }
    }

    /// Number of bound listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Number of accepted connections still open
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Look up a bound listener
    pub fn listener(&self, listener_id: &CorrelationId) -> Option<Arc<SimulationListener>> {
        self.listeners.get(listener_id)
    }

    /// Look up an accepted connection
    pub fn connection(&self, socket_id: &CorrelationId) -> Option<Arc<SimulationConnection>> {
        self.connections.get(socket_id)
    }

    fn listen(
        &self,
        request_id: CorrelationId,
        address: String,
        port: u16,
        kind: ConnectionType,
        events: &EventSender,
    ) {
        let provider = Arc::clone(&self.provider);
        let listeners = self.listeners.clone();
        let log = Arc::clone(&self.log);
        let events = events.clone();
        tokio::spawn(async move {
            let event = match provider.listen(&address, port, kind).await {
                Ok(listener) => {
                    let listener_id = CorrelationId::new();
                    listeners.insert(
                        listener_id,
                        Arc::new(SimulationListener::new(listener_id, listener, Arc::clone(&log))),
                    );
                    log.log(
                        LogLevel::Info,
                        &format!("listener {listener_id} bound to {address}:{port} over {kind}"),
                    );
                    Event::reply(
                        request_id,
                        EventPayload::ListenSuccess {
                            socket_id: listener_id,
                        },
                    )
                }
                Err(error) => {
                    log.log(
                        LogLevel::Error,
                        &format!("listen on {address}:{port} over {kind} failed: {error}"),
                    );
                    Event::failure(request_id)
                }
            };
            events.send(event);
        });
    }

    fn close(&self, request_id: CorrelationId, socket_id: CorrelationId, events: &EventSender) -> Option<Event> {
        if let Some(connection) = self.connections.get(&socket_id) {
            let connections = self.connections.clone();
            connection.close(
                request_id,
                move |id| {
                    connections.remove(&id);
                },
                events,
            );
            return None;
        }
        if let Some(listener) = self.listeners.get(&socket_id) {
            let listeners = self.listeners.clone();
            listener.close(
                request_id,
                move |id| {
                    listeners.remove(&id);
                },
                events,
            );
            return None;
        }
        self.unknown_resource(request_id, socket_id)
    }

    fn unknown_resource(&self, request_id: CorrelationId, resource_id: CorrelationId) -> Option<Event> {
        self.log.log(
            LogLevel::Warn,
            &format!("no listener or accepted connection {resource_id} for request {request_id}"),
        );
        Some(Event::failure(request_id))
    }
}

impl Module for NetworkListenModule {
    fn name(&self) -> ModuleName {
        ModuleName::NETWORK_LISTEN
    }

    fn handle_effect(&self, effect: Effect, events: &EventSender) -> Option<Event> {
        let (request_id, payload) = effect.into_parts();
        match payload {
            EffectPayload::Listen {
                address,
                port,
                kind,
            } => {
                self.listen(request_id, address, port, kind, events);
                None
            }
            EffectPayload::Accept { listener_id } => match self.listeners.get(&listener_id) {
                Some(listener) => {
                    listener.accept(request_id, &self.connections, events);
                    None
                }
                None => self.unknown_resource(request_id, listener_id),
            },
            EffectPayload::ListenRead { socket_id, style } => {
                match self.connections.get(&socket_id) {
                    Some(connection) => {
                        connection.read_with_deadline(
                            request_id,
                            style,
                            events,
                            self.config.listen_read_timeout(),
                        );
                        None
                    }
                    None => self.unknown_resource(request_id, socket_id),
                }
            }
            EffectPayload::ListenWrite {
                socket_id,
                data,
                length_prefix_bits,
            } => match self.connections.get(&socket_id) {
                Some(connection) => {
                    connection.write(request_id, data, length_prefix_bits, events);
                    None
                }
                None => self.unknown_resource(request_id, socket_id),
            },
            EffectPayload::ListenClose { socket_id } => self.close(request_id, socket_id, events),
            other => {
                self.log.log(
                    LogLevel::Warn,
                    &format!("{} cannot handle {} [{request_id}]", self.name(), other.kind()),
                );
                Some(Event::failure(request_id))
            }
        }
    }
}
