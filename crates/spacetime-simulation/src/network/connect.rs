//! Network connect module
//!
//! Opens outbound connections through a [`NetworkProvider`] and serves reads,
//! writes and closes on them. Reads here have no deadline.

use crate::network::connection::SimulationConnection;
use crate::resources::ResourceTable;
use spacetime_core::{
    ConnectionType, CorrelationId, Effect, EffectPayload, Event, EventPayload, EventSender,
    LogLevel, Module, ModuleName, NetworkProvider, SharedLogSink, SimulationConfig,
    TransportError,
};
use std::sync::Arc;

/// Answers `Connect`, `ConnectRead`, `ConnectWrite` and `ConnectClose`
#[derive(Debug)]
pub struct NetworkConnectModule {
    provider: Arc<dyn NetworkProvider>,
    config: SimulationConfig,
    log: SharedLogSink,
    connections: ResourceTable<SimulationConnection>,
}

impl NetworkConnectModule {
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
            connections: ResourceTable::new(),
        }
    }

    /// Number of open connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Look up an open connection
    pub fn connection(&self, socket_id: &CorrelationId) -> Option<Arc<SimulationConnection>> {
        self.connections.get(socket_id)
    }

    fn connect(
        &self,
        request_id: CorrelationId,
        address: String,
        port: u16,
        kind: ConnectionType,
        events: &EventSender,
    ) {
        let provider = Arc::clone(&self.provider);
        let connections = self.connections.clone();
        let log = Arc::clone(&self.log);
        let deadline = self.config.connect_timeout();
        let events = events.clone();
        tokio::spawn(async move {
            let result = tokio::time::timeout(deadline, provider.connect(&address, port, kind))
                .await
                .unwrap_or_else(|_| {
                    Err(TransportError::Timeout(format!(
                        "connect to {address}:{port} after {}ms",
                        deadline.as_millis()
                    )))
                });
            let event = match result {
                Ok(connection) => {
                    let socket_id = CorrelationId::new();
                    connections.insert(
                        socket_id,
                        Arc::new(SimulationConnection::new(socket_id, connection, Arc::clone(&log))),
                    );
                    log.log(
                        LogLevel::Info,
                        &format!("connected {socket_id} to {address}:{port} over {kind}"),
                    );
                    Event::reply(request_id, EventPayload::ConnectSuccess { socket_id })
                }
                Err(error) => {
                    log.log(
                        LogLevel::Error,
                        &format!("connect to {address}:{port} over {kind} failed: {error}"),
                    );
                    Event::failure(request_id)
                }
            };
            events.send(event);
        });
    }

    fn unknown_connection(&self, request_id: CorrelationId, socket_id: CorrelationId) -> Option<Event> {
        self.log.log(
            LogLevel::Warn,
            &format!("no open connection {socket_id} for request {request_id}"),
        );
        Some(Event::failure(request_id))
    }
}

impl Module for NetworkConnectModule {
    fn name(&self) -> ModuleName {
        ModuleName::NETWORK_CONNECT
    }

    fn handle_effect(&self, effect: Effect, events: &EventSender) -> Option<Event> {
        let (request_id, payload) = effect.into_parts();
        match payload {
            EffectPayload::Connect {
                address,
                port,
                kind,
            } => {
                self.connect(request_id, address, port, kind, events);
                None
            }
            EffectPayload::ConnectRead { socket_id, style } => {
                match self.connections.get(&socket_id) {
                    Some(connection) => {
                        connection.read(request_id, style, events);
                        None
                    }
                    None => self.unknown_connection(request_id, socket_id),
                }
            }
            EffectPayload::ConnectWrite {
                socket_id,
                data,
                length_prefix_bits,
            } => match self.connections.get(&socket_id) {
                Some(connection) => {
                    connection.write(request_id, data, length_prefix_bits, events);
                    None
                }
                None => self.unknown_connection(request_id, socket_id),
            },
            EffectPayload::ConnectClose { socket_id } => match self.connections.get(&socket_id) {
                Some(connection) => {
                    let connections = self.connections.clone();
                    connection.close(
                        request_id,
                        move |id| {
                            connections.remove(&id);
                        },
                        events,
                    );
                    None
                }
                None => self.unknown_connection(request_id, socket_id),
            },
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

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use spacetime_core::{event_queue, Connection, ReadStyle, TracingLogSink};
    use spacetime_transport::MemoryNetwork;

    fn module(network: &MemoryNetwork) -> NetworkConnectModule {
        NetworkConnectModule::new(
            Arc::new(network.clone()),
            SimulationConfig::default(),
            TracingLogSink::shared(),
        )
    }

    #[tokio::test]
    async fn connect_registers_a_connection() {
        let network = MemoryNetwork::default();
        let listener = network.bind_memory("db", 5432).unwrap();
        let module = module(&network);
        let (events, mut rx) = event_queue();

        let effect = Effect::connect("db", 5432, ConnectionType::Tcp);
        assert!(module.handle_effect(effect.clone(), &events).is_none());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.effect_id(), Some(effect.id()));
        let socket_id = assert_matches!(
            event.payload(),
            EventPayload::ConnectSuccess { socket_id } => *socket_id
        );
        assert_eq!(module.connection_count(), 1);
        assert!(module.connection(&socket_id).is_some());

        let server = listener.accept_memory().await.unwrap();
        let write = Effect::new(EffectPayload::ConnectWrite {
            socket_id,
            data: b"ping".to_vec(),
            length_prefix_bits: None,
        });
        assert!(module.handle_effect(write.clone(), &events).is_none());
        assert_eq!(
            rx.recv().await.unwrap(),
            Event::reply(write.id(), EventPayload::Affected)
        );
        assert_eq!(server.read(4).await.unwrap(), b"ping".to_vec());
    }

    #[tokio::test]
    async fn refused_connect_fails_the_request() {
        let network = MemoryNetwork::default();
        let module = module(&network);
        let (events, mut rx) = event_queue();

        let effect = Effect::connect("nowhere", 1, ConnectionType::Tcp);
        assert!(module.handle_effect(effect.clone(), &events).is_none());
        assert_eq!(rx.recv().await.unwrap(), Event::failure(effect.id()));
        assert_eq!(module.connection_count(), 0);
    }

    #[tokio::test]
    async fn unknown_socket_fails_inline() {
        let module = module(&MemoryNetwork::default());
        let (events, _rx) = event_queue();
        let effect = Effect::new(EffectPayload::ConnectRead {
            socket_id: CorrelationId::new(),
            style: ReadStyle::MaxSize(8),
        });
        assert_eq!(
            module.handle_effect(effect.clone(), &events),
            Some(Event::failure(effect.id()))
        );
    }

    #[tokio::test]
    async fn foreign_variants_fail_inline() {
        let module = module(&MemoryNetwork::default());
        let (events, _rx) = event_queue();
        let effect = Effect::random();
        assert_eq!(
            module.handle_effect(effect.clone(), &events),
            Some(Event::failure(effect.id()))
        );
    }

    #[tokio::test]
    async fn oversized_exact_read_fails_without_allocating() {
        let network = MemoryNetwork::default();
        let _listener = network.bind_memory("db", 2).unwrap();
        let module = module(&network);
        let (events, mut rx) = event_queue();

        module.handle_effect(Effect::connect("db", 2, ConnectionType::Tcp), &events);
        let socket_id = assert_matches!(
            rx.recv().await.unwrap().into_payload(),
            EventPayload::ConnectSuccess { socket_id } => socket_id
        );
        let connection = module.connection(&socket_id).unwrap();

        for style in [ReadStyle::ExactSize(usize::MAX), ReadStyle::UnsafeExactSize(usize::MAX)] {
            let read = Effect::new(EffectPayload::ConnectRead { socket_id, style });
            assert!(module.handle_effect(read.clone(), &events).is_none());
            assert_eq!(rx.recv().await.unwrap(), Event::failure(read.id()));
            assert_eq!(connection.pending_reads(), 0);
        }
        assert_eq!(module.connection_count(), 1);
    }

    #[tokio::test]
    async fn close_removes_the_connection() {
        let network = MemoryNetwork::default();
        let _listener = network.bind_memory("db", 1).unwrap();
        let module = module(&network);
        let (events, mut rx) = event_queue();

        module.handle_effect(Effect::connect("db", 1, ConnectionType::Tcp), &events);
        let socket_id = assert_matches!(
            rx.recv().await.unwrap().into_payload(),
            EventPayload::ConnectSuccess { socket_id } => socket_id
        );

        let close = Effect::new(EffectPayload::ConnectClose { socket_id });
        assert!(module.handle_effect(close.clone(), &events).is_none());
        assert_eq!(
            rx.recv().await.unwrap(),
            Event::reply(close.id(), EventPayload::Closed { socket_id })
        );
        assert_eq!(module.connection_count(), 0);

        let read = Effect::new(EffectPayload::ConnectRead {
            socket_id,
            style: ReadStyle::ExactSize(1),
        });
        assert_eq!(
            module.handle_effect(read.clone(), &events),
            Some(Event::failure(read.id()))
        );
    }
}
