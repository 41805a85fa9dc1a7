//! Simulated connection resource
//!
//! Wraps one transport [`Connection`] and runs each read, write and close on
//! its own task. Every operation is tracked in a pending table keyed by an
//! operation id and answers the request id it was started for with exactly
//! one event.

use crate::resources::PendingOperations;
use spacetime_core::{
    Connection, CorrelationId, Event, EventPayload, EventSender, LogLevel, ReadStyle,
    SharedLogSink, TransportResult,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// One open connection owned by a network module
pub struct SimulationConnection {
    id: CorrelationId,
    connection: Arc<dyn Connection>,
    log: SharedLogSink,
    reads: PendingOperations,
    writes: PendingOperations,
    closes: PendingOperations,
}

impl SimulationConnection {
    /// Wrap a transport connection under the resource id `id`
    pub fn new(id: CorrelationId, connection: Arc<dyn Connection>, log: SharedLogSink) -> Self {
        Self {
            id,
            connection,
            log,
            reads: PendingOperations::new(),
            writes: PendingOperations::new(),
            closes: PendingOperations::new(),
        }
    }

    /// Resource id handed back to callers
    pub fn id(&self) -> CorrelationId {
        self.id
    }

    /// Reads in flight
    pub fn pending_reads(&self) -> usize {
        self.reads.len()
    }

    /// Writes in flight
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Closes in flight
    pub fn pending_closes(&self) -> usize {
        self.closes.len()
    }

    /// Start a read answering `request_id`
    pub fn read(self: &Arc<Self>, request_id: CorrelationId, style: ReadStyle, events: &EventSender) {
        self.spawn_read(request_id, style, events.clone());
    }

    /// Start a read answering `request_id`, failing it once `deadline` elapses
    ///
    /// The read task itself is not cancelled. If it completes after the
    /// deadline its event carries an id nobody is waiting on any more.
    pub fn read_with_deadline(
        self: &Arc<Self>,
        request_id: CorrelationId,
        style: ReadStyle,
        events: &EventSender,
        deadline: Duration,
    ) {
        let task = self.spawn_read(request_id, style, events.clone());
        let this = Arc::clone(self);
        let events = events.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(deadline, task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_error)) => {
                    this.log.log(
                        LogLevel::Error,
                        &format!("read task for {request_id} on {} aborted: {join_error}", this.id),
                    );
                    events.send(Event::failure(request_id));
                }
                Err(_) => {
                    this.log.log(
                        LogLevel::Warn,
                        &format!(
                            "read {request_id} on {} timed out after {}ms",
                            this.id,
                            deadline.as_millis()
                        ),
                    );
                    events.send(Event::failure(request_id));
                }
            }
        });
    }

    fn spawn_read(
        self: &Arc<Self>,
        request_id: CorrelationId,
        style: ReadStyle,
        events: EventSender,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        self.reads.spawn(request_id, self.id, &self.log, events, async move {
            this.perform_read(request_id, style).await
        })
    }

    async fn perform_read(&self, request_id: CorrelationId, style: ReadStyle) -> Event {
        self.log.log(
            LogLevel::Debug,
            &format!("reading {style} from {} for {request_id}", self.id),
        );
        if let ReadStyle::ExactSize(size) | ReadStyle::UnsafeExactSize(size) = style {
            let max = self.connection.max_frame_size();
            if size > max {
                self.log.log(
                    LogLevel::Error,
                    &format!("read {style} on {} exceeds the {max} byte frame limit", self.id),
                );
                return Event::failure(request_id);
            }
        }
        let result: TransportResult<Vec<u8>> = match style {
            ReadStyle::ExactSize(size) => self.connection.read(size).await,
            ReadStyle::UnsafeExactSize(size) => self.connection.unsafe_read(size).await,
            ReadStyle::MaxSize(size) => self.connection.read_max(size).await,
            ReadStyle::LengthPrefixSizeInBits(bits) => {
                self.connection.read_with_length_prefix(bits).await
            }
        };
        match result {
            Ok(data) => {
                if data.is_empty() && matches!(style, ReadStyle::LengthPrefixSizeInBits(_)) {
                    self.log.log(
                        LogLevel::Warn,
                        &format!("empty length-prefixed payload on {} for {request_id}", self.id),
                    );
                }
                Event::reply(
                    request_id,
                    EventPayload::ReadSuccess {
                        socket_id: self.id,
                        data,
                    },
                )
            }
            Err(error) => {
                self.log.log(
                    LogLevel::Error,
                    &format!("read {style} on {} failed: {error}", self.id),
                );
                Event::failure(request_id)
            }
        }
    }

    /// Start a write answering `request_id`
    pub fn write(
        self: &Arc<Self>,
        request_id: CorrelationId,
        data: Vec<u8>,
        length_prefix_bits: Option<u8>,
        events: &EventSender,
    ) {
        let this = Arc::clone(self);
        self.writes.spawn(request_id, self.id, &self.log, events.clone(), async move {
            let result = match length_prefix_bits {
                Some(bits) => this.connection.write_with_length_prefix(&data, bits).await,
                None => this.connection.write(&data).await,
            };
            match result {
                Ok(()) => Event::reply(request_id, EventPayload::Affected),
                Err(error) => {
                    this.log.log(
                        LogLevel::Error,
                        &format!("write of {} bytes on {} failed: {error}", data.len(), this.id),
                    );
                    Event::failure(request_id)
                }
            }
        });
    }

    /// Close the transport, answering `request_id` with `Closed`
    ///
    /// `deregister` runs after the transport is closed and before the event is
    /// sent, so a follow-up operation on the id already finds nothing.
    pub fn close<F>(self: &Arc<Self>, request_id: CorrelationId, deregister: F, events: &EventSender)
    where
        F: FnOnce(CorrelationId) + Send + 'static,
    {
        let this = Arc::clone(self);
        self.closes.spawn(request_id, self.id, &self.log, events.clone(), async move {
            this.connection.close().await;
            deregister(this.id);
            this.reads.clear();
            this.writes.clear();
            this.log.log(LogLevel::Debug, &format!("closed {}", this.id));
            Event::reply(request_id, EventPayload::Closed { socket_id: this.id })
        });
    }
}

impl fmt::Debug for SimulationConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationConnection")
            .field("id", &self.id)
            .field("connection", &self.connection)
            .field("reads", &self.reads.len())
            .field("writes", &self.writes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use spacetime_core::{event_queue, MemoryLogSink, TransportError};
    use spacetime_transport::MemoryNetwork;

    /// Transport whose reads and writes panic mid-operation
    #[derive(Debug)]
    struct Faulty;

    #[async_trait]
    impl Connection for Faulty {
        async fn read(&self, _size: usize) -> TransportResult<Vec<u8>> {
            panic!("read fault")
        }

        async fn read_max(&self, _max_size: usize) -> TransportResult<Vec<u8>> {
            panic!("read fault")
        }

        async fn write(&self, _data: &[u8]) -> TransportResult<()> {
            panic!("write fault")
        }

        async fn close(&self) {}
    }

    async fn pair(log: SharedLogSink) -> (Arc<SimulationConnection>, Arc<dyn Connection>) {
        let network = MemoryNetwork::default();
        let listener = network.bind_memory("sim", 1).unwrap();
        let client = network.connect_memory("sim", 1).unwrap();
        let server: Arc<dyn Connection> = listener.accept_memory().await.unwrap();
        let resource = SimulationConnection::new(CorrelationId::new(), Arc::new(client), log);
        (Arc::new(resource), server)
    }

    #[tokio::test]
    async fn read_answers_the_request_id() {
        let (resource, peer) = pair(spacetime_core::TracingLogSink::shared()).await;
        let (events, mut rx) = event_queue();
        let request = CorrelationId::new();

        resource.read(request, ReadStyle::ExactSize(3), &events);
        peer.write(b"abc").await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.effect_id(), Some(request));
        assert_matches!(
            event.payload(),
            EventPayload::ReadSuccess { socket_id, data } if *socket_id == resource.id() && data == b"abc"
        );
        assert_eq!(resource.pending_reads(), 0);
    }

    #[tokio::test]
    async fn empty_framed_read_is_logged_but_succeeds() {
        let log = Arc::new(MemoryLogSink::new());
        let (resource, peer) = pair(log.clone()).await;
        let (events, mut rx) = event_queue();

        peer.write_with_length_prefix(b"", 16).await.unwrap();
        resource.read(CorrelationId::new(), ReadStyle::LengthPrefixSizeInBits(16), &events);

        let event = rx.recv().await.unwrap();
        assert_matches!(event.payload(), EventPayload::ReadSuccess { data, .. } if data.is_empty());
        assert_eq!(log.records_at(LogLevel::Warn).len(), 1);
        assert!(log.contains("empty length-prefixed payload"));
    }

    #[tokio::test]
    async fn failed_write_answers_failure_for_the_request() {
        let (resource, _peer) = pair(spacetime_core::TracingLogSink::shared()).await;
        let (events, mut rx) = event_queue();
        let request = CorrelationId::new();

        resource.write(request, vec![1, 2, 3], Some(12), &events);

        assert_eq!(rx.recv().await.unwrap(), Event::failure(request));
        assert_eq!(resource.pending_writes(), 0);
    }

    #[tokio::test]
    async fn close_deregisters_before_acknowledging() {
        let (resource, peer) = pair(spacetime_core::TracingLogSink::shared()).await;
        let (events, mut rx) = event_queue();
        let (deregistered_tx, deregistered_rx) = tokio::sync::oneshot::channel();
        let request = CorrelationId::new();

        resource.close(
            request,
            move |id| {
                let _ = deregistered_tx.send(id);
            },
            &events,
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(deregistered_rx.await.unwrap(), resource.id());
        assert_eq!(
            event,
            Event::reply(request, EventPayload::Closed { socket_id: resource.id() })
        );
        assert_matches!(peer.read_max(1).await, Err(TransportError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_fails_a_silent_read() {
        let (resource, _peer) = pair(spacetime_core::TracingLogSink::shared()).await;
        let (events, mut rx) = event_queue();
        let request = CorrelationId::new();

        resource.read_with_deadline(
            request,
            ReadStyle::ExactSize(4),
            &events,
            Duration::from_millis(250),
        );

        let started = tokio::time::Instant::now();
        assert_eq!(rx.recv().await.unwrap(), Event::failure(request));
        assert!(started.elapsed() >= Duration::from_millis(250));
        assert_eq!(resource.pending_reads(), 1);
    }

    #[tokio::test]
    async fn read_within_deadline_is_delivered_once() {
        let (resource, peer) = pair(spacetime_core::TracingLogSink::shared()).await;
        let (events, mut rx) = event_queue();
        let request = CorrelationId::new();

        peer.write(b"ok").await.unwrap();
        resource.read_with_deadline(
            request,
            ReadStyle::ExactSize(2),
            &events,
            Duration::from_secs(5),
        );

        let event = rx.recv().await.unwrap();
        assert_matches!(event.payload(), EventPayload::ReadSuccess { .. });
        drop(events);
        tokio::task::yield_now().await;
        assert!(tokio::time::timeout(Duration::from_millis(50), rx.recv())
            .await
            .map_or(true, |next| next.is_none()));
    }

    #[tokio::test]
    async fn panicking_operations_answer_failure() {
        let log = Arc::new(MemoryLogSink::new());
        let resource = Arc::new(SimulationConnection::new(
            CorrelationId::new(),
            Arc::new(Faulty),
            log.clone(),
        ));
        let (events, mut rx) = event_queue();

        let read = CorrelationId::new();
        resource.read(read, ReadStyle::MaxSize(8), &events);
        assert_eq!(rx.recv().await.unwrap(), Event::failure(read));
        assert_eq!(resource.pending_reads(), 0);

        let write = CorrelationId::new();
        resource.write(write, b"x".to_vec(), None, &events);
        assert_eq!(rx.recv().await.unwrap(), Event::failure(write));
        assert_eq!(resource.pending_writes(), 0);

        assert_eq!(log.records_at(LogLevel::Error).len(), 2);
    }

    #[tokio::test]
    async fn exact_reads_above_the_frame_limit_fail() {
        let log = Arc::new(MemoryLogSink::new());
        let (resource, _peer) = pair(log.clone()).await;
        let (events, mut rx) = event_queue();
        let request = CorrelationId::new();

        resource.read(request, ReadStyle::ExactSize(usize::MAX), &events);

        assert_eq!(rx.recv().await.unwrap(), Event::failure(request));
        assert_eq!(resource.pending_reads(), 0);
        assert!(log.contains("frame limit"));
    }
}
