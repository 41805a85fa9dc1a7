//! Injectable logging collaborator
//!
//! The simulation modules report what happens on their I/O paths through a
//! [`LogSink`] rather than calling `tracing` directly, so tests can observe
//! anomalies (for example an empty length-prefixed read) without installing a
//! subscriber.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Severity of a log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Verbose tracing of individual operations
    Debug,
    /// Normal lifecycle messages
    Info,
    /// Anomalies that do not fail the request
    Warn,
    /// Failed requests
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => f.write_str("debug"),
            LogLevel::Info => f.write_str("info"),
            LogLevel::Warn => f.write_str("warn"),
            LogLevel::Error => f.write_str("error"),
        }
    }
}

/// Destination for module log records
pub trait LogSink: Send + Sync + fmt::Debug {
    /// Record one message
    fn log(&self, level: LogLevel, message: &str);
}

/// Shared handle to a sink
pub type SharedLogSink = Arc<dyn LogSink>;

/// Forwards records to `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingLogSink;

impl TracingLogSink {
    /// Shared handle to the tracing sink
    pub fn shared() -> SharedLogSink {
        Arc::new(Self)
    }
}

impl LogSink for TracingLogSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "spacetime", "{message}"),
            LogLevel::Info => tracing::info!(target: "spacetime", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "spacetime", "{message}"),
            LogLevel::Error => tracing::error!(target: "spacetime", "{message}"),
        }
    }
}

/// One captured record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Severity
    pub level: LogLevel,
    /// Message text
    pub message: String,
}

/// Keeps every record in memory, for tests
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records so far
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Records at the given level
    pub fn records_at(&self, level: LogLevel) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|record| record.level == level)
            .cloned()
            .collect()
    }

    /// Whether any record contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|record| record.message.contains(needle))
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, level: LogLevel, message: &str) {
        self.records.lock().push(LogRecord {
            level,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_filters_by_level() {
        let sink = MemoryLogSink::new();
        sink.log(LogLevel::Debug, "reading");
        sink.log(LogLevel::Warn, "empty payload");
        assert_eq!(sink.records().len(), 2);
        assert_eq!(sink.records_at(LogLevel::Warn)[0].message, "empty payload");
        assert!(sink.contains("empty"));
        assert!(!sink.contains("timeout"));
    }
}
