//! Stream-backed connection
//!
//! Wraps the read and write halves of any tokio byte stream. Each half sits
//! behind its own async mutex, so one read and one write can be in flight at
//! the same time while concurrent reads queue up.

use async_trait::async_trait;
use spacetime_core::framing::checked_frame_len;
use spacetime_core::{Connection, TransportError, TransportResult};
use std::fmt;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Connection over a split byte stream
pub struct StreamConnection<R, W> {
    label: String,
    reader: Mutex<R>,
    writer: Mutex<Option<W>>,
    closed: AtomicBool,
    read_buffer_size: usize,
    max_frame_size: usize,
}

impl<R, W> StreamConnection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Wrap the two halves of a stream
    pub fn new(
        label: impl Into<String>,
        reader: R,
        writer: W,
        read_buffer_size: usize,
        max_frame_size: usize,
    ) -> Self {
        Self {
            label: label.into(),
            reader: Mutex::new(reader),
            writer: Mutex::new(Some(writer)),
            closed: AtomicBool::new(false),
            read_buffer_size: read_buffer_size.max(1),
            max_frame_size,
        }
    }

    /// Human-readable endpoint description
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

fn map_read_error(error: std::io::Error) -> TransportError {
    match error.kind() {
        ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe => {
            TransportError::Closed
        }
        _ => TransportError::Io(error),
    }
}

#[async_trait]
impl<R, W> Connection for StreamConnection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn read(&self, size: usize) -> TransportResult<Vec<u8>> {
        self.ensure_open()?;
        let size = checked_frame_len(size as u64, self.max_frame_size)?;
        let mut buffer = vec![0u8; size];
        if size == 0 {
            return Ok(buffer);
        }
        let mut reader = self.reader.lock().await;
        reader.read_exact(&mut buffer).await.map_err(map_read_error)?;
        Ok(buffer)
    }

    async fn read_max(&self, max_size: usize) -> TransportResult<Vec<u8>> {
        self.ensure_open()?;
        if max_size == 0 {
            return Ok(Vec::new());
        }
        let mut buffer = vec![0u8; max_size.min(self.read_buffer_size)];
        let mut reader = self.reader.lock().await;
        let n = reader.read(&mut buffer).await.map_err(map_read_error)?;
        if n == 0 {
            return Err(TransportError::Closed);
        }
        buffer.truncate(n);
        Ok(buffer)
    }

    async fn write(&self, data: &[u8]) -> TransportResult<()> {
        self.ensure_open()?;
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;
        writer.write_all(data).await.map_err(map_read_error)?;
        writer.flush().await.map_err(map_read_error)?;
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.shutdown().await {
                tracing::debug!(connection = %self.label, error = %e, "shutdown after close failed");
            }
        }
    }

    fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl<R, W> fmt::Debug for StreamConnection<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConnection")
            .field("label", &self.label)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
