//! Scripted in-memory transport for pump tests.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};
use crate::transport::{Frame, FrameReader, FrameWriter, Transport};

// ============================================================================
// MockTransport
// ============================================================================

/// How the mock writer responds to writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Accept,
    Fail,
    Stall,
    /// Every feed and flush takes this long.
    Slow(Duration),
}

/// Everything the writer saw.
#[derive(Debug)]
struct WriteLog {
    mode: WriteMode,
    /// Fed but not yet flushed.
    pending: Vec<Frame>,
    /// One entry per flush.
    batches: Vec<Vec<Frame>>,
    closes: usize,
    read_limit: Option<usize>,
}

pub(crate) struct MockTransport {
    inbound: mpsc::UnboundedReceiver<Result<Option<Frame>>>,
    log: Arc<Mutex<WriteLog>>,
}

impl MockTransport {
    pub(crate) fn new() -> (Self, MockHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let log = Arc::new(Mutex::new(WriteLog {
            mode: WriteMode::Accept,
            pending: Vec::new(),
            batches: Vec::new(),
            closes: 0,
            read_limit: None,
        }));

        let transport = Self {
            inbound: rx,
            log: Arc::clone(&log),
        };
        (transport, MockHandle { inbound: tx, log })
    }
}

impl Transport for MockTransport {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn split(self) -> (Self::Reader, Self::Writer) {
        (
            MockReader {
                inbound: self.inbound,
                log: Arc::clone(&self.log),
            },
            MockWriter { log: self.log },
        )
    }
}

pub(crate) struct MockReader {
    inbound: mpsc::UnboundedReceiver<Result<Option<Frame>>>,
    log: Arc<Mutex<WriteLog>>,
}

#[async_trait]
impl FrameReader for MockReader {
    async fn read_frame(&mut self) -> Result<Option<Frame>> {
        match self.inbound.recv().await {
            Some(item) => item,
            None => Ok(None),
        }
    }

    fn set_read_limit(&mut self, limit: usize) {
        self.log.lock().read_limit = Some(limit);
    }
}

pub(crate) struct MockWriter {
    log: Arc<Mutex<WriteLog>>,
}

impl MockWriter {
    async fn apply_mode(&self) -> Result<()> {
        let mode = self.log.lock().mode;
        match mode {
            WriteMode::Accept => Ok(()),
            WriteMode::Fail => Err(Error::Io(io::Error::other("injected write failure"))),
            WriteMode::Stall => std::future::pending().await,
            WriteMode::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl FrameWriter for MockWriter {
    async fn feed(&mut self, frame: Frame) -> Result<()> {
        self.apply_mode().await?;
        self.log.lock().pending.push(frame);
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.apply_mode().await?;
        let mut log = self.log.lock();
        let batch = std::mem::take(&mut log.pending);
        if !batch.is_empty() {
            log.batches.push(batch);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.log.lock().closes += 1;
        Ok(())
    }
}

// ============================================================================
// MockHandle
// ============================================================================

/// Test-side controls for a [`MockTransport`].
pub(crate) struct MockHandle {
    inbound: mpsc::UnboundedSender<Result<Option<Frame>>>,
    log: Arc<Mutex<WriteLog>>,
}

impl MockHandle {
    /// Delivers a frame to the reader.
    pub(crate) fn push(&self, frame: Frame) {
        let _ = self.inbound.send(Ok(Some(frame)));
    }

    /// Fails the next read.
    pub(crate) fn push_error(&self, error: Error) {
        let _ = self.inbound.send(Err(error));
    }

    /// Ends the read stream.
    pub(crate) fn end(&self) {
        let _ = self.inbound.send(Ok(None));
    }

    /// Makes every following write fail.
    pub(crate) fn fail_writes(&self) {
        self.log.lock().mode = WriteMode::Fail;
    }

    /// Makes every following write hang.
    pub(crate) fn stall_writes(&self) {
        self.log.lock().mode = WriteMode::Stall;
    }

    /// Makes every following write take `delay`.
    pub(crate) fn slow_writes(&self, delay: Duration) {
        self.log.lock().mode = WriteMode::Slow(delay);
    }

    /// Flushed batches, in order.
    pub(crate) fn batches(&self) -> Vec<Vec<Frame>> {
        self.log.lock().batches.clone()
    }

    /// Every flushed frame, in order.
    pub(crate) fn frames_written(&self) -> Vec<Frame> {
        self.batches().into_iter().flatten().collect()
    }

    /// Payloads of flushed data frames, in order.
    pub(crate) fn data_written(&self) -> Vec<Bytes> {
        self.frames_written()
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Data(payload) => Some(payload),
                _ => None,
            })
            .collect()
    }

    /// Number of heartbeats written.
    pub(crate) fn pings(&self) -> usize {
        self.frames_written()
            .iter()
            .filter(|frame| matches!(frame, Frame::Ping(_)))
            .count()
    }

    /// Number of times the transport was closed.
    pub(crate) fn closes(&self) -> usize {
        self.log.lock().closes
    }

    /// Read limit installed by the inbound pump.
    pub(crate) fn read_limit(&self) -> Option<usize> {
        self.log.lock().read_limit
    }
}

/// Lets every ready task run. Requires a paused clock.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// ============================================================================
// Log Capture
// ============================================================================

/// Log output captured for the current thread.
pub(crate) struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
    _guard: DefaultGuard,
}

impl CapturedLogs {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    pub(crate) fn contains(&self, needle: &str) -> bool {
        self.contents().contains(needle)
    }
}

#[derive(Clone)]
struct BufferWriter(Arc<Mutex<Vec<u8>>>);

impl Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Captures `debug` and above for tasks on the current thread.
///
/// Only reliable on a current-thread runtime.
pub(crate) fn capture_logs() -> CapturedLogs {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let writer = BufferWriter(Arc::clone(&buffer));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("duplex_socket=debug"))
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    CapturedLogs {
        buffer,
        _guard: tracing::subscriber::set_default(subscriber),
    }
}
