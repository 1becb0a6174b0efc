//! Per-connection duplex pump.
//!
//! A [`Connection`] wraps an established [`Transport`] and runs two tasks
//! over it:
//!
//! - **Inbound pump**: the only reader. Hands data frames to the
//!   [`MessageHandler`] and keeps the liveness deadline fresh on every
//!   heartbeat acknowledgement.
//! - **Outbound pump**: the only writer. Drains the outbound queue in
//!   batches and sends a heartbeat on every idle tick.
//!
//! The pumps share nothing but the bounded outbound queue and a one-shot
//! shutdown signal. Whichever side fails first closes the connection, and
//! [`Connection::close`] runs its teardown exactly once no matter how many
//! callers race it.
//!
//! # Lifecycle
//!
//! ```text
//!   open ──► Open ──close()/pump exit──► Closing ──both pumps exited──► Closed
//! ```
//!
//! # Backpressure
//!
//! [`Connection::enqueue`] never waits. A full queue means the peer is not
//! keeping up; the connection is torn down and the caller gets
//! [`Error::BufferFull`].

// ============================================================================
// Submodules
// ============================================================================

mod inbound;
mod outbound;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, debug_span, warn};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::handler::{MessageHandler, MessageSender};
use crate::identifiers::ConnectionId;
use crate::transport::Transport;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Both pumps running, messages accepted.
    Open,
    /// Shutdown signaled, pumps still winding down.
    Closing,
    /// Both pumps have exited.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Closing => f.write_str("closing"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Shared state behind every [`Connection`] handle.
struct ConnectionInner {
    /// Identifier used in logs.
    id: ConnectionId,
    /// Timing and sizing.
    config: ConnectionConfig,
    /// Producer side of the outbound queue. Taken on close.
    outbound: Mutex<Option<mpsc::Sender<Bytes>>>,
    /// One-shot shutdown signal.
    shutdown: CancellationToken,
    /// Close-once gate.
    closing: AtomicBool,
    /// Inbound and outbound pump tasks.
    pumps: TaskTracker,
}

/// A running duplex connection.
///
/// Handles are cheap to clone and all refer to the same connection.
/// Dropping every handle does not close the connection: the pumps keep it
/// alive until the peer goes away or [`close`](Self::close) is called.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync`. Every method is non-blocking except
/// [`closed`](Self::closed), which waits for the pumps to exit.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// Connection - Constructors
// ============================================================================

impl Connection {
    /// Opens a connection over `transport` with default configuration.
    ///
    /// See [`open_with_config`](Self::open_with_config).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upgrade`] if called outside a tokio runtime.
    pub fn open<T, H>(transport: T, handler: H) -> Result<Self>
    where
        T: Transport,
        H: MessageHandler,
    {
        Self::open_with_config(transport, handler, ConnectionConfig::default())
    }

    /// Opens a connection over an established transport.
    ///
    /// Spawns the inbound and outbound pumps on the current tokio runtime
    /// and returns immediately.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `config` is invalid
    /// - [`Error::Upgrade`] if called outside a tokio runtime
    ///
    /// No pumps are started when an error is returned.
    pub fn open_with_config<T, H>(transport: T, handler: H, config: ConnectionConfig) -> Result<Self>
    where
        T: Transport,
        H: MessageHandler,
    {
        config.validate()?;

        let runtime = Handle::try_current()
            .map_err(|e| Error::upgrade(format!("no tokio runtime to run pumps on: {e}")))?;

        let (reader, writer) = transport.split();
        let (outbound_tx, outbound_rx) = mpsc::channel(config.send_buffer);

        let connection = Self {
            inner: Arc::new(ConnectionInner {
                id: ConnectionId::generate(),
                config,
                outbound: Mutex::new(Some(outbound_tx)),
                shutdown: CancellationToken::new(),
                closing: AtomicBool::new(false),
                pumps: TaskTracker::new(),
            }),
        };

        let span = debug_span!("connection", id = %connection.inner.id);
        let pumps = &connection.inner.pumps;

        pumps.spawn_on(
            inbound::run(connection.clone(), reader, handler).instrument(span.clone()),
            &runtime,
        );
        pumps.spawn_on(
            outbound::run(connection.clone(), writer, outbound_rx).instrument(span),
            &runtime,
        );
        pumps.close();

        debug!(
            id = %connection.inner.id,
            send_buffer = config.send_buffer,
            pong_wait = ?config.pong_wait,
            "Connection opened"
        );

        Ok(connection)
    }
}

// ============================================================================
// Connection - Public API
// ============================================================================

impl Connection {
    /// Returns the connection identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Returns the connection configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Queues a message for the outbound pump.
    ///
    /// Never waits. Messages are written in the order they were queued.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if shutdown has begun
    /// - [`Error::BufferFull`] if the queue is full; the connection has
    ///   been closed by the time this returns
    pub fn enqueue(&self, message: impl Into<Bytes>) -> Result<()> {
        let guard = self.inner.outbound.lock();

        // Checked under the lock so a concurrent close either fully
        // precedes this call or fully follows it.
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        let Some(sender) = guard.as_ref() else {
            return Err(Error::ConnectionClosed);
        };

        match sender.try_send(message.into()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(_)) => Err(Error::ConnectionClosed),
            Err(TrySendError::Full(_)) => {
                let capacity = sender.max_capacity();
                drop(guard);

                warn!(id = %self.inner.id, capacity, "Send buffer full, closing slow connection");
                self.close();

                Err(Error::buffer_full(capacity))
            }
        }
    }

    /// Returns the number of messages waiting in the outbound queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.inner
            .outbound
            .lock()
            .as_ref()
            .map_or(0, |sender| sender.max_capacity() - sender.capacity())
    }

    /// Closes the connection.
    ///
    /// Idempotent and safe to call from any thread or task, including the
    /// pumps. The first call signals shutdown and closes the outbound
    /// queue; the outbound pump then closes the transport. Later calls
    /// return immediately.
    pub fn close(&self) {
        if self
            .inner
            .closing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        self.inner.shutdown.cancel();
        drop(self.inner.outbound.lock().take());

        debug!(id = %self.inner.id, "Connection closing");
    }

    /// Returns `true` once shutdown has been signaled.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        if !self.is_closed() {
            ConnectionState::Open
        } else if self.inner.pumps.is_empty() {
            ConnectionState::Closed
        } else {
            ConnectionState::Closing
        }
    }

    /// Waits until both pumps have exited.
    ///
    /// Does not initiate shutdown by itself.
    pub async fn closed(&self) {
        self.inner.pumps.wait().await;
    }

    /// Returns a handle to the shutdown signal for the pumps.
    fn shutdown_signal(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }
}

impl MessageSender for Connection {
    #[inline]
    fn send_binary(&self, data: Bytes) -> Result<()> {
        self.enqueue(data)
    }

    #[inline]
    fn close(&self) {
        Connection::close(self);
    }
}

// ============================================================================
// CloseOnExit
// ============================================================================

/// Closes the connection when a pump ends, including by panic.
struct CloseOnExit(Connection);

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        self.0.close();
    }
}

// ============================================================================
// Tests
// ============================================================================
