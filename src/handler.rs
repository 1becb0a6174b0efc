//! Application-facing capabilities.
//!
//! [`MessageHandler`] receives inbound data frames; [`MessageSender`] is the
//! narrow sending surface application code can depend on instead of a
//! concrete [`Connection`](crate::Connection).

// ============================================================================
// Imports
// ============================================================================

use bytes::Bytes;

use crate::error::Result;

// ============================================================================
// MessageHandler
// ============================================================================

/// Receives the payload of every inbound data frame.
///
/// Called inline on the inbound pump, one frame at a time, in arrival order.
/// Implementations must not block for long: while the handler runs nothing
/// else is read, including heartbeat acknowledgements. Hand longer work off
/// to a channel or task.
///
/// Any `Fn(Bytes) + Send + Sync + 'static` closure is a handler.
pub trait MessageHandler: Send + Sync + 'static {
    /// Handles one inbound message.
    fn handle(&self, payload: Bytes);
}

impl<F> MessageHandler for F
where
    F: Fn(Bytes) + Send + Sync + 'static,
{
    #[inline]
    fn handle(&self, payload: Bytes) {
        self(payload)
    }
}

// ============================================================================
// MessageSender
// ============================================================================

/// Sends binary messages to a peer.
pub trait MessageSender: Send + Sync {
    /// Queues a binary message for delivery.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the peer is gone
    /// - [`Error::BufferFull`](crate::Error::BufferFull) if the peer cannot keep up
    fn send_binary(&self, data: Bytes) -> Result<()>;

    /// Closes the underlying connection.
    fn close(&self);
}

// ============================================================================
// Tests
// ============================================================================
