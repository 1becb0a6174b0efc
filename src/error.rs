//! Error types for duplex connections.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use duplex_socket::{Connection, Error, Result};
//!
//! fn broadcast(peers: &[Connection], frame: &[u8]) -> Result<()> {
//!     for peer in peers {
//!         match peer.enqueue(frame.to_vec()) {
//!             Err(Error::BufferFull { .. }) => continue,
//!             other => other?,
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Establishment | [`Error::Upgrade`], [`Error::Config`] |
//! | Outbound queue | [`Error::ConnectionClosed`], [`Error::BufferFull`] |
//! | Deadlines | [`Error::ReadTimeout`], [`Error::WriteTimeout`] |
//! | Inbound | [`Error::MessageTooLarge`] |
//! | External | [`Error::Io`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::{Error as IoError, ErrorKind};
use std::result::Result as StdResult;
use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::error::ProtocolError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Establishment Errors
    // ========================================================================
    /// Connection establishment failed.
    ///
    /// Returned when the handshake fails, the origin is rejected, or the
    /// connection cannot be started. No pumps are running when this is
    /// returned.
    #[error("Upgrade failed: {message}")]
    Upgrade {
        /// Description of the upgrade failure.
        message: String,
    },

    /// Configuration error.
    ///
    /// Returned when connection or upgrader configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Outbound Queue Errors
    // ========================================================================
    /// Connection is shutting down or already closed.
    ///
    /// The message was not queued and will never be delivered.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Outbound queue had no free slot.
    ///
    /// The connection has already been shut down as a side effect.
    #[error("Send buffer full ({capacity} messages)")]
    BufferFull {
        /// Capacity of the outbound queue.
        capacity: usize,
    },

    // ========================================================================
    // Deadline Errors
    // ========================================================================
    /// No heartbeat acknowledgement arrived within the liveness window.
    #[error("Read deadline exceeded after {timeout_ms}ms")]
    ReadTimeout {
        /// Liveness window in milliseconds.
        timeout_ms: u64,
    },

    /// A write did not complete within the write deadline.
    #[error("Write deadline exceeded after {timeout_ms}ms")]
    WriteTimeout {
        /// Write deadline in milliseconds.
        timeout_ms: u64,
    },

    // ========================================================================
    // Inbound Errors
    // ========================================================================
    /// Inbound message exceeds the read size limit.
    #[error("Message of {size} bytes exceeds read limit of {limit} bytes")]
    MessageTooLarge {
        /// Size of the rejected message.
        size: usize,
        /// Configured read limit.
        limit: usize,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an upgrade error.
    #[inline]
    pub fn upgrade(message: impl Into<String>) -> Self {
        Self::Upgrade {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a buffer full error.
    #[inline]
    pub fn buffer_full(capacity: usize) -> Self {
        Self::BufferFull { capacity }
    }

    /// Creates a read timeout error.
    #[inline]
    pub fn read_timeout(timeout: Duration) -> Self {
        Self::ReadTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Creates a write timeout error.
    #[inline]
    pub fn write_timeout(timeout: Duration) -> Self {
        Self::WriteTimeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Creates a message too large error.
    #[inline]
    pub fn message_too_large(size: usize, limit: usize) -> Self {
        Self::MessageTooLarge { size, limit }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error means the peer went away.
    ///
    /// Expected disconnects are logged at debug level; everything else
    /// that ends a pump is a warning.
    #[must_use]
    pub fn is_expected_disconnect(&self) -> bool {
        match self {
            Self::WebSocket(WsError::ConnectionClosed | WsError::AlreadyClosed) => true,
            Self::WebSocket(WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)) => {
                true
            }
            Self::WebSocket(WsError::Io(e)) | Self::Io(e) => is_disconnect_kind(e.kind()),
            _ => false,
        }
    }

    /// Returns `true` if this is a deadline error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ReadTimeout { .. } | Self::WriteTimeout { .. })
    }

    /// Returns `true` if the connection is no longer usable.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed
                | Self::BufferFull { .. }
                | Self::ReadTimeout { .. }
                | Self::WriteTimeout { .. }
                | Self::WebSocket(_)
        )
    }
}

/// IO error kinds produced by a peer dropping the socket.
fn is_disconnect_kind(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
    )
}

// ============================================================================
// Tests
// ============================================================================
