//! Connection timing and sizing configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use duplex_socket::ConnectionConfig;
//!
//! let config = ConnectionConfig::new()
//!     .with_pong_wait(Duration::from_secs(30))
//!     .with_send_buffer(1024);
//!
//! // Ping period follows the liveness window (90%).
//! assert_eq!(config.ping_period, Duration::from_secs(27));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Deadline for a single write (or batched write) to complete.
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(5);

/// Liveness window: time allowed between heartbeat acknowledgements.
pub const DEFAULT_PONG_WAIT: Duration = Duration::from_secs(10);

/// Heartbeat period, 90% of the liveness window.
pub const DEFAULT_PING_PERIOD: Duration = Duration::from_secs(9);

/// Largest inbound message accepted, in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 8192;

/// Outbound queue capacity, in messages.
pub const DEFAULT_SEND_BUFFER: usize = 256;

// ============================================================================
// ConnectionConfig
// ============================================================================

/// Per-connection timing and sizing.
///
/// `ping_period` must stay below `pong_wait` so heartbeats reach the peer
/// before its read deadline expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Deadline applied to every write.
    pub write_wait: Duration,

    /// Liveness window refreshed by each heartbeat acknowledgement.
    pub pong_wait: Duration,

    /// Interval between heartbeat frames.
    pub ping_period: Duration,

    /// Read size limit for inbound messages.
    pub max_message_size: usize,

    /// Outbound queue capacity.
    pub send_buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            write_wait: DEFAULT_WRITE_WAIT,
            pong_wait: DEFAULT_PONG_WAIT,
            ping_period: DEFAULT_PING_PERIOD,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            send_buffer: DEFAULT_SEND_BUFFER,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionConfig {
    /// Sets the write deadline.
    #[inline]
    #[must_use]
    pub fn with_write_wait(mut self, write_wait: Duration) -> Self {
        self.write_wait = write_wait;
        self
    }

    /// Sets the liveness window and derives the ping period from it.
    #[inline]
    #[must_use]
    pub fn with_pong_wait(mut self, pong_wait: Duration) -> Self {
        self.pong_wait = pong_wait;
        self.ping_period = pong_wait * 9 / 10;
        self
    }

    /// Overrides the heartbeat period.
    #[inline]
    #[must_use]
    pub fn with_ping_period(mut self, ping_period: Duration) -> Self {
        self.ping_period = ping_period;
        self
    }

    /// Sets the inbound read size limit.
    #[inline]
    #[must_use]
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Sets the outbound queue capacity.
    #[inline]
    #[must_use]
    pub fn with_send_buffer(mut self, send_buffer: usize) -> Self {
        self.send_buffer = send_buffer;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionConfig {
    /// Checks the configuration for values the pumps cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a duration or size is zero, or if the
    /// ping period is not shorter than the liveness window.
    pub fn validate(&self) -> Result<()> {
        if self.write_wait.is_zero() {
            return Err(Error::config("write_wait must be non-zero"));
        }
        if self.ping_period.is_zero() {
            return Err(Error::config("ping_period must be non-zero"));
        }
        if self.ping_period >= self.pong_wait {
            return Err(Error::config(format!(
                "ping_period ({:?}) must be shorter than pong_wait ({:?})",
                self.ping_period, self.pong_wait
            )));
        }
        if self.max_message_size == 0 {
            return Err(Error::config("max_message_size must be non-zero"));
        }
        if self.send_buffer == 0 {
            return Err(Error::config("send_buffer must be non-zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
