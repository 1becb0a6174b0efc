//! WebSocket server handshake.
//!
//! The [`Upgrader`] turns an accepted byte stream into a running
//! [`Connection`]. Its policy lives in an explicit [`UpgraderConfig`]
//! rather than in process-wide state, so different listeners can apply
//! different origin rules and buffer sizes.
//!
//! # Example
//!
//! ```ignore
//! use duplex_socket::transport::{Upgrader, UpgraderConfig};
//!
//! let upgrader = Upgrader::new(
//!     UpgraderConfig::new()
//!         .with_origin_check(|origin| origin == Some("https://galaxy.example")),
//! );
//!
//! let connection = upgrader.upgrade(tcp_stream, |payload| {
//!     println!("received {} bytes", payload.len());
//! }).await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{StatusCode, header};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::handler::MessageHandler;

// ============================================================================
// Constants
// ============================================================================

/// Default socket read buffer size in bytes.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Default socket write buffer size in bytes.
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 1024;

/// Default time allowed for the client to complete the handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Types
// ============================================================================

/// Origin validation predicate.
///
/// Receives the request's `Origin` header, or `None` if it has none.
/// Returns `true` to allow the upgrade.
pub type OriginCheck = Arc<dyn Fn(Option<&str>) -> bool + Send + Sync>;

// ============================================================================
// UpgraderConfig
// ============================================================================

/// Handshake policy and sizing for accepted connections.
#[derive(Clone)]
pub struct UpgraderConfig {
    /// Socket read buffer size.
    pub read_buffer_size: usize,

    /// Socket write buffer size.
    pub write_buffer_size: usize,

    /// Time allowed for the handshake.
    pub handshake_timeout: Duration,

    /// Configuration for connections produced by this upgrader.
    pub connection: ConnectionConfig,

    /// Origin predicate. `None` accepts every origin.
    pub check_origin: Option<OriginCheck>,
}

impl fmt::Debug for UpgraderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpgraderConfig")
            .field("read_buffer_size", &self.read_buffer_size)
            .field("write_buffer_size", &self.write_buffer_size)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("connection", &self.connection)
            .field("check_origin", &self.check_origin.is_some())
            .finish()
    }
}

impl Default for UpgraderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl UpgraderConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            connection: ConnectionConfig::new(),
            check_origin: None,
        }
    }

    /// Sets the socket read buffer size.
    #[inline]
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Sets the socket write buffer size.
    #[inline]
    #[must_use]
    pub fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    /// Sets the configuration for produced connections.
    #[inline]
    #[must_use]
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    /// Installs an origin predicate.
    #[inline]
    #[must_use]
    pub fn with_origin_check<F>(mut self, check: F) -> Self
    where
        F: Fn(Option<&str>) -> bool + Send + Sync + 'static,
    {
        self.check_origin = Some(Arc::new(check));
        self
    }

    /// Builds the WebSocket protocol configuration.
    ///
    /// The message and frame limits follow the connection's read limit so
    /// oversized frames are refused before they are buffered.
    #[must_use]
    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig::default()
            .read_buffer_size(self.read_buffer_size)
            .write_buffer_size(self.write_buffer_size)
            .max_message_size(Some(self.connection.max_message_size))
            .max_frame_size(Some(self.connection.max_message_size))
    }

    /// Returns `true` if the origin passes the configured predicate.
    #[must_use]
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        self.check_origin
            .as_ref()
            .is_none_or(|check| check(origin))
    }
}

// ============================================================================
// Upgrader
// ============================================================================

/// Performs the server handshake and opens connections.
#[derive(Debug, Clone, Default)]
pub struct Upgrader {
    /// Handshake policy.
    config: UpgraderConfig,
}

impl Upgrader {
    /// Creates an upgrader with the given configuration.
    #[inline]
    #[must_use]
    pub fn new(config: UpgraderConfig) -> Self {
        Self { config }
    }

    /// Returns the upgrader configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &UpgraderConfig {
        &self.config
    }

    /// Completes the handshake on `stream` and opens a [`Connection`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upgrade`] if the handshake fails, times out, the
    /// origin is rejected, or the connection cannot be opened. No pumps are
    /// running when an error is returned.
    pub async fn upgrade<S, H>(&self, stream: S, handler: H) -> Result<Connection>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        H: MessageHandler,
    {
        self.config.connection.validate()?;

        let config = &self.config;
        let callback = |request: &Request, response: Response| {
            let origin = request
                .headers()
                .get(header::ORIGIN)
                .and_then(|value| value.to_str().ok());

            if config.origin_allowed(origin) {
                Ok(response)
            } else {
                warn!(?origin, "Origin rejected");
                Err(forbidden("origin not allowed"))
            }
        };

        let handshake = accept_hdr_async_with_config(
            stream,
            callback,
            Some(self.config.websocket_config()),
        );

        let ws_stream = timeout(self.config.handshake_timeout, handshake)
            .await
            .map_err(|_| {
                Error::upgrade(format!(
                    "handshake timed out after {}ms",
                    self.config.handshake_timeout.as_millis()
                ))
            })?
            .map_err(|e| Error::upgrade(format!("WebSocket handshake failed: {e}")))?;

        debug!("WebSocket handshake completed");

        Connection::open_with_config(ws_stream, handler, self.config.connection)
    }
}

/// Builds a `403 Forbidden` handshake rejection.
fn forbidden(reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_owned()));
    *response.status_mut() = StatusCode::FORBIDDEN;
    response
}

// ============================================================================
// Tests
// ============================================================================
