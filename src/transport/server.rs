//! TCP server accepting WebSocket connections.
//!
//! # Connection Flow
//!
//! 1. Bind the listener (`port` 0 picks a random port)
//! 2. Client opens a TCP connection and sends the upgrade request
//! 3. [`Upgrader`] validates the origin and completes the handshake
//! 4. A [`Connection`] starts its pumps and is returned to the caller

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};

use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::connection::Connection;
use crate::error::Result;
use crate::handler::MessageHandler;

use super::Upgrader;

// ============================================================================
// Server
// ============================================================================

/// A bound WebSocket server.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use duplex_socket::transport::{Server, Upgrader};
///
/// let server = Server::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, Upgrader::default()).await?;
/// println!("listening on {}", server.ws_url());
///
/// loop {
///     let connection = server.accept(|payload| handle(payload)).await?;
///     tokio::spawn(run_session(connection));
/// }
/// ```
pub struct Server {
    /// TCP listener for incoming connections.
    listener: TcpListener,
    /// Address the server is bound to.
    local_addr: SocketAddr,
    /// Handshake policy.
    upgrader: Upgrader,
}

impl Server {
    /// Binds a server to the specified address and port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if binding fails.
    pub async fn bind(ip: IpAddr, port: u16, upgrader: Upgrader) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let local_addr = listener.local_addr()?;

        info!(%local_addr, "WebSocket server bound");

        Ok(Self {
            listener,
            local_addr,
            upgrader,
        })
    }

    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Returns the local socket address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the WebSocket URL for this server.
    ///
    /// Format: `ws://{ip}:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Returns the upgrader used for accepted connections.
    #[inline]
    #[must_use]
    pub fn upgrader(&self) -> &Upgrader {
        &self.upgrader
    }

    /// Accepts the next client and upgrades it.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`](crate::Error::Io) if accepting the TCP connection fails
    /// - [`Error::Upgrade`](crate::Error::Upgrade) if the handshake fails or the origin is rejected
    pub async fn accept<H>(&self, handler: H) -> Result<Connection>
    where
        H: MessageHandler,
    {
        let (stream, addr) = self.listener.accept().await?;
        debug!(%addr, "TCP connection accepted");

        stream.set_nodelay(true)?;

        let connection = self
            .upgrader
            .upgrade(stream, handler)
            .await
            .inspect_err(|e| debug!(%addr, error = %e, "Upgrade failed"))?;

        info!(%addr, id = %connection.id(), "WebSocket connection established");

        Ok(connection)
    }
}

// ============================================================================
// Tests
// ============================================================================
