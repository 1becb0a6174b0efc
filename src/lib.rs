//! Duplex Socket - connection lifecycle and backpressure core for realtime servers.
//!
//! This library runs one bidirectional, message-oriented WebSocket
//! connection: an inbound pump feeding a handler, an outbound pump draining
//! a bounded queue, heartbeats that keep both sides honest, and a teardown
//! that runs exactly once however the connection ends.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────── Connection ────────────────────┐
//!                 │                                                    │
//!  enqueue() ───► │  bounded queue ──► outbound pump ──► FrameWriter ──┼──► peer
//!                 │                      ▲ heartbeat                   │
//!                 │            shutdown signal (one-shot)              │
//!                 │                      ▼                             │
//!  handler  ◄──── │  inbound pump ◄── FrameReader ◄────────────────────┼──── peer
//!                 └────────────────────────────────────────────────────┘
//! ```
//!
//! Key design principles:
//!
//! - Each direction of the transport has exactly one owner (no locks)
//! - `enqueue` never waits; a full queue closes the connection
//! - Liveness is enforced by a read deadline refreshed only by pongs
//! - Either pump exiting closes the whole connection
//!
//! # Quick Start
//!
//! ```no_run
//! use std::net::{IpAddr, Ipv4Addr};
//!
//! use duplex_socket::transport::{Server, Upgrader};
//! use duplex_socket::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = Server::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080, Upgrader::default()).await?;
//!
//!     loop {
//!         let connection = server
//!             .accept(|payload: bytes::Bytes| println!("{} bytes in", payload.len()))
//!             .await?;
//!
//!         connection.enqueue(b"welcome".to_vec())?;
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`connection`] | [`Connection`] facade and its pumps |
//! | [`config`] | [`ConnectionConfig`] timing and sizing |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`handler`] | [`MessageHandler`] and [`MessageSender`] |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`transport`] | Frames, transport traits, WebSocket server |

// ============================================================================
// Modules
// ============================================================================

/// Connection timing and sizing.
pub mod config;

/// Per-connection duplex pump.
///
/// [`Connection`] owns the outbound queue, the shutdown signal and both
/// pump tasks.
pub mod connection;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Application-facing capabilities.
pub mod handler;

/// Type-safe identifiers.
pub mod identifiers;

/// Transport layer.
///
/// Frame abstraction, `tokio-tungstenite` implementation, handshake and
/// server.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Connection types
pub use connection::{Connection, ConnectionState};

// Configuration
pub use config::ConnectionConfig;

// Error types
pub use error::{Error, Result};

// Handler types
pub use handler::{MessageHandler, MessageSender};

// Identifier types
pub use identifiers::ConnectionId;

// Transport types
pub use transport::{Frame, Server, Upgrader, UpgraderConfig};
