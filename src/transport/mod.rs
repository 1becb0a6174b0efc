//! Duplex transport layer.
//!
//! A [`Transport`] is an established, full-duplex, message-framed channel.
//! A connection splits it once into a [`FrameReader`], owned by the inbound
//! pump, and a [`FrameWriter`], owned by the outbound pump. Each direction
//! has exactly one owner, so neither half needs a lock.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  accept + handshake  ┌──────────────┐  split   ┌──────────────┐
//! │    Server    │ ───────────────────► │   Upgrader   │ ───────► │  Connection  │
//! │ (TcpListener)│                      │ (origin, cfg)│          │ reader/writer│
//! └──────────────┘                      └──────────────┘          └──────────────┘
//! ```
//!
//! Deadlines are not part of the traits: the pumps bound every read and
//! write with `tokio::time`. Heartbeat acknowledgements surface as
//! [`Frame::Pong`] on the reader.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Data and control frames |
//! | `websocket` | [`Transport`] for `tokio-tungstenite` streams |
//! | `upgrade` | Server handshake with origin policy |
//! | `server` | TCP listener producing connections |

// ============================================================================
// Submodules
// ============================================================================

/// Data and control frames.
pub mod frame;

/// TCP server accepting WebSocket connections.
pub mod server;

/// WebSocket server handshake.
pub mod upgrade;

/// `tokio-tungstenite` transport.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::Frame;
pub use server::Server;
pub use upgrade::{OriginCheck, Upgrader, UpgraderConfig};
pub use websocket::{WsReader, WsWriter};

// ============================================================================
// Traits
// ============================================================================

/// An established duplex channel that can be split into its two directions.
pub trait Transport: Send + 'static {
    /// Read half.
    type Reader: FrameReader;
    /// Write half.
    type Writer: FrameWriter;

    /// Splits the transport into independently owned halves.
    fn split(self) -> (Self::Reader, Self::Writer);
}

/// Read half of a transport.
#[async_trait]
pub trait FrameReader: Send + 'static {
    /// Reads the next frame.
    ///
    /// Returns `Ok(None)` once the stream has ended. Must be cancel-safe:
    /// the inbound pump races it against its deadline and the shutdown
    /// signal.
    async fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Sets the largest data frame the reader accepts.
    ///
    /// Larger frames fail the read with
    /// [`Error::MessageTooLarge`](crate::Error::MessageTooLarge).
    fn set_read_limit(&mut self, limit: usize);
}

/// Write half of a transport.
#[async_trait]
pub trait FrameWriter: Send + 'static {
    /// Buffers a frame without flushing it.
    async fn feed(&mut self, frame: Frame) -> Result<()>;

    /// Flushes every buffered frame to the peer.
    async fn flush(&mut self) -> Result<()>;

    /// Writes one frame and flushes it.
    async fn send(&mut self, frame: Frame) -> Result<()> {
        self.feed(frame).await?;
        self.flush().await
    }

    /// Closes the transport unconditionally.
    async fn close(&mut self) -> Result<()>;
}
