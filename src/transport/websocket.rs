//! [`Transport`] implementation for `tokio-tungstenite` streams.
//!
//! The stream is split with `futures_util` into a read half and a write
//! half. Ping frames are answered by tungstenite itself; the reader still
//! yields them so callers can observe traffic.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::trace;

use crate::error::{Error, Result};

use super::{Frame, FrameReader, FrameWriter, Transport};

// ============================================================================
// Transport
// ============================================================================

impl<S> Transport for WebSocketStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    type Reader = WsReader<S>;
    type Writer = WsWriter<S>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (sink, stream) = StreamExt::split(self);
        (
            WsReader {
                stream,
                read_limit: None,
            },
            WsWriter { sink },
        )
    }
}

// ============================================================================
// WsReader
// ============================================================================

/// Read half of a WebSocket stream.
///
/// The read limit is checked once tungstenite has assembled the whole
/// message. Only streams accepted through [`Upgrader`](super::Upgrader)
/// also carry the limit in their `WebSocketConfig`, which refuses
/// oversized frames before they are buffered. A stream built elsewhere
/// buffers up to its own configured maximum first.
pub struct WsReader<S> {
    /// Incoming message stream.
    stream: SplitStream<WebSocketStream<S>>,
    /// Largest accepted data frame.
    read_limit: Option<usize>,
}

#[async_trait]
impl<S> FrameReader for WsReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            let message = match self.stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => return Err(Error::WebSocket(e)),
                None => return Ok(None),
            };

            let Some(frame) = Frame::from_message(message) else {
                continue;
            };

            if let (Frame::Data(payload), Some(limit)) = (&frame, self.read_limit)
                && payload.len() > limit
            {
                return Err(Error::message_too_large(payload.len(), limit));
            }

            trace!(control = frame.is_control(), "Frame read");
            return Ok(Some(frame));
        }
    }

    fn set_read_limit(&mut self, limit: usize) {
        self.read_limit = Some(limit);
    }
}

// ============================================================================
// WsWriter
// ============================================================================

/// Write half of a WebSocket stream.
pub struct WsWriter<S> {
    /// Outgoing message sink.
    sink: SplitSink<WebSocketStream<S>, Message>,
}

#[async_trait]
impl<S> FrameWriter for WsWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn feed(&mut self, frame: Frame) -> Result<()> {
        self.sink.feed(Message::from(frame)).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.sink.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        match self.sink.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
