//! Frames exchanged with the transport.

// ============================================================================
// Imports
// ============================================================================

use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

// ============================================================================
// Frame
// ============================================================================

/// One unit of data or control information on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Application payload.
    Data(Bytes),
    /// Heartbeat.
    Ping(Bytes),
    /// Heartbeat acknowledgement.
    Pong(Bytes),
    /// Closing handshake, with the peer's code and reason if any.
    Close(Option<CloseFrame>),
}

impl Frame {
    /// Creates an empty heartbeat frame.
    #[inline]
    #[must_use]
    pub fn ping() -> Self {
        Self::Ping(Bytes::new())
    }

    /// Creates a close frame with no code.
    #[inline]
    #[must_use]
    pub fn close() -> Self {
        Self::Close(None)
    }

    /// Returns `true` for ping, pong and close frames.
    #[inline]
    #[must_use]
    pub fn is_control(&self) -> bool {
        !matches!(self, Self::Data(_))
    }

    /// Returns `true` if this close frame ends the connection normally.
    ///
    /// A close without a code, `1000 Normal` and `1001 Going Away` are
    /// orderly; any other code, or a non-close frame, is not.
    #[must_use]
    pub fn is_orderly_close(&self) -> bool {
        match self {
            Self::Close(None) => true,
            Self::Close(Some(frame)) => matches!(frame.code, CloseCode::Normal | CloseCode::Away),
            _ => false,
        }
    }

    /// Converts a WebSocket message into a frame.
    ///
    /// Text messages are delivered as data. Raw frames are never produced
    /// while reading and map to `None`.
    #[must_use]
    pub fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::Binary(payload) => Some(Self::Data(payload)),
            Message::Text(text) => Some(Self::Data(Bytes::copy_from_slice(text.as_bytes()))),
            Message::Ping(payload) => Some(Self::Ping(payload)),
            Message::Pong(payload) => Some(Self::Pong(payload)),
            Message::Close(frame) => Some(Self::Close(frame)),
            Message::Frame(_) => None,
        }
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Data(payload) => Message::Binary(payload),
            Frame::Ping(payload) => Message::Ping(payload),
            Frame::Pong(payload) => Message::Pong(payload),
            Frame::Close(frame) => Message::Close(frame),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn close_with(code: CloseCode) -> Frame {
        Frame::Close(Some(CloseFrame {
            code,
            reason: "bye".into(),
        }))
    }

    #[test]
    fn test_orderly_close_codes() {
        assert!(Frame::close().is_orderly_close());
        assert!(close_with(CloseCode::Normal).is_orderly_close());
        assert!(close_with(CloseCode::Away).is_orderly_close());
    }

    #[test]
    fn test_unexpected_close_codes() {
        assert!(!close_with(CloseCode::Protocol).is_orderly_close());
        assert!(!close_with(CloseCode::Size).is_orderly_close());
        assert!(!close_with(CloseCode::Error).is_orderly_close());
        assert!(!Frame::ping().is_orderly_close());
    }

    #[test]
    fn test_text_becomes_data() {
        let frame = Frame::from_message(Message::Text("hello".into()));
        assert_eq!(frame, Some(Frame::Data(Bytes::from_static(b"hello"))));
    }

    #[test]
    fn test_control_frames() {
        assert!(Frame::ping().is_control());
        assert!(Frame::Pong(Bytes::new()).is_control());
        assert!(Frame::close().is_control());
        assert!(!Frame::Data(Bytes::new()).is_control());
    }

    #[test]
    fn test_data_becomes_binary_message() {
        let message = Message::from(Frame::Data(Bytes::from_static(b"\x01\x02")));
        assert_eq!(message, Message::Binary(Bytes::from_static(b"\x01\x02")));
    }
}
