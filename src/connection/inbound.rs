//! Inbound pump: the only reader of the transport.

// ============================================================================
// Imports
// ============================================================================

use tokio::time::{Instant, timeout_at};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::handler::MessageHandler;
use crate::transport::{Frame, FrameReader};

use super::{CloseOnExit, Connection};

// ============================================================================
// InboundExit
// ============================================================================

/// Why the inbound pump stopped.
#[derive(Debug)]
enum InboundExit {
    /// The connection was closed locally.
    Shutdown,
    /// The stream ended.
    EndOfStream,
    /// The peer sent a close frame.
    PeerClosed(Option<CloseFrame>),
    /// Reading failed or the liveness deadline passed.
    Failed(Error),
}

impl InboundExit {
    /// Returns `true` for ordinary disconnects that deserve no warning.
    fn is_expected(&self) -> bool {
        match self {
            Self::Shutdown | Self::EndOfStream => true,
            Self::PeerClosed(frame) => Frame::Close(frame.clone()).is_orderly_close(),
            Self::Failed(e) => e.is_expected_disconnect(),
        }
    }

    fn log(&self) {
        match self {
            Self::Shutdown => debug!("Inbound pump stopped by shutdown"),
            Self::EndOfStream => debug!("Peer disconnected"),
            Self::PeerClosed(frame) if self.is_expected() => {
                debug!(?frame, "Peer closed connection");
            }
            Self::PeerClosed(frame) => {
                warn!(?frame, "Peer closed connection unexpectedly");
            }
            Self::Failed(e) if self.is_expected() => debug!(error = %e, "Peer disconnected"),
            Self::Failed(e) => warn!(error = %e, "Inbound pump failed"),
        }
    }
}

// ============================================================================
// Pump
// ============================================================================

/// Reads frames until the connection ends, then closes it.
///
/// Each read is bounded by the liveness deadline, which starts at
/// `pong_wait` from now and is pushed out again by every heartbeat
/// acknowledgement.
pub(super) async fn run<R, H>(connection: Connection, mut reader: R, handler: H)
where
    R: FrameReader,
    H: MessageHandler,
{
    let _close = CloseOnExit(connection.clone());
    let config = *connection.config();
    let shutdown = connection.shutdown_signal();

    reader.set_read_limit(config.max_message_size);
    let mut deadline = Instant::now() + config.pong_wait;

    let exit = loop {
        let read = tokio::select! {
            biased;
            () = shutdown.cancelled() => break InboundExit::Shutdown,
            read = timeout_at(deadline, reader.read_frame()) => read,
        };

        match read {
            Err(_elapsed) => break InboundExit::Failed(Error::read_timeout(config.pong_wait)),
            Ok(Err(e)) => break InboundExit::Failed(e),
            Ok(Ok(None)) => break InboundExit::EndOfStream,
            Ok(Ok(Some(Frame::Close(frame)))) => break InboundExit::PeerClosed(frame),
            Ok(Ok(Some(Frame::Data(payload)))) => {
                trace!(len = payload.len(), "Message received");
                handler.handle(payload);
            }
            Ok(Ok(Some(Frame::Pong(_)))) => {
                deadline = Instant::now() + config.pong_wait;
                trace!("Heartbeat acknowledged");
            }
            Ok(Ok(Some(Frame::Ping(_)))) => trace!("Ping received"),
        }
    };

    exit.log();
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use parking_lot::Mutex;
    use tokio::time::sleep;
    use tokio_tungstenite::tungstenite::Error as WsError;
    use tokio_tungstenite::tungstenite::error::ProtocolError;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    use crate::config::ConnectionConfig;
    use crate::connection::mock::{MockHandle, MockTransport, capture_logs, settle};

    type Received = Arc<Mutex<Vec<Bytes>>>;

    fn open_recording(config: ConnectionConfig) -> (Connection, MockHandle, Received) {
        let (transport, handle) = MockTransport::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let connection = Connection::open_with_config(
            transport,
            move |payload: Bytes| sink.lock().push(payload),
            config,
        )
        .expect("open");
        (connection, handle, received)
    }

    fn close_frame(code: CloseCode) -> Frame {
        Frame::Close(Some(CloseFrame {
            code,
            reason: "".into(),
        }))
    }

    fn exploding_handler(_payload: Bytes) {
        panic!("handler bug");
    }

    #[test]
    fn test_exit_classification() {
        assert!(InboundExit::Shutdown.is_expected());
        assert!(InboundExit::EndOfStream.is_expected());
        assert!(InboundExit::PeerClosed(None).is_expected());
        assert!(
            InboundExit::Failed(Error::WebSocket(WsError::Protocol(
                ProtocolError::ResetWithoutClosingHandshake
            )))
            .is_expected()
        );

        let protocol = CloseFrame {
            code: CloseCode::Protocol,
            reason: "".into(),
        };
        assert!(!InboundExit::PeerClosed(Some(protocol)).is_expected());
        assert!(!InboundExit::Failed(Error::read_timeout(Duration::from_secs(10))).is_expected());
        assert!(!InboundExit::Failed(Error::message_too_large(9000, 8192)).is_expected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_data_frames_reach_handler_in_order() {
        let (connection, handle, received) = open_recording(ConnectionConfig::default());

        handle.push(Frame::Data(Bytes::from_static(b"first")));
        handle.push(Frame::Ping(Bytes::new()));
        handle.push(Frame::Pong(Bytes::new()));
        handle.push(Frame::Data(Bytes::from_static(b"second")));
        settle().await;

        assert_eq!(
            *received.lock(),
            vec![Bytes::from_static(b"first"), Bytes::from_static(b"second")]
        );
        assert!(!connection.is_closed());
        connection.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_limit_applied() {
        let config = ConnectionConfig::new().with_max_message_size(1024);
        let (connection, handle, _received) = open_recording(config);
        settle().await;

        assert_eq!(handle.read_limit(), Some(1024));
        connection.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_extends_deadline() {
        let config = ConnectionConfig::default();
        let (connection, handle, _received) = open_recording(config);

        // Acknowledge well inside every window for three windows' worth.
        for _ in 0..6 {
            sleep(config.pong_wait / 2).await;
            handle.push(Frame::Pong(Bytes::new()));
        }
        settle().await;
        assert!(!connection.is_closed());

        // Stop acknowledging; the connection dies one window later.
        sleep(config.pong_wait + Duration::from_millis(1)).await;
        assert!(connection.is_closed());
        connection.closed().await;
        assert_eq!(handle.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_data_does_not_extend_deadline() {
        let config = ConnectionConfig::default();
        let (connection, handle, received) = open_recording(config);

        for _ in 0..4 {
            sleep(config.pong_wait / 4).await;
            handle.push(Frame::Data(Bytes::from_static(b"chatter")));
        }
        settle().await;

        assert!(connection.is_closed());
        assert!(received.lock().len() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_orderly_close_logged_at_debug() {
        let logs = capture_logs();
        let (connection, handle, _received) = open_recording(ConnectionConfig::default());

        handle.push(close_frame(CloseCode::Away));
        connection.closed().await;

        assert!(logs.contains("Peer closed connection"));
        assert!(!logs.contains("WARN"), "logs: {}", logs.contents());
        assert_eq!(handle.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abnormal_close_code_logged_at_warn() {
        let logs = capture_logs();
        let (connection, handle, _received) = open_recording(ConnectionConfig::default());

        handle.push(close_frame(CloseCode::Protocol));
        connection.closed().await;

        assert!(logs.contains("WARN"));
        assert!(logs.contains("Peer closed connection unexpectedly"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_without_handshake_is_quiet() {
        let logs = capture_logs();
        let (connection, handle, _received) = open_recording(ConnectionConfig::default());

        handle.push_error(Error::WebSocket(WsError::Protocol(
            ProtocolError::ResetWithoutClosingHandshake,
        )));
        connection.closed().await;

        assert!(!logs.contains("WARN"), "logs: {}", logs.contents());
        assert!(logs.contains("Peer disconnected"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_of_stream_closes() {
        let (connection, handle, _received) = open_recording(ConnectionConfig::default());

        handle.end();
        connection.closed().await;

        assert!(connection.is_closed());
        assert_eq!(handle.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_panic_still_closes() {
        let (transport, handle) = MockTransport::new();
        let connection = Connection::open(transport, exploding_handler).expect("open");

        handle.push(Frame::Data(Bytes::from_static(b"boom")));
        connection.closed().await;

        assert!(connection.is_closed());
        assert_eq!(handle.closes(), 1);
    }
}
