//! Outbound pump: the only writer of the transport.
//!
//! Queue traffic is polled before the heartbeat timer, so a tick that lands
//! while messages are pending waits for the batch to be written. Payload
//! and heartbeat writes are never interleaved.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::transport::{Frame, FrameWriter};

use super::{CloseOnExit, Connection};

// ============================================================================
// OutboundExit
// ============================================================================

/// Why the outbound pump stopped.
#[derive(Debug)]
enum OutboundExit {
    /// The connection was closed locally.
    Shutdown,
    /// A write failed or missed its deadline.
    Failed(Error),
}

impl OutboundExit {
    fn log(&self) {
        match self {
            Self::Shutdown => debug!("Outbound pump stopped by shutdown"),
            Self::Failed(e) if e.is_expected_disconnect() => {
                debug!(error = %e, "Peer gone during write");
            }
            Self::Failed(e) => warn!(error = %e, "Outbound pump failed"),
        }
    }
}

// ============================================================================
// Pump
// ============================================================================

/// Writes queued messages and heartbeats until the connection ends.
///
/// A tick that falls due while a batch is pending is not skipped: its ping
/// goes out right after the batch.
///
/// On exit the transport is closed, which sends the close frame, and the
/// connection shut down.
pub(super) async fn run<W>(
    connection: Connection,
    mut writer: W,
    mut queue: mpsc::Receiver<Bytes>,
) where
    W: FrameWriter,
{
    let _close = CloseOnExit(connection.clone());
    let config = *connection.config();
    let shutdown = connection.shutdown_signal();

    let mut heartbeat = interval_at(Instant::now() + config.ping_period, config.ping_period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let exit = loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => break OutboundExit::Shutdown,

            // The queue is only closed by `close`, after the signal fires.
            Some(message) = queue.recv() => {
                let batch = write_batch(&mut writer, &mut queue, message);
                match with_deadline(config.write_wait, batch).await {
                    Ok(count) => trace!(count, "Batch written"),
                    Err(e) => break OutboundExit::Failed(e),
                }
            }

            _ = heartbeat.tick() => {
                let ping = writer.send(Frame::ping());
                if let Err(e) = with_deadline(config.write_wait, ping).await {
                    break OutboundExit::Failed(e);
                }
                trace!("Heartbeat sent");
            }
        }
    };

    drop(heartbeat);
    exit.log();

    if let Err(e) = with_deadline(config.write_wait, writer.close()).await {
        debug!(error = %e, "Transport close failed");
    }
}

/// Writes `first` and the messages queued behind it when the batch starts,
/// then flushes once.
///
/// Messages enqueued while the batch is being written wait for the next
/// one, so a steady producer cannot stretch a batch past its deadline.
///
/// Returns the number of messages written.
async fn write_batch<W>(
    writer: &mut W,
    queue: &mut mpsc::Receiver<Bytes>,
    first: Bytes,
) -> Result<usize>
where
    W: FrameWriter,
{
    let pending = queue.len();
    writer.feed(Frame::Data(first)).await?;

    let mut count = 1;
    for _ in 0..pending {
        let Ok(message) = queue.try_recv() else {
            break;
        };
        writer.feed(Frame::Data(message)).await?;
        count += 1;
    }

    writer.flush().await?;
    Ok(count)
}

/// Bounds a write by the write deadline.
async fn with_deadline<T, F>(wait: Duration, write: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    timeout(wait, write)
        .await
        .map_err(|_| Error::write_timeout(wait))?
}

// ============================================================================
// Tests
// ============================================================================
