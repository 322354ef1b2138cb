//! Heartbeat task of an active session
//!
//! ```text
//! ┌─────────────────────┐
//! │  Heartbeat Task     │
//! │  (Tokio spawn)      │
//! │                     │
//! │  Immediately, then  │
//! │  every interval:    │
//! │  send heartbeat ────┼──> FrameWriter (shared with receive loop) ──> WebSocket
//! └─────────────────────┘
//! ```
//!
//! The task ends when its token is cancelled, even mid-send, or when a
//! send fails. A failed send is not reported: the receive loop notices
//! the broken transport on its own.

use crate::codec::encode_heartbeat;
use crate::core::session::FrameWriter;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub(crate) async fn heartbeat_task(
    interval: Duration,
    writer: FrameWriter,
    cancel: CancellationToken,
) {
    // First tick completes immediately, so the first heartbeat goes out
    // as soon as the session turns active
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    debug!("Heartbeat task started with interval: {:?}", interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Heartbeat task cancelled");
                break;
            }
            _ = ticker.tick() => {
                // A send blocks while the peer is not reading
                let sent = tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Heartbeat task cancelled while sending");
                        break;
                    }
                    sent = writer.send(encode_heartbeat()) => sent,
                };
                if let Err(e) = sent {
                    debug!("Heartbeat send failed, stopping: {}", e);
                    break;
                }
                debug!("Heartbeat sent");
            }
        }
    }

    debug!("Heartbeat task exiting");
}

/// Spawn the heartbeat task for one session
pub(crate) fn spawn_heartbeat(
    interval: Duration,
    writer: FrameWriter,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(heartbeat_task(interval, writer, cancel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connection_state::AtomicMetrics;
    use futures::StreamExt;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn loopback_writer(metrics: Arc<AtomicMetrics>) -> FrameWriter {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            // Keep the peer open without reading
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(ws);
        });

        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
            .await
            .unwrap();
        let (sink, _read) = ws.split();
        drop(server);
        FrameWriter::new(sink, metrics)
    }

    #[tokio::test]
    async fn test_cancel_interrupts_blocked_send() {
        let metrics = Arc::new(AtomicMetrics::new());
        let writer = loopback_writer(Arc::clone(&metrics)).await;

        // Holding the write half blocks every send
        let guard = writer.sink.lock().await;

        let cancel = CancellationToken::new();
        let task = spawn_heartbeat(Duration::from_millis(10), writer.clone(), cancel.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        cancel.cancel();
        let finished = tokio::time::timeout(Duration::from_secs(1), task).await;
        assert!(finished.is_ok(), "heartbeat task ignored cancellation");
        assert_eq!(metrics.frames_sent(), 0);

        drop(guard);
    }

    #[tokio::test]
    async fn test_first_beat_is_sent_immediately() {
        let metrics = Arc::new(AtomicMetrics::new());
        let writer = loopback_writer(Arc::clone(&metrics)).await;

        let cancel = CancellationToken::new();
        let task = spawn_heartbeat(Duration::from_secs(60), writer, cancel.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(metrics.frames_sent(), 1);
    }
}
