//! One connection attempt, from handshake to teardown
//!
//! ```text
//! Connecting ──> Authenticating ──> Active ──> Closing
//!     │                │              │
//!     └────────────────┴──────────────┴──> SessionOutcome (exactly once)
//! ```
//!
//! While `Active`, the receive loop runs in the session's own task and the
//! heartbeat runs in a spawned child task. Both write through the same
//! [`FrameWriter`].

use crate::codec::{decode, encode, encode_heartbeat, Decoded, Opcode};
use crate::core::client::ClientEvent;
use crate::core::config::ClientConfig;
use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::core::heartbeat::spawn_heartbeat;
use crate::dispatch::{Dispatched, Dispatcher, SessionSignal};
use crate::traits::*;
use crossbeam_channel::Sender;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub(super) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on sending the close frame during teardown
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Write half of the transport, shared by the receive loop and the
/// heartbeat task
#[derive(Clone)]
pub(crate) struct FrameWriter {
    pub(super) sink: Arc<Mutex<SplitSink<WsStream, Message>>>,
    metrics: Arc<AtomicMetrics>,
}

impl FrameWriter {
    pub(super) fn new(sink: SplitSink<WsStream, Message>, metrics: Arc<AtomicMetrics>) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
            metrics,
        }
    }

    pub(crate) async fn send(&self, frame: Vec<u8>) -> Result<()> {
        self.sink
            .lock()
            .await
            .send(Message::Binary(frame))
            .await
            .map_err(|e| DanmuError::Transport(format!("send failed: {}", e)))?;
        self.metrics.increment_sent();
        Ok(())
    }

    async fn close(&self) {
        let mut sink = self.sink.lock().await;
        match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
            Ok(Ok(())) => debug!("Transport closed"),
            Ok(Err(e)) => debug!("Error while closing transport: {}", e),
            Err(_) => debug!("Timed out closing transport"),
        }
    }
}

/// How a session ended
#[derive(Debug)]
pub enum SessionOutcome {
    /// Cancelled from outside
    Stopped { reached_active: bool },
    Failed {
        error: DanmuError,
        reached_active: bool,
    },
}

impl SessionOutcome {
    pub fn reached_active(&self) -> bool {
        match self {
            SessionOutcome::Stopped { reached_active }
            | SessionOutcome::Failed { reached_active, .. } => *reached_active,
        }
    }
}

pub(crate) struct Session {
    credentials: RoomCredentials,
    config: Arc<ClientConfig>,
    dispatcher: Arc<Dispatcher>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    events: Sender<ClientEvent>,
    cancel: CancellationToken,
}

impl Session {
    pub(crate) fn new(
        credentials: RoomCredentials,
        config: Arc<ClientConfig>,
        dispatcher: Arc<Dispatcher>,
        state: Arc<AtomicConnectionState>,
        metrics: Arc<AtomicMetrics>,
        events: Sender<ClientEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            credentials,
            config,
            dispatcher,
            state,
            metrics,
            events,
            cancel,
        }
    }

    /// Drive the session to its end
    ///
    /// Returns `Stopped` only when the session's token was cancelled.
    pub(crate) async fn run(self) -> SessionOutcome {
        let room_id = self.credentials.room_id;

        self.state.set(ConnectionState::Connecting);
        let ws = match self.connect().await {
            Ok(Some(ws)) => ws,
            Ok(None) => return SessionOutcome::Stopped { reached_active: false },
            Err(error) => {
                return SessionOutcome::Failed {
                    error,
                    reached_active: false,
                }
            }
        };

        let (sink, mut read) = ws.split();
        let writer = FrameWriter::new(sink, Arc::clone(&self.metrics));

        self.state.set(ConnectionState::Authenticating);
        match self.authenticate(&writer, &mut read).await {
            Ok(true) => {}
            Ok(false) => {
                self.close(&writer).await;
                return SessionOutcome::Stopped { reached_active: false };
            }
            Err(error) => {
                self.close(&writer).await;
                return SessionOutcome::Failed {
                    error,
                    reached_active: false,
                };
            }
        }

        self.state.set(ConnectionState::Active);
        info!(room_id = room_id, "Session active");
        let _ = self.events.send(ClientEvent::Connected);

        let heartbeat_cancel = self.cancel.child_token();
        let heartbeat = spawn_heartbeat(
            self.config.timings.heartbeat_interval,
            writer.clone(),
            heartbeat_cancel.clone(),
        );

        let result = self.receive_loop(&writer, &mut read).await;

        heartbeat_cancel.cancel();
        if let Err(e) = heartbeat.await {
            warn!("Heartbeat task ended abnormally: {}", e);
        }
        self.close(&writer).await;

        match result {
            Ok(()) => SessionOutcome::Stopped { reached_active: true },
            Err(error) => SessionOutcome::Failed {
                error,
                reached_active: true,
            },
        }
    }

    /// `Ok(None)` when cancelled before the handshake finished
    async fn connect(&self) -> Result<Option<WsStream>> {
        let endpoint = self.credentials.preferred_endpoint().ok_or_else(|| {
            DanmuError::Transport(format!(
                "no endpoints for room {}",
                self.credentials.room_id
            ))
        })?;
        let url = endpoint.url(self.config.secure);
        let limit = self.config.timings.connect_timeout;

        info!(room_id = self.credentials.room_id, "Connecting to {}", url);

        tokio::select! {
            _ = self.cancel.cancelled() => Ok(None),
            result = tokio::time::timeout(limit, connect_async(url.as_str())) => match result {
                Ok(Ok((ws, _))) => Ok(Some(ws)),
                Ok(Err(e)) => Err(DanmuError::Transport(format!("connect to {} failed: {}", url, e))),
                Err(_) => Err(DanmuError::Transport(format!(
                    "connect to {} timed out after {:?}",
                    url, limit
                ))),
            }
        }
    }

    /// Send the auth frame and wait for the first reply
    ///
    /// `Ok(false)` when cancelled while waiting.
    async fn authenticate(
        &self,
        writer: &FrameWriter,
        read: &mut SplitStream<WsStream>,
    ) -> Result<bool> {
        let request = self.credentials.auth_request();
        writer.send(encode(Some(&request), Opcode::Auth)?).await?;
        debug!(room_id = request.roomid, "Sent auth frame");

        let limit = self.config.timings.auth_timeout;
        let deadline = tokio::time::Instant::now() + limit;

        loop {
            let reply = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(false),
                reply = tokio::time::timeout_at(deadline, read.next()) => reply,
            };

            match reply {
                Err(_) => return Err(DanmuError::AuthTimeout(limit)),
                Ok(None) => {
                    return Err(DanmuError::AuthFailed(
                        "connection closed before auth reply".into(),
                    ))
                }
                Ok(Some(Err(e))) => return Err(DanmuError::AuthFailed(e.to_string())),
                Ok(Some(Ok(Message::Binary(bytes)))) => {
                    let frames = decode(&bytes)
                        .map_err(|e| DanmuError::AuthFailed(format!("undecodable reply: {}", e)))?;
                    // Whatever came with the reply is processed like any later frame
                    self.handle_decoded(frames);
                    return Ok(true);
                }
                // Control frames are answered by the transport; keep waiting
                Ok(Some(Ok(message @ (Message::Ping(_) | Message::Pong(_))))) => {
                    debug!("Ignoring {} while waiting for auth reply", message_kind(&message));
                }
                Ok(Some(Ok(other))) => {
                    return Err(DanmuError::AuthFailed(format!(
                        "expected a binary reply, got {}",
                        message_kind(&other)
                    )))
                }
            }
        }
    }

    /// Runs until cancelled (`Ok`) or the transport fails (`Err`)
    async fn receive_loop(
        &self,
        writer: &FrameWriter,
        read: &mut SplitStream<WsStream>,
    ) -> Result<()> {
        let limit = self.config.timings.receive_timeout;

        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Session cancelled, leaving receive loop");
                    return Ok(());
                }
                next = tokio::time::timeout(limit, read.next()) => next,
            };

            match next {
                Err(_) => {
                    debug!("No frame for {:?}, sending a heartbeat", limit);
                    writer.send(encode_heartbeat()).await?;
                }
                Ok(None) => {
                    return Err(DanmuError::ConnectionClosed("stream ended".into()));
                }
                Ok(Some(Err(e))) => {
                    return Err(DanmuError::Transport(e.to_string()));
                }
                Ok(Some(Ok(Message::Binary(bytes)))) => match decode(&bytes) {
                    Ok(frames) => self.handle_decoded(frames),
                    Err(e) => {
                        warn!("Skipping malformed message ({} bytes): {}", bytes.len(), e);
                        self.metrics.increment_skipped();
                    }
                },
                Ok(Some(Ok(Message::Close(frame)))) => {
                    let reason = frame
                        .map(|f| format!("{} {}", f.code, f.reason))
                        .unwrap_or_else(|| "no close frame".into());
                    return Err(DanmuError::ConnectionClosed(reason));
                }
                Ok(Some(Ok(other))) => {
                    debug!("Ignoring {} message", message_kind(&other));
                }
            }
        }
    }

    fn handle_decoded(&self, frames: Vec<Decoded>) {
        for decoded in frames {
            let frame = match decoded {
                Decoded::Frame(frame) => frame,
                Decoded::Unsupported {
                    version,
                    opcode,
                    payload_len,
                } => {
                    debug!(
                        "Skipping frame with unsupported version {:?} (opcode {:?}, {} bytes)",
                        version, opcode, payload_len
                    );
                    self.metrics.increment_skipped();
                    continue;
                }
            };

            self.metrics.increment_received();

            match self.dispatcher.dispatch(&frame) {
                Dispatched::Event(event) => {
                    let kind = event.kind_name();
                    if self.config.event_tx.send(event).is_err() {
                        warn!(event = kind, "Sink channel closed, dropping event");
                    } else {
                        self.metrics.increment_dispatched();
                    }
                }
                Dispatched::Signal(SessionSignal::HeartbeatReply { popularity }) => {
                    debug!(popularity = popularity, "Heartbeat reply");
                    self.metrics.set_popularity(popularity);
                }
                Dispatched::Signal(SessionSignal::AuthReply { code }) => {
                    debug!(code = ?code, "Auth reply");
                }
                Dispatched::Ignored => {}
            }
        }
    }

    async fn close(&self, writer: &FrameWriter) {
        self.state.set(ConnectionState::Closing);
        writer.close().await;
    }
}

fn message_kind(message: &Message) -> &'static str {
    match message {
        Message::Text(_) => "text",
        Message::Binary(_) => "binary",
        Message::Ping(_) => "ping",
        Message::Pong(_) => "pong",
        Message::Close(_) => "close",
        Message::Frame(_) => "raw frame",
    }
}
