//! Common test utilities for danmu integration tests
//!
//! Provides a mock danmu server speaking just enough of the protocol:
//! it records the auth frame, answers it, then behaves as configured.

#![allow(dead_code)]

use danmu::{Endpoint, RoomCredentials};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use futures::{SinkExt, StreamExt};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

pub const OP_HEARTBEAT: u32 = 2;
pub const OP_HEARTBEAT_REPLY: u32 = 3;
pub const OP_MESSAGE: u32 = 5;
pub const OP_AUTH: u32 = 7;
pub const OP_AUTH_REPLY: u32 = 8;

/// Raw frame bytes, built by hand so tests don't depend on the encoder
pub fn raw_frame(version: u16, opcode: u32, payload: &[u8]) -> Vec<u8> {
    let total = (16 + payload.len()) as u32;
    let mut out = Vec::with_capacity(total as usize);
    out.extend_from_slice(&total.to_be_bytes());
    out.extend_from_slice(&16u16.to_be_bytes());
    out.extend_from_slice(&version.to_be_bytes());
    out.extend_from_slice(&opcode.to_be_bytes());
    out.extend_from_slice(&1u32.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Plain message frame carrying `value` as JSON
pub fn message_frame(value: &serde_json::Value) -> Vec<u8> {
    raw_frame(0, OP_MESSAGE, value.to_string().as_bytes())
}

/// Version-2 frame whose compressed body is `inner` (usually several frames)
pub fn zlib_frame(inner: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(inner).unwrap();
    let compressed = encoder.finish().unwrap();
    raw_frame(2, OP_MESSAGE, &compressed)
}

pub fn heartbeat_reply(popularity: u32) -> Vec<u8> {
    raw_frame(1, OP_HEARTBEAT_REPLY, &popularity.to_be_bytes())
}

/// Frame whose header claims `extra` more bytes than it carries
pub fn overlong_frame(extra: u32) -> Vec<u8> {
    let mut frame = raw_frame(0, OP_MESSAGE, br#"{"cmd":"LIVE"}"#);
    let declared = frame.len() as u32 + extra;
    frame[..4].copy_from_slice(&declared.to_be_bytes());
    frame
}

pub fn auth_reply() -> Vec<u8> {
    raw_frame(1, OP_AUTH_REPLY, br#"{"code":0}"#)
}

/// Chat line as the platform sends it (with a protocol suffix on `cmd`)
pub fn chat_json(uid: u64, uname: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "cmd": "DANMU_MSG:4:0:2:2:2:0",
        "info": [
            [0, 1, 25, 16777215, 1_700_000_000_000i64, 0, 0, "", 0, 0, 0, "", 0, "{}", "{}", {}],
            text,
            [uid, uname, 0, 0, 0, 10000, 1, ""],
            [],
        ]
    })
}

/// What the server does once the auth frame arrived
#[derive(Clone)]
pub enum Behavior {
    /// Answer auth, push `messages`, then keep the connection open
    Serve {
        messages: Vec<Vec<u8>>,
        /// Answer every heartbeat with a popularity reply
        reply_heartbeats: bool,
    },
    /// Send a WebSocket ping before answering auth, then push `messages`
    PingBeforeAuthReply { messages: Vec<Vec<u8>> },
    /// Answer auth, then close the connection
    CloseAfterAuth,
    /// Never answer auth
    Silent,
}

/// A mock danmu server for testing
pub struct MockDanmuServer {
    pub addr: SocketAddr,
    pub connections: Arc<AtomicUsize>,
    pub heartbeats: Arc<AtomicUsize>,
    pub auth_payloads: Arc<parking_lot::Mutex<Vec<Vec<u8>>>>,
    shutdown: Arc<Notify>,
}

impl MockDanmuServer {
    /// Create and start a new mock server
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let connections = Arc::new(AtomicUsize::new(0));
        let heartbeats = Arc::new(AtomicUsize::new(0));
        let auth_payloads = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let server = Self {
            addr,
            connections: Arc::clone(&connections),
            heartbeats: Arc::clone(&heartbeats),
            auth_payloads: Arc::clone(&auth_payloads),
            shutdown: Arc::clone(&shutdown),
        };

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                connections.fetch_add(1, Ordering::SeqCst);
                                let conn = Connection {
                                    behavior: behavior.clone(),
                                    heartbeats: Arc::clone(&heartbeats),
                                    auth_payloads: Arc::clone(&auth_payloads),
                                    shutdown: Arc::clone(&shutdown),
                                };
                                tokio::spawn(conn.handle(stream));
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown.notified() => {
                        break;
                    }
                }
            }
        });

        server
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn credentials(&self) -> RoomCredentials {
        credentials_for_port(self.port())
    }

    pub fn heartbeat_count(&self) -> usize {
        self.heartbeats.load(Ordering::SeqCst)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockDanmuServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Connection {
    behavior: Behavior,
    heartbeats: Arc<AtomicUsize>,
    auth_payloads: Arc<parking_lot::Mutex<Vec<Vec<u8>>>>,
    shutdown: Arc<Notify>,
}

impl Connection {
    async fn handle(self, stream: tokio::net::TcpStream) {
        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };
        let (mut write, mut read) = ws_stream.split();

        // First message must be the auth frame
        match read.next().await {
            Some(Ok(Message::Binary(bytes))) if bytes.len() >= 16 => {
                let opcode = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
                assert_eq!(opcode, OP_AUTH, "first frame must be auth");
                self.auth_payloads.lock().push(bytes[16..].to_vec());
            }
            _ => return,
        }

        let reply_heartbeats = match &self.behavior {
            Behavior::Silent => false,
            Behavior::CloseAfterAuth => {
                let _ = write.send(Message::Binary(auth_reply())).await;
                let _ = write.close().await;
                return;
            }
            Behavior::Serve {
                messages,
                reply_heartbeats,
            } => {
                if write.send(Message::Binary(auth_reply())).await.is_err() {
                    return;
                }
                for message in messages {
                    if write.send(Message::Binary(message.clone())).await.is_err() {
                        return;
                    }
                }
                *reply_heartbeats
            }
            Behavior::PingBeforeAuthReply { messages } => {
                if write.send(Message::Ping(b"keepalive".to_vec())).await.is_err() {
                    return;
                }
                if write.send(Message::Binary(auth_reply())).await.is_err() {
                    return;
                }
                for message in messages {
                    if write.send(Message::Binary(message.clone())).await.is_err() {
                        return;
                    }
                }
                false
            }
        };

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Binary(bytes))) if bytes.len() >= 16 => {
                            let opcode = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
                            if opcode == OP_HEARTBEAT {
                                self.heartbeats.fetch_add(1, Ordering::SeqCst);
                                if reply_heartbeats
                                    && write.send(Message::Binary(heartbeat_reply(1234))).await.is_err()
                                {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
                _ = self.shutdown.notified() => {
                    break;
                }
            }
        }
    }
}

pub fn credentials_for_port(port: u16) -> RoomCredentials {
    RoomCredentials {
        room_id: 67890,
        uid: 12345,
        buvid: "xyz".into(),
        token: "abc".into(),
        endpoints: vec![Endpoint::insecure("127.0.0.1", port)],
    }
}

/// A port nothing listens on
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
