use crate::error::{DanmuError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Protocol version requested in the auth frame (2 = zlib bodies)
pub const AUTH_PROTOCOL_VERSION: u8 = 2;
/// Platform tag sent by the web client
pub const AUTH_PLATFORM: &str = "web";
/// Auth type constant sent by the web client
pub const AUTH_TYPE: u8 = 3;

/// One broadcast server entry from the room's host list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default = "default_wss_port")]
    pub wss_port: u16,
    #[serde(default)]
    pub ws_port: u16,
}

fn default_wss_port() -> u16 {
    443
}

impl Endpoint {
    pub fn new(host: impl Into<String>, wss_port: u16) -> Self {
        Self {
            host: host.into(),
            port: 0,
            wss_port,
            ws_port: 0,
        }
    }

    /// Plain `ws://` endpoint, for mirrors and local test servers
    pub fn insecure(host: impl Into<String>, ws_port: u16) -> Self {
        Self {
            host: host.into(),
            port: 0,
            wss_port: 0,
            ws_port,
        }
    }

    /// Subscription URL for this endpoint
    pub fn url(&self, secure: bool) -> String {
        if secure {
            format!("wss://{}:{}/sub", self.host, self.wss_port)
        } else {
            format!("ws://{}:{}/sub", self.host, self.ws_port)
        }
    }
}

/// Everything needed to open and authenticate one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomCredentials {
    pub room_id: u64,
    pub uid: u64,
    /// Device id (`buvid3` cookie)
    pub buvid: String,
    /// Short-lived key from the room's danmu info
    pub token: String,
    pub endpoints: Vec<Endpoint>,
}

impl RoomCredentials {
    /// The endpoint the client dials: the last one listed
    pub fn preferred_endpoint(&self) -> Option<&Endpoint> {
        self.endpoints.last()
    }

    pub fn auth_request(&self) -> AuthRequest {
        AuthRequest {
            uid: self.uid,
            roomid: self.room_id,
            protover: AUTH_PROTOCOL_VERSION,
            buvid: self.buvid.clone(),
            platform: AUTH_PLATFORM.to_string(),
            kind: AUTH_TYPE,
            key: self.token.clone(),
        }
    }
}

/// Body of the auth frame (opcode 7)
///
/// Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthRequest {
    pub uid: u64,
    pub roomid: u64,
    pub protover: u8,
    pub buvid: String,
    pub platform: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub key: String,
}

/// Trait for supplying room credentials before each connection attempt
///
/// Implement this to plug in whatever obtains the token and host list
/// (usually an HTTP call against the platform).
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Get credentials for the next session
    ///
    /// # Returns
    /// * `Ok(credentials)` - Connect with these
    /// * `Err(DanmuError)` - Counted as a failed attempt and retried
    async fn credentials(&self) -> Result<RoomCredentials>;
}

/// Provider backed by fixed, pre-fetched credentials
pub struct StaticCredentials {
    credentials: RoomCredentials,
}

impl StaticCredentials {
    pub fn new(credentials: RoomCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl SessionProvider for StaticCredentials {
    async fn credentials(&self) -> Result<RoomCredentials> {
        if self.credentials.endpoints.is_empty() {
            return Err(DanmuError::Provider(format!(
                "no endpoints configured for room {}",
                self.credentials.room_id
            )));
        }
        Ok(self.credentials.clone())
    }
}
