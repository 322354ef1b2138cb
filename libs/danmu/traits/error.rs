use std::time::Duration;
use thiserror::Error;

/// Main error type for the danmu client
#[derive(Error, Debug)]
pub enum DanmuError {
    /// Connect, send or receive failure on the WebSocket
    #[error("Transport error: {0}")]
    Transport(String),

    /// Connection closed by the peer or the stream ended
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Frame header or compressed body could not be decoded
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Outgoing payload could not be serialized
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// No reply to the auth frame in time
    #[error("Authentication timed out after {0:?}")]
    AuthTimeout(Duration),

    /// Auth reply missing or unreadable
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Message payload is not the JSON we expected
    #[error("Decode error: {0}")]
    Decode(String),

    /// Session provider could not supply credentials
    #[error("Session provider error: {0}")]
    Provider(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Operation not allowed in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Reconnection strategy gave up
    #[error("Retries exhausted after {attempts} attempts: {reason}")]
    RetriesExhausted { attempts: usize, reason: String },
}

impl DanmuError {
    /// True only for the terminal retry-exhaustion outcome
    pub fn is_fatal(&self) -> bool {
        matches!(self, DanmuError::RetriesExhausted { .. })
    }
}

/// Result type for danmu operations
pub type Result<T> = std::result::Result<T, DanmuError>;
