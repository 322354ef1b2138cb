//! # Danmu Traits
//!
//! Extension points and shared types of the danmu client:
//!
//! - **SessionProvider**: supplies room credentials before each session
//! - **ReconnectionStrategy**: controls backoff between failed sessions
//! - **EventSink**: consumes decoded events on a dedicated thread
//! - **DanmuError**: the crate-wide error type

pub mod auth;
pub mod error;
pub mod reconnect;
pub mod sink;

// Re-export commonly used types
pub use auth::{AuthRequest, Endpoint, RoomCredentials, SessionProvider, StaticCredentials};
pub use error::{DanmuError, Result};
pub use reconnect::{ExponentialBackoff, FixedDelay, NeverReconnect, ReconnectionStrategy, RetryState};
pub use sink::{ChannelSink, EventSink, NoOpSink};
