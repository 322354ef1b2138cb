//! # danmu
//!
//! Client for the live-room danmu (chat and event stream) protocol.
//!
//! ## Features
//!
//! - **Frame codec**: pure encode/decode of the 16-byte-header binary frames,
//!   zlib bodies expanded in place without recursion
//! - **Data-driven dispatch**: a [`CommandSet`] decides which `cmd` values
//!   become typed [`Event`]s; everything else arrives as `Unknown`
//! - **Supervised sessions**: connect, authenticate, heartbeat and receive,
//!   with bounded exponential backoff between attempts
//! - **Cancellation tree**: one token per client, cancelling stops the
//!   session, its heartbeat and any pending backoff at once
//! - **Ordered sink**: events are handed to one sink thread in arrival order

pub mod codec;
pub mod core;
pub mod dispatch;
pub mod traits;

// Re-export all traits
pub use traits::*;

pub use crate::core::{
    builder,
    builder::{states, DanmuClientBuilder},
    client::{ClientEvent, DanmuClient, Metrics},
    config::SessionTimings,
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState},
};

pub use dispatch::{CommandSet, Dispatcher, Event, EventKind};
