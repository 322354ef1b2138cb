//! Connection management: session, supervisor, heartbeat, client handle.
//!
//! ## Example
//!
//! ```rust,ignore
//! use danmu::{ChannelSink, Endpoint, ExponentialBackoff, RoomCredentials};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> danmu::Result<()> {
//!     let (sink, events) = ChannelSink::unbounded();
//!
//!     let mut client = danmu::builder()
//!         .credentials(RoomCredentials {
//!             room_id: 22_637_261,
//!             uid: 0,
//!             buvid: "buvid3".into(),
//!             token: "token".into(),
//!             endpoints: vec![Endpoint::new("broadcastlv.chat.bilibili.com", 443)],
//!         })
//!         .sink(sink)
//!         .reconnect_strategy(ExponentialBackoff::new(
//!             Duration::from_secs(3),
//!             Duration::from_secs(60),
//!             None, // unlimited retries
//!         ))
//!         .build()?;
//!
//!     std::thread::spawn(move || {
//!         for event in events {
//!             println!("{:?}", event);
//!         }
//!     });
//!
//!     client.terminated().await
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod connection_state;
pub mod heartbeat;
pub mod session;
pub mod supervisor;

pub use builder::{states, DanmuClientBuilder};
pub use client::{ClientEvent, DanmuClient, Metrics};
pub use config::SessionTimings;
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use session::SessionOutcome;

/// Create a new danmu client builder
pub fn builder() -> DanmuClientBuilder<states::NoProvider, states::NoSink> {
    DanmuClientBuilder::new()
}
