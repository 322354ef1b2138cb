use crate::dispatch::{CommandSet, Event};
use crate::traits::*;
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::time::Duration;

/// Timeouts and intervals of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    /// Bound on the WebSocket handshake
    pub connect_timeout: Duration,
    /// Bound on waiting for the auth reply
    pub auth_timeout: Duration,
    /// Silence after which an extra heartbeat is sent
    pub receive_timeout: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            auth_timeout: Duration::from_secs(10),
            receive_timeout: Duration::from_secs(40),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

/// Configuration shared by the supervisor and every session it runs
///
/// Built by the type-state builder. Holding the only long-lived
/// `event_tx`, it closes the sink channel when dropped.
pub(crate) struct ClientConfig {
    pub(crate) provider: Arc<dyn SessionProvider>,

    pub(crate) commands: CommandSet,

    pub(crate) timings: SessionTimings,

    /// `wss://` when true, `ws://` otherwise
    pub(crate) secure: bool,

    /// Feeds the sink thread
    pub(crate) event_tx: Sender<Event>,
}
