//! Event sinks
//!
//! Decoded events leave the receive loop through an unbounded crossbeam
//! channel and are handed to a single [`EventSink`] running on its own OS
//! thread, so the sink sees events in arrival order and a slow sink never
//! stalls the socket.
//!
//! ```text
//! receive loop → dispatcher → crossbeam channel → sink thread → EventSink::handle
//! ```

use crate::dispatch::Event;
use crate::error::{DanmuError, Result};
use crossbeam_channel::{Receiver, Sender};

/// Consumer of decoded events
///
/// **Important**: `handle` runs on a dedicated OS thread, not in an
/// async context. Blocking work is fine here.
///
/// # Errors
/// An error is logged and the sink keeps receiving subsequent events.
pub trait EventSink: Send + 'static {
    fn handle(&mut self, event: Event) -> Result<()>;
}

impl<F> EventSink for F
where
    F: FnMut(Event) -> Result<()> + Send + 'static,
{
    fn handle(&mut self, event: Event) -> Result<()> {
        self(event)
    }
}

/// Sink that forwards every event into a crossbeam channel
pub struct ChannelSink {
    tx: Sender<Event>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Event>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving end
    pub fn unbounded() -> (Self, Receiver<Event>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn handle(&mut self, event: Event) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|e| DanmuError::ChannelSend(e.to_string()))
    }
}

/// Sink that drops everything
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn handle(&mut self, _event: Event) -> Result<()> {
        Ok(())
    }
}

/// Spawn the sink thread
///
/// The thread exits once every sender of `rx` is dropped and the
/// remaining events have been handled.
pub(crate) fn spawn_sink_thread(
    mut sink: Box<dyn EventSink>,
    rx: Receiver<Event>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        while let Ok(event) = rx.recv() {
            let kind = event.kind_name();
            if let Err(e) = sink.handle(event) {
                tracing::error!(event = kind, "Sink error: {}", e);
            }
        }
        tracing::debug!("Event channel closed, sink thread exiting");
    })
}
