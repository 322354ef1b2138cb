use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::core::supervisor::Supervisor;
use crate::traits::*;
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle notifications for whoever controls the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A session is about to fetch credentials and connect
    Connecting,
    /// Auth reply received, the session is active
    Connected,
    /// A session ended with an error
    SessionFailed { reason: String },
    /// Next attempt number and the delay before it
    Reconnecting { attempt: usize, delay: Duration },
    /// The strategy gave up; the supervisor has exited
    RetriesExhausted { attempts: usize },
    /// Stopped on request
    Stopped,
}

/// Client metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metrics {
    pub frames_received: u64,
    pub frames_sent: u64,
    pub events_dispatched: u64,
    pub frames_skipped: u64,
    pub reconnect_count: u64,
    /// Room popularity from the latest heartbeat reply
    pub last_popularity: u32,
    pub connection_state: ConnectionState,
}

/// Handle to a running danmu client
///
/// Created by [`builder()`](crate::builder). The supervisor runs on a
/// tokio task, decoded events go to the sink thread, and lifecycle
/// notifications queue up on this handle.
pub struct DanmuClient {
    supervisor: Arc<Supervisor>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    /// Lifecycle event receiver
    event_rx: Receiver<ClientEvent>,
    /// Supervisor task (tokio task for async I/O)
    task_handle: Option<tokio::task::JoinHandle<Result<()>>>,
    /// Sink thread (dedicated OS thread for event handling)
    sink_handle: Option<std::thread::JoinHandle<()>>,
}

impl DanmuClient {
    /// Spawn the supervisor; called by the builder
    pub(crate) fn spawn(
        supervisor: Supervisor,
        state: Arc<AtomicConnectionState>,
        metrics: Arc<AtomicMetrics>,
        event_rx: Receiver<ClientEvent>,
        sink_handle: std::thread::JoinHandle<()>,
        runtime: &tokio::runtime::Handle,
    ) -> Self {
        let supervisor = Arc::new(supervisor);

        let task_handle = {
            let supervisor = Arc::clone(&supervisor);
            runtime.spawn(async move { supervisor.start().await })
        };

        Self {
            supervisor,
            state,
            metrics,
            event_rx,
            task_handle: Some(task_handle),
            sink_handle: Some(sink_handle),
        }
    }

    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }

    /// True while a session is authenticated and receiving
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// True while the supervisor loop is running
    pub fn is_running(&self) -> bool {
        self.supervisor.is_running()
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            frames_received: self.metrics.frames_received(),
            frames_sent: self.metrics.frames_sent(),
            events_dispatched: self.metrics.events_dispatched(),
            frames_skipped: self.metrics.frames_skipped(),
            reconnect_count: self.metrics.reconnect_count(),
            last_popularity: self.metrics.last_popularity(),
            connection_state: self.state.get(),
        }
    }

    /// Try to receive a lifecycle event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive a lifecycle event, blocking the calling thread up to `timeout`
    ///
    /// Blocks an OS thread; from async code prefer [`try_recv_event`](Self::try_recv_event).
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<ClientEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Wait until the supervisor exits on its own or after [`stop`](Self::stop)
    ///
    /// Returns the supervisor's result: `Err(RetriesExhausted)` when it gave
    /// up. Calling it again after it returned yields `Ok(())`.
    pub async fn terminated(&mut self) -> Result<()> {
        match self.task_handle.as_mut() {
            Some(handle) => {
                let result = handle.await;
                self.task_handle = None;
                result.map_err(|e| DanmuError::InvalidState(format!("supervisor task failed: {}", e)))?
            }
            None => Ok(()),
        }
    }

    /// Stop the current session and any pending reconnect
    ///
    /// Returns once no session is active. Idempotent.
    pub async fn stop(&self) {
        info!("Stopping danmu client");
        self.supervisor.stop().await;
    }

    /// Stop, wait for the supervisor, then drain and join the sink thread
    pub async fn shutdown(mut self) -> Result<()> {
        self.stop().await;

        if let Err(e) = self.terminated().await {
            // Exhaustion before shutdown is not a shutdown failure
            if !e.is_fatal() {
                return Err(e);
            }
            debug!("Supervisor had already given up: {}", e);
        }

        // The supervisor owns the last event sender; dropping it closes
        // the sink channel once the remaining events are handled
        let sink_handle = self.sink_handle.take();
        drop(self);

        if let Some(handle) = sink_handle {
            tokio::task::spawn_blocking(move || handle.join())
                .await
                .map_err(|e| DanmuError::InvalidState(format!("sink join failed: {}", e)))?
                .map_err(|_| DanmuError::InvalidState("sink thread panicked".into()))?;
        }

        info!("Danmu client shut down");
        Ok(())
    }
}

impl Drop for DanmuClient {
    fn drop(&mut self) {
        if self.task_handle.is_some() && self.supervisor.is_running() {
            warn!("DanmuClient dropped while running, cancelling");
        }
        self.supervisor.request_stop();
    }
}
