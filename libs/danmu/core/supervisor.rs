//! Reconnection supervisor
//!
//! Runs sessions back to back: credentials from the provider, one
//! [`Session`], then backoff and retry according to the configured
//! [`ReconnectionStrategy`] until the session is stopped or retries
//! are exhausted.

use crate::core::client::ClientEvent;
use crate::core::config::ClientConfig;
use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::core::session::{Session, SessionOutcome};
use crate::dispatch::Dispatcher;
use crate::traits::*;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub(crate) struct Supervisor {
    config: Arc<ClientConfig>,
    dispatcher: Arc<Dispatcher>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    events: Sender<ClientEvent>,
    retry: Mutex<RetryState>,
    running: AtomicBool,
    /// Parent of every session token and of the backoff sleep
    cancel: Mutex<CancellationToken>,
    /// `true` while a session (or its credential fetch) is in flight
    session_active: watch::Sender<bool>,
}

/// Clears `session_active` even if the supervising future is dropped
struct ActiveGuard<'a>(&'a watch::Sender<bool>);

impl<'a> ActiveGuard<'a> {
    fn new(flag: &'a watch::Sender<bool>) -> Self {
        flag.send_replace(true);
        Self(flag)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

impl Supervisor {
    pub(crate) fn new(
        config: Arc<ClientConfig>,
        strategy: Box<dyn ReconnectionStrategy>,
        state: Arc<AtomicConnectionState>,
        metrics: Arc<AtomicMetrics>,
        events: Sender<ClientEvent>,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(config.commands.clone()));
        let (session_active, _) = watch::channel(false);
        Self {
            config,
            dispatcher,
            state,
            metrics,
            events,
            retry: Mutex::new(RetryState::new(strategy)),
            running: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            session_active,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run sessions until stopped or out of retries
    ///
    /// # Errors
    /// * `RetriesExhausted` - the strategy gave up
    /// * `InvalidState` - already running
    pub(crate) async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(DanmuError::InvalidState("supervisor already running".into()));
        }

        // A stop that raced ahead of start leaves this token cancelled,
        // so the loop below returns right away
        let cancel = self.cancel.lock().clone();

        let result = self.supervise(&cancel).await;

        self.running.store(false, Ordering::Release);
        self.state.set(ConnectionState::Stopped);
        if result.is_ok() {
            info!("Supervisor stopped");
            let _ = self.events.send(ClientEvent::Stopped);
        }
        result
    }

    /// Cancel the current session and any pending backoff, then wait
    /// until no session is active. Idempotent.
    pub(crate) async fn stop(&self) {
        self.request_stop();
        let mut active = self.session_active.subscribe();
        let _ = active.wait_for(|active| !*active).await;
        debug!("No session active");
    }

    /// Non-blocking half of [`stop`](Self::stop)
    pub(crate) fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
        self.cancel.lock().cancel();
    }

    async fn supervise(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if !self.is_running() || cancel.is_cancelled() {
                return Ok(());
            }

            let _ = self.events.send(ClientEvent::Connecting);
            let outcome = self.run_session(cancel).await;

            let (error, reached_active) = match outcome {
                SessionOutcome::Stopped { .. } => return Ok(()),
                SessionOutcome::Failed {
                    error,
                    reached_active,
                } => (error, reached_active),
            };

            self.state.set(ConnectionState::Disconnected);
            if reached_active {
                self.retry.lock().reset();
            }
            warn!("Session failed: {}", error);
            let _ = self.events.send(ClientEvent::SessionFailed {
                reason: error.to_string(),
            });

            let next = self.retry.lock().on_failure();
            let attempt = self.retry.lock().failures();

            let Some(delay) = next else {
                error!(attempts = attempt, "Reconnection strategy exhausted, giving up");
                self.running.store(false, Ordering::Release);
                let _ = self
                    .events
                    .send(ClientEvent::RetriesExhausted { attempts: attempt });
                return Err(DanmuError::RetriesExhausted {
                    attempts: attempt,
                    reason: error.to_string(),
                });
            };

            info!(attempt = attempt, "Reconnecting in {:?}", delay);
            let _ = self
                .events
                .send(ClientEvent::Reconnecting { attempt, delay });
            self.metrics.increment_reconnects();

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Stopped during reconnection delay");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn run_session(&self, cancel: &CancellationToken) -> SessionOutcome {
        let _active = ActiveGuard::new(&self.session_active);

        let credentials = tokio::select! {
            _ = cancel.cancelled() => return SessionOutcome::Stopped { reached_active: false },
            credentials = self.config.provider.credentials() => credentials,
        };

        let credentials = match credentials {
            Ok(credentials) => credentials,
            Err(error) => {
                return SessionOutcome::Failed {
                    error,
                    reached_active: false,
                }
            }
        };

        Session::new(
            credentials,
            Arc::clone(&self.config),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.state),
            Arc::clone(&self.metrics),
            self.events.clone(),
            cancel.child_token(),
        )
        .run()
        .await
    }
}
