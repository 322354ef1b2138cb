pub mod states;

use crate::core::client::DanmuClient;
use crate::core::config::{ClientConfig, SessionTimings};
use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics};
use crate::core::supervisor::Supervisor;
use crate::dispatch::CommandSet;
use crate::traits::sink::spawn_sink_thread;
use crate::traits::*;
use states::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Type-state builder for [`DanmuClient`]
///
/// `build()` only exists once a credentials source and an event sink
/// are set. Everything else has defaults: full command set, 10s connect
/// and auth timeouts, 40s receive timeout, 30s heartbeat, bounded
/// exponential backoff, TLS transport.
pub struct DanmuClientBuilder<P, S>
where
    P: ProviderState,
    S: SinkState,
{
    _state: TypeState<P, S>,
    provider: Option<Arc<dyn SessionProvider>>,
    sink: Option<Box<dyn EventSink>>,
    commands: CommandSet,
    timings: SessionTimings,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    secure: bool,
}

impl DanmuClientBuilder<NoProvider, NoSink> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            provider: None,
            sink: None,
            commands: CommandSet::full(),
            timings: SessionTimings::default(),
            reconnect_strategy: None,
            secure: true,
        }
    }
}

impl Default for DanmuClientBuilder<NoProvider, NoSink> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, S> DanmuClientBuilder<P, S>
where
    P: ProviderState,
    S: SinkState,
{
    fn transition<P2, S2>(self) -> DanmuClientBuilder<P2, S2>
    where
        P2: ProviderState,
        S2: SinkState,
    {
        DanmuClientBuilder {
            _state: TypeState::new(),
            provider: self.provider,
            sink: self.sink,
            commands: self.commands,
            timings: self.timings,
            reconnect_strategy: self.reconnect_strategy,
            secure: self.secure,
        }
    }

    /// Which `cmd` values become typed events (default: [`CommandSet::full`])
    pub fn commands(mut self, commands: CommandSet) -> Self {
        self.commands = commands;
        self
    }

    pub fn timings(mut self, timings: SessionTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timings.connect_timeout = timeout;
        self
    }

    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.timings.auth_timeout = timeout;
        self
    }

    /// Silence after which the session sends an extra heartbeat
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.timings.receive_timeout = timeout;
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.timings.heartbeat_interval = interval;
        self
    }

    pub fn reconnect_strategy(mut self, strategy: impl ReconnectionStrategy + 'static) -> Self {
        self.reconnect_strategy = Some(Box::new(strategy));
        self
    }

    /// `false` connects over plain `ws://` to the endpoint's `ws_port`
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }
}

// Credentials source
impl<S> DanmuClientBuilder<NoProvider, S>
where
    S: SinkState,
{
    /// Use fixed credentials for every session
    pub fn credentials(self, credentials: RoomCredentials) -> DanmuClientBuilder<HasProvider, S> {
        self.provider(StaticCredentials::new(credentials))
    }

    /// Ask `provider` for fresh credentials before every session
    pub fn provider(
        mut self,
        provider: impl SessionProvider + 'static,
    ) -> DanmuClientBuilder<HasProvider, S> {
        self.provider = Some(Arc::new(provider));
        self.transition()
    }
}

// Event sink
impl<P> DanmuClientBuilder<P, NoSink>
where
    P: ProviderState,
{
    pub fn sink(mut self, sink: impl EventSink) -> DanmuClientBuilder<P, HasSink> {
        self.sink = Some(Box::new(sink));
        self.transition()
    }
}

// Build method - only available when all required parts are set
impl DanmuClientBuilder<HasProvider, HasSink> {
    /// Spawn the sink thread and the supervisor
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<DanmuClient> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            DanmuError::Configuration(format!("build() needs a tokio runtime: {}", e))
        })?;

        validate_timings(&self.timings)?;

        let provider = self
            .provider
            .ok_or_else(|| DanmuError::Configuration("session provider not set".into()))?;
        let sink = self
            .sink
            .ok_or_else(|| DanmuError::Configuration("event sink not set".into()))?;

        let reconnect_strategy = self
            .reconnect_strategy
            .unwrap_or_else(|| Box::new(ExponentialBackoff::default()));

        debug!(
            commands = self.commands.len(),
            secure = self.secure,
            "Building danmu client"
        );

        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let sink_handle = spawn_sink_thread(sink, event_rx);

        let config = Arc::new(ClientConfig {
            provider,
            commands: self.commands,
            timings: self.timings,
            secure: self.secure,
            event_tx,
        });

        let state = Arc::new(AtomicConnectionState::default());
        let metrics = Arc::new(AtomicMetrics::new());
        let (client_tx, client_rx) = crossbeam_channel::unbounded();

        let supervisor = Supervisor::new(
            config,
            reconnect_strategy,
            Arc::clone(&state),
            Arc::clone(&metrics),
            client_tx,
        );

        Ok(DanmuClient::spawn(
            supervisor,
            state,
            metrics,
            client_rx,
            sink_handle,
            &runtime,
        ))
    }
}

fn validate_timings(timings: &SessionTimings) -> Result<()> {
    let named = [
        ("connect_timeout", timings.connect_timeout),
        ("auth_timeout", timings.auth_timeout),
        ("receive_timeout", timings.receive_timeout),
        ("heartbeat_interval", timings.heartbeat_interval),
    ];
    for (name, value) in named {
        if value.is_zero() {
            return Err(DanmuError::Configuration(format!("{} must be non-zero", name)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> RoomCredentials {
        RoomCredentials {
            room_id: 1,
            uid: 0,
            buvid: String::new(),
            token: String::new(),
            endpoints: vec![Endpoint::insecure("127.0.0.1", 1)],
        }
    }

    #[test]
    fn test_build_outside_runtime_is_rejected() {
        let result = DanmuClientBuilder::new()
            .credentials(credentials())
            .sink(NoOpSink)
            .build();
        assert!(matches!(result, Err(DanmuError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_zero_heartbeat_is_rejected() {
        let result = DanmuClientBuilder::new()
            .credentials(credentials())
            .sink(NoOpSink)
            .heartbeat_interval(Duration::ZERO)
            .build();
        match result {
            Err(DanmuError::Configuration(msg)) => assert!(msg.contains("heartbeat_interval")),
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("zero heartbeat accepted"),
        }
    }
}
