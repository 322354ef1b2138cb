use anyhow::{Context, Result};
use bilibili_danmu::bin_common::{config_path_from_args, parse_args, ConfigType, LogSink};
use bilibili_danmu::config::DanmuConfig;
use bilibili_danmu::danmu::{self, ClientEvent, DanmuClient, Metrics};
use bilibili_danmu::logging::init_tracing_with_level;
use std::time::Duration;
use tracing::{error, info, warn};

/// How often lifecycle events are drained from the client
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Load config first (before logging is initialized)
    let args = parse_args();
    let config_path = config_path_from_args(&args, ConfigType::Danmu);
    let config = DanmuConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    init_tracing_with_level(&config.log_level);
    config.log();

    let mut client = danmu::builder()
        .credentials(config.credentials())
        .commands(config.command_set())
        .timings(config.session_timings())
        .reconnect_strategy(config.reconnect_strategy())
        .secure(config.secure)
        .sink(LogSink::new())
        .build()?;

    print_banner(config.room_id);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut poll = tokio::time::interval(EVENT_POLL_INTERVAL);

    let outcome = loop {
        tokio::select! {
            result = client.terminated() => break result,
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C, shutting down");
                break Ok(());
            }
            _ = poll.tick() => log_client_events(&client),
        }
    };

    log_client_events(&client);
    let metrics = client.metrics();
    client.shutdown().await?;
    print_shutdown(&metrics);

    outcome.context("danmu client gave up")
}

fn log_client_events(client: &DanmuClient) {
    while let Some(event) = client.try_recv_event() {
        match event {
            ClientEvent::Connecting => info!("Connecting..."),
            ClientEvent::Connected => info!("Connected, receiving danmu"),
            ClientEvent::SessionFailed { reason } => warn!("Session failed: {}", reason),
            ClientEvent::Reconnecting { attempt, delay } => {
                info!("Reconnecting (attempt {}) in {:?}", attempt, delay)
            }
            ClientEvent::RetriesExhausted { attempts } => {
                error!("Giving up after {} failed sessions", attempts)
            }
            ClientEvent::Stopped => info!("Client stopped"),
        }
    }
}

fn print_banner(room_id: u64) {
    info!("");
    info!("========================================");
    info!("Starting danmu listener");
    info!("Room: {}", room_id);
    info!("Press Ctrl+C to stop");
    info!("========================================");
    info!("");
}

fn print_shutdown(metrics: &Metrics) {
    info!("");
    info!("========================================");
    info!("Danmu listener stopped");
    info!(
        "Frames: {} received, {} sent, {} skipped",
        metrics.frames_received, metrics.frames_sent, metrics.frames_skipped
    );
    info!(
        "Events: {} dispatched, {} reconnects, popularity {}",
        metrics.events_dispatched, metrics.reconnect_count, metrics.last_popularity
    );
    info!("========================================");
}
