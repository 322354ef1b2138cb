//! Listener configuration
//!
//! Loaded from YAML; secrets can come from the environment (or a `.env`
//! file loaded by the binary) instead of the file:
//! `DANMU_TOKEN`, `DANMU_BUVID`, `DANMU_UID`.

use danmu::{CommandSet, Endpoint, ExponentialBackoff, RoomCredentials, SessionTimings};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid environment variable {name}: {reason}")]
    EnvVarInvalid { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Which command table the dispatcher uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommandCoverage {
    /// Chat, combos, gifts, guards, likes, viewer counts, room status
    Basic,
    /// Everything the dispatcher knows
    #[default]
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingsConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: f64,
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: f64,
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout_secs: f64,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: f64,
}

impl Default for TimingsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            auth_timeout_secs: default_auth_timeout(),
            receive_timeout_secs: default_receive_timeout(),
            heartbeat_interval_secs: default_heartbeat_interval(),
        }
    }
}

fn default_connect_timeout() -> f64 {
    10.0
}

fn default_auth_timeout() -> f64 {
    10.0
}

fn default_receive_timeout() -> f64 {
    40.0
}

fn default_heartbeat_interval() -> f64 {
    30.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: f64,
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: f64,
    /// Failed sessions before giving up; `null` retries forever
    #[serde(default = "default_max_retries")]
    pub max_retries: Option<usize>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: default_base_delay(),
            max_delay_secs: default_max_delay(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_delay() -> f64 {
    3.0
}

fn default_max_delay() -> f64 {
    60.0
}

fn default_max_retries() -> Option<usize> {
    Some(5)
}

/// Listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DanmuConfig {
    pub room_id: u64,
    #[serde(default)]
    pub uid: u64,
    #[serde(default)]
    pub buvid: String,
    /// Prefer `DANMU_TOKEN` over putting this in the file
    #[serde(default)]
    pub token: String,
    pub endpoints: Vec<Endpoint>,
    /// `false` connects over plain `ws://` to each endpoint's `ws_port`
    #[serde(default = "default_secure")]
    pub secure: bool,
    #[serde(default)]
    pub commands: CommandCoverage,
    #[serde(default)]
    pub timings: TimingsConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_secure() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DanmuConfig {
    /// Load configuration from YAML file, apply environment overrides
    /// and validate
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        Self::from_yaml(&yaml_content)
    }

    pub fn from_yaml(yaml_content: &str) -> Result<Self> {
        let mut config: DanmuConfig = serde_yaml::from_str(yaml_content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(token) = std::env::var("DANMU_TOKEN") {
            info!("Overriding token from environment variable");
            self.token = token;
        }

        if let Ok(buvid) = std::env::var("DANMU_BUVID") {
            info!("Overriding buvid from environment variable");
            self.buvid = buvid;
        }

        if let Ok(uid) = std::env::var("DANMU_UID") {
            self.uid = uid.trim().parse().map_err(|e| ConfigError::EnvVarInvalid {
                name: "DANMU_UID".to_string(),
                reason: format!("{}", e),
            })?;
        }

        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.room_id == 0 {
            return Err(ConfigError::ValidationError(
                "room_id must be set".to_string(),
            ));
        }

        if self.endpoints.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one endpoint is required".to_string(),
            ));
        }

        for endpoint in &self.endpoints {
            let port = if self.secure {
                endpoint.wss_port
            } else {
                endpoint.ws_port
            };
            if endpoint.host.is_empty() || port == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "endpoint '{}' has no {} port",
                    endpoint.host,
                    if self.secure { "wss" } else { "ws" }
                )));
            }
        }

        let durations = [
            ("timings.connect_timeout_secs", self.timings.connect_timeout_secs),
            ("timings.auth_timeout_secs", self.timings.auth_timeout_secs),
            ("timings.receive_timeout_secs", self.timings.receive_timeout_secs),
            ("timings.heartbeat_interval_secs", self.timings.heartbeat_interval_secs),
            ("reconnect.base_delay_secs", self.reconnect.base_delay_secs),
            ("reconnect.max_delay_secs", self.reconnect.max_delay_secs),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.reconnect.max_delay_secs < self.reconnect.base_delay_secs {
            return Err(ConfigError::ValidationError(
                "reconnect.max_delay_secs must not be below base_delay_secs".to_string(),
            ));
        }

        if self.reconnect.max_retries == Some(0) {
            return Err(ConfigError::ValidationError(
                "reconnect.max_retries must be at least 1 (or null for unlimited)".to_string(),
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    pub fn credentials(&self) -> RoomCredentials {
        RoomCredentials {
            room_id: self.room_id,
            uid: self.uid,
            buvid: self.buvid.clone(),
            token: self.token.clone(),
            endpoints: self.endpoints.clone(),
        }
    }

    pub fn session_timings(&self) -> SessionTimings {
        SessionTimings {
            connect_timeout: Duration::from_secs_f64(self.timings.connect_timeout_secs),
            auth_timeout: Duration::from_secs_f64(self.timings.auth_timeout_secs),
            receive_timeout: Duration::from_secs_f64(self.timings.receive_timeout_secs),
            heartbeat_interval: Duration::from_secs_f64(self.timings.heartbeat_interval_secs),
        }
    }

    pub fn reconnect_strategy(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_secs_f64(self.reconnect.base_delay_secs),
            Duration::from_secs_f64(self.reconnect.max_delay_secs),
            self.reconnect.max_retries,
        )
    }

    pub fn command_set(&self) -> CommandSet {
        match self.commands {
            CommandCoverage::Basic => CommandSet::basic(),
            CommandCoverage::Full => CommandSet::full(),
        }
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Room: {}", self.room_id);
        info!("  Uid: {}", self.uid);
        info!("  Token: {}", if self.token.is_empty() { "(none)" } else { "(set)" });
        info!("  Endpoints: {}", self.endpoints.len());
        if let Some(endpoint) = self.endpoints.last() {
            info!("  Preferred endpoint: {}", endpoint.url(self.secure));
        }
        info!("  Commands: {:?}", self.commands);
        match self.reconnect.max_retries {
            Some(max) => info!(
                "  Reconnect: {}s base, {}s cap, {} attempts",
                self.reconnect.base_delay_secs, self.reconnect.max_delay_secs, max
            ),
            None => info!(
                "  Reconnect: {}s base, {}s cap, unlimited",
                self.reconnect.base_delay_secs, self.reconnect.max_delay_secs
            ),
        }
        info!("  Log level: {}", self.log_level);
    }
}
