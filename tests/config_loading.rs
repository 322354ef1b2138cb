//! Integration test: Configuration loading
//!
//! Tests config path resolution and the YAML loader with its
//! environment overrides.

use bilibili_danmu::bin_common::{config_path_from_args, load_config_from_env, ConfigType};
use bilibili_danmu::config::{CommandCoverage, ConfigError, DanmuConfig};
use bilibili_danmu::danmu::{CommandSet, ReconnectionStrategy};
use std::env;
use std::io::Write;
use std::time::Duration;

// Environment variables are process-wide; every test that reads or
// writes them holds this lock
static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

const OVERRIDE_VARS: [&str; 3] = ["DANMU_TOKEN", "DANMU_BUVID", "DANMU_UID"];

fn clear_overrides() {
    for var in OVERRIDE_VARS {
        env::remove_var(var);
    }
}

const FULL_CONFIG: &str = r#"
room_id: 22637261
uid: 42
buvid: "file-buvid"
token: "file-token"
endpoints:
  - host: a.example.com
    wss_port: 443
  - host: b.example.com
    wss_port: 8443
    ws_port: 2244
secure: true
commands: basic
timings:
  connect_timeout_secs: 5
  auth_timeout_secs: 2.5
  receive_timeout_secs: 45
  heartbeat_interval_secs: 20
reconnect:
  base_delay_secs: 1
  max_delay_secs: 8
  max_retries: 3
log_level: debug
"#;

const MINIMAL_CONFIG: &str = r#"
room_id: 1
endpoints:
  - host: broadcastlv.chat.bilibili.com
"#;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_danmu_config_default_path() {
    let _guard = ENV_LOCK.lock();
    env::remove_var("DANMU_CONFIG_PATH");

    let config_path = load_config_from_env(ConfigType::Danmu);
    assert_eq!(config_path.to_str().unwrap(), "config/danmu.yaml");
}

#[test]
fn test_danmu_config_path_from_env() {
    let _guard = ENV_LOCK.lock();
    env::set_var("DANMU_CONFIG_PATH", "/tmp/room.yaml");

    let from_env = load_config_from_env(ConfigType::Danmu);
    let from_args = config_path_from_args(&[], ConfigType::Danmu);
    env::remove_var("DANMU_CONFIG_PATH");

    assert_eq!(from_env.to_str().unwrap(), "/tmp/room.yaml");
    assert_eq!(from_args, from_env);
}

#[test]
fn test_custom_config() {
    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    assert_eq!(custom.default_path(), "custom/path.yaml");
    assert_eq!(custom.env_var_name(), "DANMU_CONFIG_PATH");
}

#[test]
fn test_load_full_config() {
    let _guard = ENV_LOCK.lock();
    clear_overrides();

    let file = write_config(FULL_CONFIG);
    let config = DanmuConfig::load(file.path()).unwrap();

    let credentials = config.credentials();
    assert_eq!(credentials.room_id, 22637261);
    assert_eq!(credentials.uid, 42);
    assert_eq!(credentials.buvid, "file-buvid");
    assert_eq!(credentials.token, "file-token");
    assert_eq!(credentials.endpoints.len(), 2);
    assert_eq!(
        credentials.preferred_endpoint().unwrap().url(true),
        "wss://b.example.com:8443/sub"
    );

    let timings = config.session_timings();
    assert_eq!(timings.connect_timeout, Duration::from_secs(5));
    assert_eq!(timings.auth_timeout, Duration::from_millis(2500));
    assert_eq!(timings.receive_timeout, Duration::from_secs(45));
    assert_eq!(timings.heartbeat_interval, Duration::from_secs(20));

    assert_eq!(config.commands, CommandCoverage::Basic);
    assert_eq!(config.command_set(), CommandSet::basic());
    assert_eq!(config.log_level, "debug");

    let strategy = config.reconnect_strategy();
    assert_eq!(strategy.next_delay(0), Some(Duration::from_secs(1)));
    assert_eq!(strategy.next_delay(2), Some(Duration::from_secs(4)));
    assert!(strategy.should_reconnect(2));
    assert!(!strategy.should_reconnect(3));
    assert_eq!(strategy.next_delay(3), None);
}

#[test]
fn test_minimal_config_uses_defaults() {
    let _guard = ENV_LOCK.lock();
    clear_overrides();

    let config = DanmuConfig::from_yaml(MINIMAL_CONFIG).unwrap();

    assert!(config.secure);
    assert_eq!(config.uid, 0);
    assert!(config.token.is_empty());
    assert_eq!(config.commands, CommandCoverage::Full);
    assert_eq!(config.command_set(), CommandSet::full());
    assert_eq!(config.endpoints[0].wss_port, 443);
    assert_eq!(config.log_level, "info");

    let timings = config.session_timings();
    assert_eq!(timings.connect_timeout, Duration::from_secs(10));
    assert_eq!(timings.auth_timeout, Duration::from_secs(10));
    assert_eq!(timings.receive_timeout, Duration::from_secs(40));
    assert_eq!(timings.heartbeat_interval, Duration::from_secs(30));

    assert_eq!(config.reconnect.max_retries, Some(5));
    let strategy = config.reconnect_strategy();
    assert_eq!(strategy.next_delay(0), Some(Duration::from_secs(3)));
    assert_eq!(strategy.next_delay(4), Some(Duration::from_secs(48)));
    assert_eq!(strategy.next_delay(5), None);
}

#[test]
fn test_null_max_retries_is_unbounded() {
    let _guard = ENV_LOCK.lock();
    clear_overrides();

    let yaml = format!(
        "{}reconnect:\n  base_delay_secs: 2\n  max_delay_secs: 30\n  max_retries: null\n",
        MINIMAL_CONFIG
    );
    let config = DanmuConfig::from_yaml(&yaml).unwrap();

    assert_eq!(config.reconnect.max_retries, None);
    let strategy = config.reconnect_strategy();
    assert!(strategy.should_reconnect(10_000));
    assert_eq!(strategy.next_delay(10_000), Some(Duration::from_secs(30)));
}

#[test]
fn test_env_overrides_secrets() {
    let _guard = ENV_LOCK.lock();
    clear_overrides();
    env::set_var("DANMU_TOKEN", "env-token");
    env::set_var("DANMU_BUVID", "env-buvid");
    env::set_var("DANMU_UID", " 777 ");

    let result = DanmuConfig::from_yaml(FULL_CONFIG);
    clear_overrides();

    let config = result.unwrap();
    assert_eq!(config.token, "env-token");
    assert_eq!(config.buvid, "env-buvid");
    assert_eq!(config.uid, 777);
}

#[test]
fn test_invalid_uid_override_is_rejected() {
    let _guard = ENV_LOCK.lock();
    clear_overrides();
    env::set_var("DANMU_UID", "not-a-number");

    let result = DanmuConfig::from_yaml(MINIMAL_CONFIG);
    clear_overrides();

    match result {
        Err(ConfigError::EnvVarInvalid { name, .. }) => assert_eq!(name, "DANMU_UID"),
        other => panic!("expected EnvVarInvalid, got {:?}", other),
    }
}

#[test]
fn test_validation_errors() {
    let _guard = ENV_LOCK.lock();
    clear_overrides();

    let cases = [
        ("room_id: 0\nendpoints:\n  - host: h\n", "room_id"),
        ("room_id: 1\nendpoints: []\n", "endpoint"),
        (
            "room_id: 1\nendpoints:\n  - host: h\nsecure: false\n",
            "ws port",
        ),
        (
            "room_id: 1\nendpoints:\n  - host: h\ntimings:\n  heartbeat_interval_secs: 0\n",
            "heartbeat_interval_secs",
        ),
        (
            "room_id: 1\nendpoints:\n  - host: h\ntimings:\n  auth_timeout_secs: -1\n",
            "auth_timeout_secs",
        ),
        (
            "room_id: 1\nendpoints:\n  - host: h\nreconnect:\n  base_delay_secs: 10\n  max_delay_secs: 5\n",
            "max_delay_secs",
        ),
        (
            "room_id: 1\nendpoints:\n  - host: h\nreconnect:\n  max_retries: 0\n",
            "max_retries",
        ),
        (
            "room_id: 1\nendpoints:\n  - host: h\nlog_level: loud\n",
            "log_level",
        ),
    ];

    for (yaml, needle) in cases {
        match DanmuConfig::from_yaml(yaml) {
            Err(ConfigError::ValidationError(message)) => assert!(
                message.contains(needle),
                "'{}' does not mention '{}'",
                message,
                needle
            ),
            other => panic!("expected validation error for {:?}, got {:?}", yaml, other),
        }
    }
}

#[test]
fn test_missing_file_and_bad_yaml() {
    let _guard = ENV_LOCK.lock();
    clear_overrides();

    let missing = DanmuConfig::load("/nonexistent/danmu.yaml");
    assert!(matches!(missing, Err(ConfigError::FileError(_))));

    let file = write_config("room_id: [not, a, number]\n");
    let bad = DanmuConfig::load(file.path());
    assert!(matches!(bad, Err(ConfigError::YamlError(_))));
}

#[test]
fn test_example_config_is_valid() {
    let _guard = ENV_LOCK.lock();
    clear_overrides();

    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/danmu.example.yaml");
    let config = DanmuConfig::load(path).unwrap();
    assert_eq!(config.endpoints.len(), 1);
    assert_eq!(config.reconnect.max_retries, Some(5));
}
