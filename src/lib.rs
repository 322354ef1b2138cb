//! Bilibili danmu listener - main library
//!
//! ## Architecture
//!
//! - **danmu**: protocol client (re-exported from workspace)
//! - **config**: YAML configuration with environment overrides
//! - **logging**: tracing subscriber setup
//! - **bin_common**: helpers shared by the binaries (CLI, log sink)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use bilibili_danmu::bin_common::{load_config_from_env, ConfigType, LogSink};
//! use bilibili_danmu::config::DanmuConfig;
//! ```

// Re-export workspace libraries for convenience
pub use danmu;

pub mod config;
pub mod logging;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod log_sink;

    pub use cli::{config_path_from_args, load_config_from_env, parse_args, ConfigType};
    pub use log_sink::LogSink;
}
