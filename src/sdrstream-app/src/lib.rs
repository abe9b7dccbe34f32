//! Ambient stack shared by every binary: config loading and logging init.

pub mod config;
pub mod logging;

pub use config::{ConfigError, ConfigFile, StreamerConfig};
pub use logging::init_logging;
