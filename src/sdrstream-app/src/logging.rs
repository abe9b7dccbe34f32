//! Structured logging setup, initialized exactly once at process start.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Parse `log_level` (case-insensitive: error/warn/info/debug/trace),
/// defaulting to INFO, and install it as the global subscriber.
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_target(false)
        .with_max_level(level)
        .init();
}
