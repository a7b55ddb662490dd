//! Tracing subscriber setup for host processes

use tracing_subscriber::EnvFilter;
use ubiqfs_core::config::LoggingConfig;

/// Builds the filter: `RUST_LOG` when set, otherwise the configured level
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Installs a global `fmt` subscriber
///
/// Returns `false` if a global subscriber was already set (for example by the
/// host, or by an earlier call); the existing one stays in place.
pub fn init_logging(config: &LoggingConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_target(true)
        .try_init()
        .is_ok()
}
