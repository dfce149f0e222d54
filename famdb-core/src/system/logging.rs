//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Environment variable holding a log filter directive
pub const LOG_ENV: &str = "FAMDB_LOG";

/// Install the global fmt subscriber.
///
/// `FAMDB_LOG` (or `RUST_LOG`) takes precedence over `config.level`.
/// Calling this more than once is harmless; only the first call installs.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let level = std::env::var(LOG_ENV).unwrap_or_else(|_| config.level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = if config.format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.is_ok()
}
