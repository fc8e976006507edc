//! Logging setup
//!
//! Installs the global `tracing` subscriber once at startup. The level is
//! taken from the `--log` flag when given, otherwise from the configured
//! `core.log_level`; a `RUST_LOG` environment variable overrides both.
//! Third-party crates stay at `warn` so backend HTTP chatter does not
//! drown the conversation logs.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Call once, before any logging.
///
/// Pretty terminal output in debug builds, JSON in release builds.
pub fn init(flag_level: Option<&str>, config_level: &str) {
    let level = flag_level.unwrap_or(config_level);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(level)));

    #[cfg(debug_assertions)]
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().pretty().with_target(false))
        .init();

    #[cfg(not(debug_assertions))]
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_current_span(true))
        .init();
}

fn directives(level: &str) -> String {
    format!("warn,parley_engine={level},parley={level}")
}
