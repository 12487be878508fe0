//! tracing setup for the binaries
//!
//! Output always goes to stderr: the server's stdout carries the protocol.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the filter directives
pub const LOG_ENV: &str = "SLCLEANER_LOG";

pub const DEFAULT_FILTER: &str = "slcleaner=info";

/// Install the global subscriber; a second call is a no-op
pub fn init(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| default_filter.into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
