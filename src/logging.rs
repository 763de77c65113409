//! Logging setup
//!
//! `tracing` subscriber with an environment-aware filter. `RUST_LOG`
//! overrides the level chosen on the command line.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tracing_subscriber::util::TryInitError;

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set.
pub fn setup_logging(debug: bool, json: bool) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(debug)));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(false))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .try_init()
    }
}

fn default_level(debug: bool) -> &'static str {
    if debug { "debug" } else { "info" }
}
