//! Logging setup for the `roimill` binary.
//!
//! Pools, the endpoint and the resolver log through `tracing` with
//! structured fields. The binary installs a stderr subscriber; the level is
//! taken from `RUST_LOG` when set, otherwise from the `-v` count.

use std::io;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter directive for a given `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber.
///
/// Does nothing if a subscriber is already installed (as in tests that run
/// the CLI entry point more than once).
pub fn init_logging(verbosity: u8) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}
