//! Log setup for the provider binary.
//!
//! Logs go to **stderr**: stdout carries the handshake line the host
//! runtime parses. The filter comes from `RUST_LOG`, for example
//!
//! ```bash
//! RUST_LOG=indykite_provider=debug terraform apply
//! RUST_LOG=warn,indykite_provider::client=trace terraform plan
//! ```

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn subscriber(default_level: &str) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry().with(filter(default_level)).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    )
}

/// Install the global subscriber at `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Like [`init_logging`] with a different fallback level.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging_with_default(default_level: &str) {
    subscriber(default_level).init();
}

/// Install the global subscriber unless one is already installed.
///
/// Returns whether this call installed it.
pub fn try_init_logging() -> bool {
    subscriber("info").try_init().is_ok()
}
