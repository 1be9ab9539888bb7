//! Development-time tracing for debugging exploration and batch runs.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the embedding binary or test. This helper is the default setup.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format. Does nothing if a global subscriber is
/// already installed, so every test may call it.
///
/// # Example
/// ```bash
/// RUST_LOG=branchwise=debug cargo test
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
