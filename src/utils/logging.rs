//! Logging setup
//!
//! Structured, leveled tracing replaces the fire-and-forget console logging
//! of earlier revisions. Components emit events at decision points (quota
//! decision made, fallback triggered, increment recorded); this module only
//! installs the subscriber.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG` when set; defaults to `info` otherwise. Safe to call
/// once per process, from the binary entry point.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}
