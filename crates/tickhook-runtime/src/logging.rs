#![forbid(unsafe_code)]

//! Production logging setup (feature `tracing-json`).
//!
//! tickhook itself only emits `tracing` events; installing a subscriber is
//! the embedder's call. This helper wires the common case: JSON lines to
//! stderr, filtered by `RUST_LOG` (default `info`). Call once, early.

use tracing_subscriber::EnvFilter;

/// Install a JSON subscriber filtered by `RUST_LOG`.
///
/// Safe to call once per process; a second call is a no-op (the first
/// subscriber wins).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
