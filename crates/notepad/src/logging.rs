//! Tracing setup.
//!
//! The library only emits `tracing` events. Hosts call one of these once at
//! startup; both use `try_init`, so a second call (common in tests) is a no-op.
//! `RUST_LOG` wins over the supplied default filter.

use tracing_subscriber::EnvFilter;

fn filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Human-readable output on stderr.
pub fn init(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_filter))
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

/// One JSON object per event, for log shippers.
pub fn init_json(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_filter))
        .json()
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
