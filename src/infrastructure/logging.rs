//! Diagnostic logging setup.
//!
//! Logs always go to stderr; stdout is reserved for the JSON result document.

use crate::config::{LogFormat, ObservabilityEnvConfig};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Builds the filter: `RUST_LOG` when set, otherwise the configured level.
pub fn build_filter(config: &ObservabilityEnvConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init(config: &ObservabilityEnvConfig) {
    let filter = build_filter(config);

    let result = match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(config.ansi)
                    .with_target(false)
                    .pretty(),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(config.ansi)
                    .with_target(false)
                    .compact(),
            )
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}
