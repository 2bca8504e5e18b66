//! Structured logging.
//!
//! # Responsibilities
//! - Install the global `tracing` subscriber
//! - Pick the filter from `RUST_LOG`, falling back to the configured level
//! - Render pretty lines for terminals or JSON lines for collectors

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let json_layer = match config.log_format {
        LogFormat::Json => Some(fmt::layer().json().with_target(true).with_writer(std::io::stderr)),
        LogFormat::Pretty => None,
    };
    let pretty_layer = match config.log_format {
        LogFormat::Pretty => Some(fmt::layer().with_target(true).with_writer(std::io::stderr)),
        LogFormat::Json => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
}
