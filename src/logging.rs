//! Tracing setup for batch runs.

use crate::config::LoggingConfig;
use crate::error::{ProcessingError, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install the global subscriber: console output on stderr (plain or JSON)
/// plus an optional plain-text log file. `RUST_LOG` takes precedence over
/// the configured filter. Call once, from the binary.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = if config.json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file_layer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file))
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(env_filter)
        .try_init()
        .map_err(|e| ProcessingError::Config(format!("Failed to initialize logging: {}", e)))?;

    tracing::debug!(filter = %config.filter, json = config.json, "Tracing initialized");
    Ok(())
}
