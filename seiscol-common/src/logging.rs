//! Logging initialisation
//!
//! Library code only emits `tracing` events. Callers that own the process
//! (tools, services, test harnesses) install the subscriber once.

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` takes priority over the configured level.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| Error::Logging(format!("Invalid log level '{}': {}", config.level, e)))
}

/// Install a global fmt subscriber according to `config`.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;

    match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| Error::Logging(e.to_string()))
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| Error::Logging(e.to_string())),
    }
}
