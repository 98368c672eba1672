//! Structured logging.
//!
//! # Responsibilities
//! - Install a `tracing` subscriber for applications that want one
//! - Honor `RUST_LOG`, falling back to the configured level
//!
//! # Design Decisions
//! - Pretty output for development, compact single-line output otherwise
//! - A subscriber installed elsewhere wins; ours is not forced over it

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, LoggingConfig};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
}

/// Install the global subscriber.
///
/// Returns `Ok(false)` when a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<bool, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let level = config.level.trim().to_ascii_lowercase();
            EnvFilter::try_new(&level).map_err(|e| LoggingError::InvalidFilter {
                filter: config.level.clone(),
                reason: e.to_string(),
            })?
        }
    };

    let (pretty, compact) = match config.format {
        LogFormat::Pretty => (Some(tracing_subscriber::fmt::layer().pretty()), None),
        LogFormat::Compact => (None, Some(tracing_subscriber::fmt::layer().compact())),
    };

    Ok(tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(compact)
        .try_init()
        .is_ok())
}
