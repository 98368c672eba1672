//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (pool limits, idle timeout)
//! - Reject unknown log levels
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Timeouts are not validated; bad values fall back to the default
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::ClientConfig;

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("pool.max_idle_per_host must be at least 1")]
    NoIdleConnections,

    #[error("pool.idle_timeout_secs must be at least 1")]
    ZeroIdleTimeout,

    #[error("logging.level '{0}' is not a known level")]
    UnknownLogLevel(String),
}

pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.pool.max_idle_per_host == 0 {
        errors.push(ValidationError::NoIdleConnections);
    }
    if config.pool.idle_timeout_secs == 0 {
        errors.push(ValidationError::ZeroIdleTimeout);
    }

    let level = config.logging.level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.logging.level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn level_must_be_a_bare_level_name() {
        let mut config = ClientConfig::default();
        config.logging.level = " WARN ".into();
        assert!(validate_config(&config).is_ok());

        config.logging.level = "keepalive_client=debug".into();
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::UnknownLogLevel("keepalive_client=debug".into())]
        );
    }

    #[test]
    fn reports_every_problem() {
        let mut config = ClientConfig::default();
        config.pool.max_idle_per_host = 0;
        config.pool.idle_timeout_secs = 0;
        config.logging.level = "loud".into();
        config.timeouts.connect_ms = -5;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::NoIdleConnections,
                ValidationError::ZeroIdleTimeout,
                ValidationError::UnknownLogLevel("loud".into()),
            ]
        );
    }
}
