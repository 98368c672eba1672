//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::request::options::{TimeoutDefaults, TimeoutSetting, DEFAULT_TIMEOUT};

/// Root configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Default phase timeouts.
    pub timeouts: TimeoutConfig,

    /// Connection pool settings.
    pub pool: PoolConfig,

    /// Log subscriber settings.
    pub logging: LoggingConfig,
}

/// Default phase timeouts in milliseconds.
///
/// Values that are not positive fall back to the built-in default rather
/// than being rejected.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect_ms: i64,
    pub response_ms: i64,
}

impl TimeoutConfig {
    pub fn resolve(&self) -> TimeoutDefaults {
        TimeoutDefaults {
            connect: TimeoutSetting::from(self.connect_ms).resolve(DEFAULT_TIMEOUT),
            response: TimeoutSetting::from(self.response_ms).resolve(DEFAULT_TIMEOUT),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        let ms = DEFAULT_TIMEOUT.as_millis() as i64;
        Self {
            connect_ms: ms,
            response_ms: ms,
        }
    }
}

/// Connection pool settings.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle connections kept per destination.
    pub max_idle_per_host: usize,

    /// Idle connections older than this are closed instead of reused.
    pub idle_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 32,
            idle_timeout_secs: 90,
        }
    }
}

/// Output style of the fmt subscriber.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
}

/// Log subscriber settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level name (`trace`, `debug`, `info`, `warn`, `error`, `off`) used
    /// when `RUST_LOG` is unset. Per-target directives go in `RUST_LOG`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_document_uses_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.pool.max_idle_per_host, 32);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            [timeouts]
            connect_ms = 250

            [logging]
            format = "compact"
            "#,
        )
        .unwrap();
        assert_eq!(config.timeouts.connect_ms, 250);
        assert_eq!(config.timeouts.response_ms, 5000);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn non_positive_timeouts_resolve_to_default() {
        let timeouts = TimeoutConfig {
            connect_ms: 0,
            response_ms: -20,
        };
        let defaults = timeouts.resolve();
        assert_eq!(defaults.connect, DEFAULT_TIMEOUT);
        assert_eq!(defaults.response, DEFAULT_TIMEOUT);

        let timeouts = TimeoutConfig {
            connect_ms: 100,
            response_ms: 2000,
        };
        assert_eq!(timeouts.resolve().connect, Duration::from_millis(100));
        assert_eq!(timeouts.resolve().response, Duration::from_millis(2000));
    }
}
