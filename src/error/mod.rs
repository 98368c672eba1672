//! Error taxonomy for outbound requests.
//!
//! # Responsibilities
//! - Classify every failure by the phase it happened in
//! - Keep the original failure reachable through `source()`
//! - Carry the `"<METHOD> <url> failed."` context suffix
//!
//! # Design Decisions
//! - Only configuration errors are raised before dispatch; everything else
//!   goes through [`decorator`] exactly once, at settlement
//! - Decoration appends, it never replaces the original message

pub mod decorator;

use std::fmt;
use std::time::Duration;

use thiserror::Error as ThisError;

pub use decorator::RequestContext;

/// Boxed error used at collaborator seams (transport, payload streams).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for request operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The timed phase of an in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Dispatch until the connection is usable.
    Connect,
    /// Connection usable until the first response event.
    Response,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Connect => "connect",
            Phase::Response => "response",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Phase::Connect => "Connect",
            Phase::Response => "Response",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong, qualified by phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The target or options could not be turned into a request.
    Configuration,
    /// A phase timer expired.
    RequestTimeout { phase: Phase, bound: Duration },
    /// The underlying connection reported an error.
    TransportFailure,
    /// The payload source stream failed during transmission.
    StreamSourceFailure,
}

impl ErrorKind {
    /// Identifying tag, used as the prefix of the rendered error.
    pub fn tag(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::RequestTimeout { .. } => "RequestTimeout",
            ErrorKind::TransportFailure => "TransportFailure",
            ErrorKind::StreamSourceFailure => "StreamSourceFailure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Raw failure produced by an expired phase timer.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("{}Timeout({})", .phase.label(), .bound.as_millis())]
pub struct TimeoutError {
    pub phase: Phase,
    pub bound: Duration,
}

/// Reasons a target and its options cannot be resolved into a request.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ConfigurationError {
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("invalid method '{0}'")]
    InvalidMethod(String),

    #[error("invalid header '{0}'")]
    InvalidHeader(String),

    #[error("invalid path '{0}'")]
    InvalidPath(String),

    #[error("{pool} connection pool cannot serve a {scheme} target")]
    PoolMismatch { pool: &'static str, scheme: &'static str },
}

/// A request failure.
///
/// Renders as `"<Kind>: <original message>. <METHOD> <url> failed."`; the
/// original error stays available through [`std::error::Error::source`].
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Option<String>,
    source: Option<BoxError>,
}

impl Error {
    pub(crate) fn new(
        kind: ErrorKind,
        message: String,
        context: Option<String>,
        source: Option<BoxError>,
    ) -> Self {
        Self {
            kind,
            message,
            context,
            source,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Message of the original failure, without the context suffix.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The `"<METHOD> <url> failed."` suffix, absent for configuration errors.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::RequestTimeout { .. })
    }

    pub fn is_connect_timeout(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::RequestTimeout {
                phase: Phase::Connect,
                ..
            }
        )
    }

    /// The configured bound of the phase that timed out.
    pub fn timeout_bound(&self) -> Option<Duration> {
        match self.kind {
            ErrorKind::RequestTimeout { bound, .. } => Some(bound),
            _ => None,
        }
    }
}

impl From<ConfigurationError> for Error {
    fn from(err: ConfigurationError) -> Self {
        Error::new(
            ErrorKind::Configuration,
            err.to_string(),
            None,
            Some(Box::new(err)),
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(context) = &self.context {
            write!(f, ". {}", context)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_error_names_phase_and_bound() {
        let err = TimeoutError {
            phase: Phase::Response,
            bound: Duration::from_millis(5000),
        };
        assert_eq!(err.to_string(), "ResponseTimeout(5000)");

        let err = TimeoutError {
            phase: Phase::Connect,
            bound: Duration::from_millis(100),
        };
        assert_eq!(err.to_string(), "ConnectTimeout(100)");
    }

    #[test]
    fn configuration_error_has_no_context() {
        let err: Error = ConfigurationError::UnsupportedScheme("ftp".into()).into();
        assert_eq!(err.kind(), &ErrorKind::Configuration);
        assert!(err.context().is_none());
        assert_eq!(
            err.to_string(),
            "ConfigurationError: unsupported scheme 'ftp'"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
