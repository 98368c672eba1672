//! Error decoration.
//!
//! Wraps a raw failure with its phase-qualified kind and the
//! `"<METHOD> <url> failed."` suffix.

use http::Method;

use crate::error::{BoxError, Error, ErrorKind, TimeoutError};

/// Method and resolved URL of the request a failure belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    method: Method,
    url: String,
}

impl RequestContext {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn suffix(&self) -> String {
        format!("{} {} failed.", self.method, self.url)
    }
}

/// Decorate `raw` with `kind` and the request context.
pub fn decorate<E>(kind: ErrorKind, raw: E, context: &RequestContext) -> Error
where
    E: Into<BoxError>,
{
    let raw: BoxError = raw.into();
    Error::new(kind, raw.to_string(), Some(context.suffix()), Some(raw))
}

pub fn timeout(raw: TimeoutError, context: &RequestContext) -> Error {
    let kind = ErrorKind::RequestTimeout {
        phase: raw.phase,
        bound: raw.bound,
    };
    decorate(kind, raw, context)
}

pub fn transport<E>(raw: E, context: &RequestContext) -> Error
where
    E: Into<BoxError>,
{
    decorate(ErrorKind::TransportFailure, raw, context)
}

pub fn stream_source<E>(raw: E, context: &RequestContext) -> Error
where
    E: Into<BoxError>,
{
    decorate(ErrorKind::StreamSourceFailure, raw, context)
}
