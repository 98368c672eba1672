//! Request descriptor builder.
//!
//! Turns a [`Target`] and [`RequestOptions`] into an immutable
//! [`RequestConfig`], then applies the pre-dispatch hook exactly once.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Method, Request, Uri};
use tokio::sync::oneshot;

use crate::error::{BoxError, ConfigurationError, Error, RequestContext};
use crate::pool::{ConnectionPool, Destination, Pools, TransportKind};
use crate::request::options::{RequestOptions, TimeoutDefaults, TimeoutSetting, TransportOverride};
use crate::request::payload::{Payload, RequestBody};
use crate::request::target::{ResolvedTarget, Target};

/// Encodings advertised when compression negotiation is requested.
pub const ACCEPTED_ENCODINGS: &str = "gzip,deflate";

/// Everything needed to dispatch one request.
pub struct RequestConfig {
    target: ResolvedTarget,
    method: Method,
    headers: HeaderMap,
    pool: Arc<ConnectionPool>,
    connect_timeout: Duration,
    response_timeout: Duration,
    transport_override: Option<TransportOverride>,
    payload: Payload,
}

impl RequestConfig {
    pub fn target(&self) -> &ResolvedTarget {
        &self.target
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    pub fn transport_override(&self) -> Option<&TransportOverride> {
        self.transport_override.as_ref()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Resolved URL, as used in error context.
    pub fn url(&self) -> String {
        self.target.url()
    }

    /// Pool key for this request.
    pub fn destination(&self) -> Destination {
        let verify = self
            .transport_override
            .map(|o| o.verifies_certificates())
            .unwrap_or(true);
        Destination {
            kind: TransportKind::from(self.target.scheme),
            host: self.target.socket_host().to_string(),
            port: self.target.port,
            verify_certificates: verify,
        }
    }

    pub fn context(&self) -> RequestContext {
        RequestContext::new(self.method.clone(), self.url())
    }

    /// Set or replace a header; intended for pre-dispatch hooks.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replace the connect bound. Values that are not positive whole
    /// milliseconds leave the current bound in place.
    pub fn with_connect_timeout(mut self, timeout: impl Into<TimeoutSetting>) -> Self {
        self.connect_timeout = timeout.into().resolve(self.connect_timeout);
        self
    }

    /// Replace the response bound, with the same rule as the connect bound.
    pub fn with_response_timeout(mut self, timeout: impl Into<TimeoutSetting>) -> Self {
        self.response_timeout = timeout.into().resolve(self.response_timeout);
        self
    }

    /// Split into the pieces the coordinator dispatches.
    pub(crate) fn into_dispatch(self) -> Result<Dispatch, Error> {
        let destination = self.destination();
        let uri: Uri = self
            .target
            .path
            .parse()
            .map_err(|_| ConfigurationError::InvalidPath(self.target.path.clone()))?;
        let (body, stream_failure) = self.payload.into_body();

        let mut request = Request::new(body);
        *request.method_mut() = self.method;
        *request.uri_mut() = uri;
        *request.headers_mut() = self.headers;

        Ok(Dispatch {
            pool: self.pool,
            destination,
            request,
            stream_failure,
        })
    }
}

impl fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("target", &self.target)
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("pool", &self.pool.kind())
            .field("connect_timeout", &self.connect_timeout)
            .field("response_timeout", &self.response_timeout)
            .field("transport_override", &self.transport_override)
            .field("payload", &self.payload)
            .finish()
    }
}

/// A configuration split for dispatch.
pub(crate) struct Dispatch {
    pub pool: Arc<ConnectionPool>,
    pub destination: Destination,
    pub request: Request<RequestBody>,
    pub stream_failure: oneshot::Receiver<BoxError>,
}

/// Build a request configuration.
///
/// Fails with a configuration error when the target cannot be resolved or
/// an option is malformed. The pre-dispatch hook, if any, runs last.
pub fn build(
    target: &Target,
    options: RequestOptions,
    pools: &Pools,
    defaults: &TimeoutDefaults,
) -> Result<RequestConfig, Error> {
    let RequestOptions {
        method,
        mut headers,
        connect_timeout,
        response_timeout,
        transport_override,
        accept_compression,
        payload,
        connection_pool,
        pre_dispatch_hook,
        invalid,
    } = options;

    if let Some(err) = invalid {
        return Err(err.into());
    }

    let target = target.resolve()?;
    let method = resolve_method(method.as_deref())?;

    let pool = match connection_pool {
        Some(pool) => {
            let wanted = TransportKind::from(target.scheme);
            if pool.kind() != wanted {
                return Err(ConfigurationError::PoolMismatch {
                    pool: pool.kind().as_str(),
                    scheme: target.scheme.as_str(),
                }
                .into());
            }
            pool
        }
        None => pools.for_scheme(target.scheme).clone(),
    };

    if !headers.contains_key(header::HOST) {
        let host = HeaderValue::from_str(&target.authority())
            .map_err(|_| ConfigurationError::InvalidHeader(header::HOST.to_string()))?;
        headers.insert(header::HOST, host);
    }
    if accept_compression {
        headers.insert(
            header::ACCEPT_ENCODING,
            HeaderValue::from_static(ACCEPTED_ENCODINGS),
        );
    }

    // Overrides are honored only when the caller set them explicitly.
    let transport_override = if target.scheme.is_secure() {
        transport_override
    } else {
        None
    };

    let config = RequestConfig {
        connect_timeout: connect_timeout
            .map(|t| t.resolve(defaults.connect))
            .unwrap_or(defaults.connect),
        response_timeout: response_timeout
            .map(|t| t.resolve(defaults.response))
            .unwrap_or(defaults.response),
        target,
        method,
        headers,
        pool,
        transport_override,
        payload,
    };

    Ok(match pre_dispatch_hook {
        Some(hook) => hook(config),
        None => config,
    })
}

fn resolve_method(method: Option<&str>) -> Result<Method, ConfigurationError> {
    let name = method.unwrap_or("GET").trim().to_ascii_uppercase();
    Method::from_bytes(name.as_bytes()).map_err(|_| ConfigurationError::InvalidMethod(name))
}
