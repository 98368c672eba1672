//! Caller-facing request options.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::ConfigurationError;
use crate::pool::ConnectionPool;
use crate::request::builder::RequestConfig;
use crate::request::payload::Payload;

/// Fallback for both phase timeouts.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// A timeout as supplied by a caller.
///
/// Only positive whole milliseconds are honored; zero, negative and
/// fractional values resolve to the default instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutSetting(Option<u64>);

impl TimeoutSetting {
    pub fn resolve(&self, default: Duration) -> Duration {
        match self.0 {
            Some(ms) => Duration::from_millis(ms),
            None => default,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_some()
    }
}

impl From<u64> for TimeoutSetting {
    fn from(ms: u64) -> Self {
        Self((ms > 0).then_some(ms))
    }
}

impl From<u32> for TimeoutSetting {
    fn from(ms: u32) -> Self {
        Self::from(u64::from(ms))
    }
}

impl From<i64> for TimeoutSetting {
    fn from(ms: i64) -> Self {
        Self(u64::try_from(ms).ok().filter(|ms| *ms > 0))
    }
}

impl From<i32> for TimeoutSetting {
    fn from(ms: i32) -> Self {
        Self::from(i64::from(ms))
    }
}

impl From<f64> for TimeoutSetting {
    fn from(ms: f64) -> Self {
        let whole = ms.is_finite() && ms.fract() == 0.0 && ms > 0.0 && ms <= u64::MAX as f64;
        Self(whole.then_some(ms as u64))
    }
}

impl From<Duration> for TimeoutSetting {
    fn from(d: Duration) -> Self {
        let whole = d.subsec_nanos() % 1_000_000 == 0;
        let ms = u64::try_from(d.as_millis()).ok();
        Self(ms.filter(|ms| whole && *ms > 0))
    }
}

/// Default phase timeouts applied when a request does not set its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutDefaults {
    pub connect: Duration,
    pub response: Duration,
}

impl Default for TimeoutDefaults {
    fn default() -> Self {
        Self {
            connect: DEFAULT_TIMEOUT,
            response: DEFAULT_TIMEOUT,
        }
    }
}

/// Transport-level overrides, honored for secure targets only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportOverride {
    /// `Some(false)` disables certificate verification.
    pub reject_unauthorized: Option<bool>,
}

impl TransportOverride {
    pub fn insecure() -> Self {
        Self {
            reject_unauthorized: Some(false),
        }
    }

    pub fn verifies_certificates(&self) -> bool {
        self.reject_unauthorized.unwrap_or(true)
    }
}

/// Transform applied once to a built configuration before dispatch.
pub type PreDispatchHook = Arc<dyn Fn(RequestConfig) -> RequestConfig + Send + Sync>;

/// Options for a single request. Everything is optional.
///
/// ```no_run
/// use keepalive_client::{request, RequestOptions};
///
/// # async fn run() -> keepalive_client::Result<()> {
/// let options = RequestOptions::new()
///     .method("post")
///     .header("content-type", "application/json")
///     .payload(r#"{"id":1}"#)
///     .connect_timeout_ms(1000)
///     .response_timeout_ms(2500);
/// let response = request("http://example.test/items", options).await?;
/// println!("{}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct RequestOptions {
    pub(crate) method: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) connect_timeout: Option<TimeoutSetting>,
    pub(crate) response_timeout: Option<TimeoutSetting>,
    pub(crate) transport_override: Option<TransportOverride>,
    pub(crate) accept_compression: bool,
    pub(crate) payload: Payload,
    pub(crate) connection_pool: Option<Arc<ConnectionPool>>,
    pub(crate) pre_dispatch_hook: Option<PreDispatchHook>,
    pub(crate) invalid: Option<ConfigurationError>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Method name, case-insensitive. Defaults to `GET`.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Add a header. Invalid names or values fail the request at build time.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let parsed = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        );
        match parsed {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => {
                self.invalid
                    .get_or_insert(ConfigurationError::InvalidHeader(name.to_string()));
            }
        }
        self
    }

    /// Replace all headers.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn connect_timeout_ms(mut self, ms: impl Into<TimeoutSetting>) -> Self {
        self.connect_timeout = Some(ms.into());
        self
    }

    pub fn response_timeout_ms(mut self, ms: impl Into<TimeoutSetting>) -> Self {
        self.response_timeout = Some(ms.into());
        self
    }

    pub fn transport_override(mut self, overrides: TransportOverride) -> Self {
        self.transport_override = Some(overrides);
        self
    }

    /// Advertise `gzip,deflate` support. Decoding is left to the caller.
    pub fn accept_compression(mut self, enabled: bool) -> Self {
        self.accept_compression = enabled;
        self
    }

    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Use this pool instead of the client's pool for the target scheme.
    pub fn connection_pool(mut self, pool: Arc<ConnectionPool>) -> Self {
        self.connection_pool = Some(pool);
        self
    }

    pub fn pre_dispatch_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(RequestConfig) -> RequestConfig + Send + Sync + 'static,
    {
        self.pre_dispatch_hook = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("connect_timeout", &self.connect_timeout)
            .field("response_timeout", &self.response_timeout)
            .field("transport_override", &self.transport_override)
            .field("accept_compression", &self.accept_compression)
            .field("payload", &self.payload)
            .field("pre_dispatch_hook", &self.pre_dispatch_hook.is_some())
            .finish()
    }
}
