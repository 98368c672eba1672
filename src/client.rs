//! Client entry points.

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::lifecycle::coordinator;
use crate::pool::{ConnectionPool, Pools};
use crate::request::{build, RequestConfig, RequestOptions, Target, TimeoutDefaults};
use crate::response::ResponseHandle;

/// An HTTP/1.1 client bound to a pair of connection pools.
///
/// Cloning is cheap; clones share pools.
#[derive(Debug, Clone)]
pub struct Client {
    pools: Pools,
    defaults: TimeoutDefaults,
}

impl Client {
    /// Client on the process-wide pools with default timeouts.
    pub fn new() -> Self {
        Self {
            pools: Pools::shared(),
            defaults: TimeoutDefaults::default(),
        }
    }

    /// Client on caller-supplied pools.
    pub fn with_pools(plain: Arc<ConnectionPool>, secure: Arc<ConnectionPool>) -> Self {
        Self {
            pools: Pools { plain, secure },
            defaults: TimeoutDefaults::default(),
        }
    }

    /// Client with its own pools and timeout defaults taken from `config`.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            pools: Pools::new(&config.pool),
            defaults: config.timeouts.resolve(),
        }
    }

    pub fn pools(&self) -> &Pools {
        &self.pools
    }

    pub fn timeout_defaults(&self) -> TimeoutDefaults {
        self.defaults
    }

    /// Build the request configuration without dispatching it.
    pub fn build(&self, target: impl Into<Target>, options: RequestOptions) -> Result<RequestConfig> {
        build(&target.into(), options, &self.pools, &self.defaults)
    }

    /// Send a request and wait for the response head.
    pub async fn request(
        &self,
        target: impl Into<Target>,
        options: RequestOptions,
    ) -> Result<ResponseHandle> {
        let config = self.build(target, options)?;
        coordinator::execute(config).await
    }

    /// Dispatch a configuration built earlier.
    pub async fn send(&self, config: RequestConfig) -> Result<ResponseHandle> {
        coordinator::execute(config).await
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

/// Send a request through the process-wide pools.
pub async fn request(target: impl Into<Target>, options: RequestOptions) -> Result<ResponseHandle> {
    Client::new().request(target, options).await
}
