//! HTTP/1.1 client with keep-alive connection pools and two-phase timeouts.
//!
//! Every request runs through a small lifecycle: a connection is taken from
//! the pool or opened, bounded by the connect timeout; the request is
//! written and the response head awaited, bounded by the response timeout.
//! The first outcome wins. Failures carry their phase and the
//! `"<METHOD> <url> failed."` context.
//!
//! ```no_run
//! use keepalive_client::{Client, RequestOptions};
//!
//! # async fn run() -> keepalive_client::Result<()> {
//! let client = Client::new();
//! let response = client
//!     .request("https://example.test/status", RequestOptions::new().connect_timeout_ms(500))
//!     .await?;
//! let body = response.text().await?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod pool;
pub mod request;
pub mod response;

pub use client::{request, Client};
pub use config::{load_config, ClientConfig};
pub use error::{Error, ErrorKind, Phase, Result};
pub use pool::{ConnectionId, ConnectionPool, Pools, TransportKind};
pub use request::{
    Payload, RequestConfig, RequestOptions, Target, TargetParts, TransportOverride,
};
pub use response::{ResponseBody, ResponseHandle};
