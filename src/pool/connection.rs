//! Pooled connections and their identity.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Own the request half and the driver task of one HTTP/1.1 connection
//! - Abort (close, never reuse) or release (back to the pool) a connection

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use http::{Request, Response};
use hyper::body::Incoming;
use hyper::client::conn::http1::SendRequest;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::pool::connector::Destination;
use crate::pool::manager::ConnectionPool;
use crate::request::payload::RequestBody;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A usable connection borrowed from a [`ConnectionPool`].
///
/// Must end in exactly one of [`abort`](Self::abort) or a release back to
/// the pool. Dropping it without either closes the connection once hyper
/// notices the request half is gone.
pub struct PooledConnection {
    pub(crate) id: ConnectionId,
    pub(crate) destination: Destination,
    pub(crate) sender: SendRequest<RequestBody>,
    pub(crate) driver: JoinHandle<()>,
    pub(crate) pool: Arc<ConnectionPool>,
    pub(crate) reused: bool,
}

impl PooledConnection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Whether this connection came out of the idle set.
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Write the request; resolves at the first response event.
    pub(crate) fn send(
        &mut self,
        request: Request<RequestBody>,
    ) -> impl Future<Output = Result<Response<Incoming>, hyper::Error>> {
        self.sender.send_request(request)
    }

    /// Forcibly close the connection. It is never returned to the pool.
    pub fn abort(self) {
        self.driver.abort();
        metrics::record_connection_aborted(self.destination.kind);
        tracing::debug!(
            connection_id = %self.id,
            destination = %self.destination,
            "Connection aborted"
        );
    }

    /// Wait for hyper to report the connection reusable, then hand it back
    /// to its pool. Connections that close instead are dropped.
    pub(crate) async fn release_when_ready(mut self) {
        match self.sender.ready().await {
            Ok(()) => {
                let pool = self.pool.clone();
                pool.release(self);
            }
            Err(e) => {
                tracing::trace!(
                    connection_id = %self.id,
                    error = %e,
                    "Connection not reusable, discarding"
                );
            }
        }
    }

    pub(crate) fn into_idle(self) -> IdleConnection {
        IdleConnection {
            id: self.id,
            sender: self.sender,
            driver: self.driver,
            idle_since: Instant::now(),
        }
    }
}

/// A connection parked in the idle set.
pub(crate) struct IdleConnection {
    pub id: ConnectionId,
    pub sender: SendRequest<RequestBody>,
    pub driver: JoinHandle<()>,
    pub idle_since: Instant,
}

impl IdleConnection {
    pub fn is_usable(&self, idle_timeout: std::time::Duration) -> bool {
        !self.sender.is_closed() && self.sender.is_ready() && self.idle_since.elapsed() < idle_timeout
    }

    pub fn discard(self) {
        self.driver.abort();
        tracing::trace!(connection_id = %self.id, "Idle connection discarded");
    }
}
