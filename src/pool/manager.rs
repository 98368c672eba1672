//! Reusable connection pools.
//!
//! # Responsibilities
//! - Hand out idle connections per destination (pool hit)
//! - Open new connections when none are idle (connect phase)
//! - Take connections back after a clean response, up to a per-host cap

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dashmap::DashMap;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;

use crate::config::PoolConfig;
use crate::error::BoxError;
use crate::observability::metrics;
use crate::pool::connection::{ConnectionId, IdleConnection, PooledConnection};
use crate::pool::connector::{Connect, Destination, TcpConnector, TransportKind};
use crate::pool::tls::TlsConnector;
use crate::request::target::Scheme;

/// Future of a connection that is still completing its handshake.
pub type PendingConnection =
    Pin<Box<dyn Future<Output = Result<PooledConnection, BoxError>> + Send>>;

/// Result of asking a pool for a connection.
pub enum Acquired {
    /// An idle connection, usable right away.
    Ready(PooledConnection),
    /// A new connection; usable once the future resolves.
    Connecting(PendingConnection),
}

/// Keep-alive connection pool for one transport kind.
pub struct ConnectionPool {
    kind: TransportKind,
    connector: Arc<dyn Connect>,
    idle: DashMap<Destination, Vec<IdleConnection>>,
    max_idle_per_host: usize,
    idle_timeout: Duration,
}

static SHARED_PLAIN: OnceLock<Arc<ConnectionPool>> = OnceLock::new();
static SHARED_SECURE: OnceLock<Arc<ConnectionPool>> = OnceLock::new();

impl ConnectionPool {
    pub fn new(kind: TransportKind, connector: Arc<dyn Connect>, config: &PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            kind,
            connector,
            idle: DashMap::new(),
            max_idle_per_host: config.max_idle_per_host.max(1),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs.max(1)),
        })
    }

    /// Plain TCP pool.
    pub fn plain(config: &PoolConfig) -> Arc<Self> {
        Self::new(TransportKind::Plain, Arc::new(TcpConnector), config)
    }

    /// TLS pool trusting the webpki roots.
    pub fn secure(config: &PoolConfig) -> Arc<Self> {
        Self::new(TransportKind::Secure, Arc::new(TlsConnector::new()), config)
    }

    /// Process-wide plain pool, created on first use and never torn down.
    pub fn shared_plain() -> Arc<Self> {
        SHARED_PLAIN
            .get_or_init(|| Self::plain(&PoolConfig::default()))
            .clone()
    }

    /// Process-wide secure pool, created on first use and never torn down.
    pub fn shared_secure() -> Arc<Self> {
        SHARED_SECURE
            .get_or_init(|| Self::secure(&PoolConfig::default()))
            .clone()
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Number of destinations with at least one idle connection.
    pub fn destination_count(&self) -> usize {
        self.idle.len()
    }

    /// Number of idle connections parked for `dest`.
    pub fn idle_count(&self, dest: &Destination) -> usize {
        self.idle.get(dest).map(|v| v.len()).unwrap_or(0)
    }

    /// Borrow a connection for `dest`, reusing an idle one when possible.
    pub fn acquire(self: &Arc<Self>, dest: &Destination) -> Acquired {
        if let Some(conn) = self.checkout_idle(dest) {
            metrics::record_pool_checkout(self.kind, true);
            tracing::debug!(
                connection_id = %conn.id,
                destination = %dest,
                "Reusing pooled connection"
            );
            return Acquired::Ready(conn);
        }

        metrics::record_pool_checkout(self.kind, false);
        tracing::debug!(destination = %dest, "Opening new connection");
        Acquired::Connecting(Box::pin(establish(self.clone(), dest.clone())))
    }

    fn checkout_idle(self: &Arc<Self>, dest: &Destination) -> Option<PooledConnection> {
        let found = {
            let mut idle = self.idle.get_mut(dest)?;
            let mut found = None;
            while let Some(conn) = idle.pop() {
                if conn.is_usable(self.idle_timeout) {
                    found = Some(conn);
                    break;
                }
                conn.discard();
            }
            found
        };
        // Guard dropped; remove_if locks the shard again.
        self.idle.remove_if(dest, |_, idle| idle.is_empty());

        let conn = found?;
        Some(PooledConnection {
            id: conn.id,
            destination: dest.clone(),
            sender: conn.sender,
            driver: conn.driver,
            pool: self.clone(),
            reused: true,
        })
    }

    /// Park a connection for reuse. Closed connections and connections over
    /// the per-host cap are dropped.
    pub(crate) fn release(&self, conn: PooledConnection) {
        if conn.sender.is_closed() || !conn.sender.is_ready() {
            conn.into_idle().discard();
            return;
        }
        let id = conn.id;
        let mut idle = self.idle.entry(conn.destination.clone()).or_default();
        idle.retain(|c| !c.sender.is_closed());
        if idle.len() >= self.max_idle_per_host {
            drop(idle);
            conn.into_idle().discard();
            return;
        }
        idle.push(conn.into_idle());
        tracing::trace!(connection_id = %id, "Connection returned to pool");
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("kind", &self.kind)
            .field("destinations", &self.destination_count())
            .field("max_idle_per_host", &self.max_idle_per_host)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

async fn establish(pool: Arc<ConnectionPool>, dest: Destination) -> Result<PooledConnection, BoxError> {
    let io = pool.connector.connect(&dest).await?;
    let (sender, conn) = http1::handshake(TokioIo::new(io)).await?;

    let id = ConnectionId::new();
    let driver = tokio::spawn(async move {
        match conn.await {
            Ok(()) => tracing::trace!(connection_id = %id, "Connection closed"),
            Err(e) => tracing::debug!(connection_id = %id, error = %e, "Connection closed with error"),
        }
    });

    tracing::debug!(connection_id = %id, destination = %dest, "Connection established");
    Ok(PooledConnection {
        id,
        destination: dest,
        sender,
        driver,
        pool,
        reused: false,
    })
}

/// The two pools a client dispatches to.
#[derive(Debug, Clone)]
pub struct Pools {
    pub plain: Arc<ConnectionPool>,
    pub secure: Arc<ConnectionPool>,
}

impl Pools {
    /// Fresh pools owned by the caller.
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            plain: ConnectionPool::plain(config),
            secure: ConnectionPool::secure(config),
        }
    }

    /// The process-wide pools.
    pub fn shared() -> Self {
        Self {
            plain: ConnectionPool::shared_plain(),
            secure: ConnectionPool::shared_secure(),
        }
    }

    pub fn for_scheme(&self, scheme: Scheme) -> &Arc<ConnectionPool> {
        match TransportKind::from(scheme) {
            TransportKind::Plain => &self.plain,
            TransportKind::Secure => &self.secure,
        }
    }
}
