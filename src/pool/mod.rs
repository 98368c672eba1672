//! Connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! acquire(destination)
//!     → idle connection for the destination?  → Acquired::Ready   (pool hit)
//!     → otherwise connector.connect()          → Acquired::Connecting
//!         → TCP (+ TLS) handshake
//!         → hyper http1 handshake, driver task spawned
//!
//! After the response:
//!     body fully read and hyper reports ready → release() → idle set
//!     any failure                             → abort()   → closed, never reused
//! ```
//!
//! # Design Decisions
//! - One pool per transport kind; the process-wide pools are lazy singletons
//!   but every client can be given its own
//! - Certificate verification mode is part of the pool key
//! - The transport sits behind the [`Connect`] trait so it can be replaced

pub mod connection;
pub mod connector;
pub mod manager;
pub mod tls;

pub use connection::{ConnectionId, PooledConnection};
pub use connector::{BoxedIo, Connect, Connecting, Destination, Io, TcpConnector, TransportKind};
pub use manager::{Acquired, ConnectionPool, PendingConnection, Pools};
pub use tls::TlsConnector;
