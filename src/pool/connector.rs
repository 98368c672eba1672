//! Transport seam: opening a byte stream to a destination.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::request::target::Scheme;

/// A bidirectional byte stream a connection runs over.
pub trait Io: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Io for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

pub type BoxedIo = Box<dyn Io>;

/// Future resolving once the transport (and TLS) handshake completed.
pub type Connecting = Pin<Box<dyn Future<Output = io::Result<BoxedIo>> + Send>>;

/// Kind of transport a pool hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Plain,
    Secure,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Plain => "plain",
            TransportKind::Secure => "secure",
        }
    }
}

impl From<Scheme> for TransportKind {
    fn from(scheme: Scheme) -> Self {
        match scheme {
            Scheme::Http => TransportKind::Plain,
            Scheme::Https => TransportKind::Secure,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pool key. Connections are only shared between requests with equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub kind: TransportKind,
    /// Host without IPv6 brackets.
    pub host: String,
    pub port: u16,
    pub verify_certificates: bool,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.kind, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.kind, self.host, self.port)
        }
    }
}

/// Opens transport connections.
pub trait Connect: Send + Sync + 'static {
    fn connect(&self, dest: &Destination) -> Connecting;
}

/// Plain TCP with `TCP_NODELAY`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connect for TcpConnector {
    fn connect(&self, dest: &Destination) -> Connecting {
        let host = dest.host.clone();
        let port = dest.port;
        Box::pin(async move {
            let stream = TcpStream::connect((host.as_str(), port)).await?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream) as BoxedIo)
        })
    }
}
