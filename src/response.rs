//! Response handle handed to the caller at settlement.
//!
//! The handle owns the response head and a [`ResponseBody`] that holds the
//! lease on the connection. Reading the body to its end returns the
//! connection to its pool before the end of stream is reported; dropping
//! the body early lets hyper decide whether the connection survives.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode, Version};
use http_body_util::BodyExt;
use hyper::body::{Body, Frame, Incoming, SizeHint};

use crate::error::{decorator, Error, RequestContext};
use crate::pool::{ConnectionId, PooledConnection};

/// Upper bound on waiting for hyper to mark a drained connection reusable.
const RELEASE_WAIT: Duration = Duration::from_secs(1);

type Releasing = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A successful response: status and headers are available, the body has
/// not been read yet.
pub struct ResponseHandle {
    response: Response<ResponseBody>,
    context: RequestContext,
    connection_id: ConnectionId,
    reused: bool,
}

impl ResponseHandle {
    pub(crate) fn new(
        response: Response<Incoming>,
        conn: PooledConnection,
        context: RequestContext,
    ) -> Self {
        let connection_id = conn.id();
        let reused = conn.is_reused();
        let (parts, body) = response.into_parts();
        Self {
            response: Response::from_parts(parts, ResponseBody::new(body, conn)),
            context,
            connection_id,
            reused,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn version(&self) -> Version {
        self.response.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    /// Connection the response arrived on.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Whether the request went out on a pooled connection.
    pub fn reused_connection(&self) -> bool {
        self.reused
    }

    /// Read the whole body. The connection is back in its pool on return.
    pub async fn bytes(self) -> Result<Bytes, Error> {
        let ResponseHandle {
            response, context, ..
        } = self;

        match response.into_body().collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(e) => Err(decorator::transport(e, &context)),
        }
    }

    /// Read the whole body as text, replacing invalid UTF-8.
    pub async fn text(self) -> Result<String, Error> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Give up the handle for the raw response.
    pub fn into_inner(self) -> Response<ResponseBody> {
        self.response
    }
}

impl fmt::Debug for ResponseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHandle")
            .field("status", &self.response.status())
            .field("version", &self.response.version())
            .field("connection_id", &self.connection_id)
            .field("reused", &self.reused)
            .finish()
    }
}

/// Response body holding the connection lease.
///
/// Once the last frame has been read the connection is handed back to its
/// pool, and only then is the end of stream reported. A body error aborts
/// the connection.
pub struct ResponseBody {
    inner: Incoming,
    lease: Lease,
    releasing: Option<Releasing>,
}

impl ResponseBody {
    fn new(inner: Incoming, conn: PooledConnection) -> Self {
        Self {
            inner,
            lease: Lease(Some(conn)),
            releasing: None,
        }
    }
}

impl Body for ResponseBody {
    type Data = Bytes;
    type Error = hyper::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if let Some(releasing) = this.releasing.as_mut() {
            ready!(releasing.as_mut().poll(cx));
            this.releasing = None;
            return Poll::Ready(None);
        }

        match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
            Some(Ok(frame)) => Poll::Ready(Some(Ok(frame))),
            Some(Err(e)) => {
                if let Some(conn) = this.lease.take() {
                    conn.abort();
                }
                Poll::Ready(Some(Err(e)))
            }
            None => {
                let Some(conn) = this.lease.take() else {
                    return Poll::Ready(None);
                };
                let mut releasing: Releasing = Box::pin(async move {
                    let _ = tokio::time::timeout(RELEASE_WAIT, conn.release_when_ready()).await;
                });
                match releasing.as_mut().poll(cx) {
                    Poll::Ready(()) => Poll::Ready(None),
                    Poll::Pending => {
                        this.releasing = Some(releasing);
                        Poll::Pending
                    }
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.lease.0.is_none() && self.releasing.is_none() && self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody")
            .field("leased", &self.lease.0.is_some())
            .field("releasing", &self.releasing.is_some())
            .finish()
    }
}

/// Connection lease. Hands the connection back on drop.
struct Lease(Option<PooledConnection>);

impl Lease {
    fn take(&mut self) -> Option<PooledConnection> {
        self.0.take()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let Some(conn) = self.0.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(conn.release_when_ready());
            }
            Err(_) => tracing::trace!(
                connection_id = %conn.id(),
                "No runtime to return connection, dropping it"
            ),
        }
    }
}
