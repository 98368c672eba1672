//! Request payloads and the body type handed to the transport.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use hyper::body::{Body, Frame, SizeHint};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::error::BoxError;

/// A readable byte stream used as a streaming payload.
pub type PayloadStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

/// Request payload: nothing, an in-memory buffer, or a byte stream.
#[derive(Default)]
pub enum Payload {
    #[default]
    Empty,
    Buffer(Bytes),
    Stream(PayloadStream),
}

impl Payload {
    /// Wrap a fallible byte stream. Any error it yields fails the request
    /// with `StreamSourceFailure`.
    pub fn stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Payload::Stream(Box::pin(stream.map(|item| item.map_err(Into::into))))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Empty => true,
            Payload::Buffer(b) => b.is_empty(),
            Payload::Stream(_) => false,
        }
    }

    /// Turn the payload into a transport body.
    ///
    /// The returned receiver yields the source error if a streaming payload
    /// fails mid-transmission; it is closed once the body is dropped.
    pub(crate) fn into_body(self) -> (RequestBody, oneshot::Receiver<BoxError>) {
        let (tx, rx) = oneshot::channel();
        let kind = match self {
            Payload::Empty => BodyKind::Empty,
            Payload::Buffer(b) if b.is_empty() => BodyKind::Empty,
            Payload::Buffer(b) => BodyKind::Full(Some(b)),
            Payload::Stream(s) => BodyKind::Streaming(s),
        };
        let body = RequestBody {
            kind,
            failure: Some(tx),
        };
        (body, rx)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Empty => f.write_str("Empty"),
            Payload::Buffer(b) => f.debug_tuple("Buffer").field(&b.len()).finish(),
            Payload::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl From<&'static str> for Payload {
    fn from(s: &'static str) -> Self {
        Payload::Buffer(Bytes::from_static(s.as_bytes()))
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Buffer(Bytes::from(s))
    }
}

impl From<&'static [u8]> for Payload {
    fn from(b: &'static [u8]) -> Self {
        Payload::Buffer(Bytes::from_static(b))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Payload::Buffer(Bytes::from(b))
    }
}

impl From<Bytes> for Payload {
    fn from(b: Bytes) -> Self {
        Payload::Buffer(b)
    }
}

/// Error handed to the transport when the payload source fails. The
/// original error travels to the coordinator separately.
#[derive(Debug, Error)]
#[error("payload stream aborted: {0}")]
pub(crate) struct PayloadAborted(String);

enum BodyKind {
    Empty,
    Full(Option<Bytes>),
    Streaming(PayloadStream),
}

/// Body of an outbound request.
pub(crate) struct RequestBody {
    kind: BodyKind,
    failure: Option<oneshot::Sender<BoxError>>,
}

impl Body for RequestBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match &mut this.kind {
            BodyKind::Empty => Poll::Ready(None),
            BodyKind::Full(data) => Poll::Ready(data.take().map(|b| Ok(Frame::data(b)))),
            BodyKind::Streaming(stream) => match stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(Frame::data(chunk)))),
                Poll::Ready(Some(Err(err))) => {
                    let aborted = PayloadAborted(err.to_string());
                    if let Some(tx) = this.failure.take() {
                        let _ = tx.send(err);
                    }
                    this.kind = BodyKind::Empty;
                    Poll::Ready(Some(Err(Box::new(aborted))))
                }
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            },
        }
    }

    fn is_end_stream(&self) -> bool {
        matches!(self.kind, BodyKind::Empty | BodyKind::Full(None))
    }

    fn size_hint(&self) -> SizeHint {
        match &self.kind {
            BodyKind::Empty | BodyKind::Full(None) => SizeHint::with_exact(0),
            BodyKind::Full(Some(b)) => SizeHint::with_exact(b.len() as u64),
            BodyKind::Streaming(_) => SizeHint::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use http_body_util::BodyExt;
    use std::io;

    #[tokio::test]
    async fn buffer_is_sent_whole_with_exact_length() {
        let (body, _rx) = Payload::from("hello").into_body();
        assert_eq!(body.size_hint().exact(), Some(5));
        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(&collected[..], b"hello");
    }

    #[tokio::test]
    async fn empty_buffer_is_end_of_stream() {
        let (body, _rx) = Payload::from(Vec::new()).into_body();
        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));
    }

    #[tokio::test]
    async fn stream_forwards_chunks_in_order() {
        let chunks = vec![
            Ok::<_, io::Error>(Bytes::from_static(b"ab")),
            Ok(Bytes::from_static(b"cd")),
        ];
        let (body, mut rx) = Payload::stream(stream::iter(chunks)).into_body();
        assert_eq!(body.size_hint().exact(), None);

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(&collected[..], b"abcd");
        // Sender dropped with the body, nothing reported.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stream_error_is_reported_to_the_receiver() {
        let chunks = vec![
            Ok(Bytes::from_static(b"ab")),
            Err(io::Error::new(io::ErrorKind::Other, "source exploded")),
        ];
        let (body, rx) = Payload::stream(stream::iter(chunks)).into_body();

        let err = body.collect().await.err().unwrap();
        assert!(err.to_string().contains("source exploded"));

        let original = rx.await.unwrap();
        assert_eq!(original.to_string(), "source exploded");
    }
}
