//! Request lifecycle coordinator.
//!
//! Drives one request from dispatch to settlement:
//!
//! 1. Acquire a connection. A pool hit goes straight to `Connected` and
//!    arms the response timer; a new connection arms the connect timer.
//! 2. Once usable, the connect timer is swapped for the response timer in
//!    one synchronous step.
//! 3. The request and payload are written; the first response event
//!    settles the operation.
//! 4. Any timeout, transport error or payload stream error disarms the live
//!    timer, aborts the connection and settles with a decorated error.

use std::time::Instant;

use crate::error::{decorator, BoxError, Error, RequestContext, TimeoutError};
use crate::lifecycle::settlement::Settlement;
use crate::lifecycle::state::{LifecycleState, Outcome};
use crate::lifecycle::timers::Timers;
use crate::observability::metrics;
use crate::pool::{Acquired, ConnectionId, PooledConnection};
use crate::request::builder::{Dispatch, RequestConfig};
use crate::response::ResponseHandle;

/// Raw failure reported when an operation ends without settling.
#[derive(Debug, thiserror::Error)]
#[error("request ended without an outcome")]
struct Unsettled;

/// One in-flight request.
pub(crate) struct Operation {
    state: LifecycleState,
    history: Vec<LifecycleState>,
    timers: Timers,
    settlement: Settlement<Result<ResponseHandle, Error>>,
    context: RequestContext,
    connection_id: Option<ConnectionId>,
    started: Instant,
}

enum ConnectEvent {
    Usable(Result<PooledConnection, BoxError>),
    TimedOut(TimeoutError),
}

enum ResponseEvent {
    Responded(Result<http::Response<hyper::body::Incoming>, hyper::Error>),
    StreamFailed(BoxError),
    TimedOut(TimeoutError),
}

impl Operation {
    pub fn new(config: &RequestConfig) -> Self {
        Self {
            state: LifecycleState::Created,
            history: vec![LifecycleState::Created],
            timers: Timers::new(config.connect_timeout(), config.response_timeout()),
            settlement: Settlement::new(),
            context: config.context(),
            connection_id: None,
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Every state the operation went through, in order.
    pub fn history(&self) -> &[LifecycleState] {
        &self.history
    }

    #[cfg(test)]
    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// Run the operation to settlement and deliver the outcome.
    pub async fn run(&mut self, config: RequestConfig) -> Result<ResponseHandle, Error> {
        match config.into_dispatch() {
            Ok(dispatch) => self.drive(dispatch).await,
            Err(e) => {
                self.timers.disarm_all();
                self.transition(LifecycleState::Settled(Outcome::Rejected));
                self.settle(Err(e));
            }
        }
        self.deliver()
    }

    async fn drive(&mut self, dispatch: Dispatch) {
        let Dispatch {
            pool,
            destination,
            request,
            mut stream_failure,
        } = dispatch;

        self.transition(LifecycleState::Dispatched);
        tracing::debug!(
            method = %self.context.method(),
            url = %self.context.url(),
            destination = %destination,
            "Dispatching request"
        );

        let mut conn = match pool.acquire(&destination) {
            Acquired::Ready(conn) => {
                self.transition(LifecycleState::Connected);
                self.timers.enter_response_phase();
                conn
            }
            Acquired::Connecting(mut connecting) => {
                self.transition(LifecycleState::Connecting);
                self.timers.arm_connect();

                let event = tokio::select! {
                    biased;
                    res = &mut connecting => ConnectEvent::Usable(res),
                    timeout = self.timers.expired() => ConnectEvent::TimedOut(timeout),
                };

                match event {
                    ConnectEvent::Usable(Ok(conn)) => {
                        self.timers.enter_response_phase();
                        self.transition(LifecycleState::Connected);
                        conn
                    }
                    ConnectEvent::Usable(Err(e)) => {
                        return self.reject(decorator::transport(e, &self.context), None);
                    }
                    ConnectEvent::TimedOut(timeout) => {
                        // Dropping the pending handshake closes the socket.
                        drop(connecting);
                        return self.reject(decorator::timeout(timeout, &self.context), None);
                    }
                }
            }
        };
        self.connection_id = Some(conn.id());

        self.transition(LifecycleState::AwaitingResponse);
        let sending = conn.send(request);
        tokio::pin!(sending);

        let event = tokio::select! {
            biased;
            Ok(err) = &mut stream_failure => ResponseEvent::StreamFailed(err),
            res = &mut sending => ResponseEvent::Responded(res),
            timeout = self.timers.expired() => ResponseEvent::TimedOut(timeout),
        };

        match event {
            ResponseEvent::Responded(Ok(response)) => {
                self.timers.disarm_all();
                tracing::debug!(
                    connection_id = %conn.id(),
                    status = %response.status(),
                    reused = conn.is_reused(),
                    "Response received"
                );
                let handle = ResponseHandle::new(response, conn, self.context.clone());
                self.transition(LifecycleState::Settled(Outcome::Fulfilled));
                self.settle(Ok(handle));
            }
            ResponseEvent::Responded(Err(e)) => {
                // A payload failure surfaces through hyper as well; report the source.
                let err = match stream_failure.try_recv() {
                    Ok(source) => decorator::stream_source(source, &self.context),
                    Err(_) => decorator::transport(e, &self.context),
                };
                self.reject(err, Some(conn));
            }
            ResponseEvent::StreamFailed(source) => {
                self.reject(decorator::stream_source(source, &self.context), Some(conn));
            }
            ResponseEvent::TimedOut(timeout) => {
                self.reject(decorator::timeout(timeout, &self.context), Some(conn));
            }
        }
    }

    fn transition(&mut self, next: LifecycleState) {
        if !self.state.can_transition_to(next) {
            tracing::trace!(from = %self.state, to = %next, "Ignoring illegal transition");
            return;
        }
        tracing::trace!(from = %self.state, to = %next, "Lifecycle transition");
        self.state = next;
        self.history.push(next);
    }

    /// Disarm timers, abort the connection and settle with `err`.
    fn reject(&mut self, err: Error, conn: Option<PooledConnection>) {
        self.timers.disarm_all();
        if let Some(conn) = conn {
            conn.abort();
        }
        tracing::warn!(
            method = %self.context.method(),
            url = %self.context.url(),
            connection_id = ?self.connection_id.map(|id| id.to_string()),
            kind = %err.kind(),
            error = %err.message(),
            "Request failed"
        );
        self.transition(LifecycleState::Settled(Outcome::Rejected));
        self.settle(Err(err));
    }

    fn settle(&mut self, outcome: Result<ResponseHandle, Error>) {
        debug_assert!(self.timers.is_idle(), "settling with a live timer");
        let label = metrics::outcome_label(outcome.as_ref().err().map(Error::kind));
        metrics::record_settlement(self.context.method().as_str(), label, self.started);
        if let Err(late) = self.settlement.settle(outcome) {
            tracing::trace!(ok = late.is_ok(), "Late settlement ignored");
        }
    }

    fn deliver(&mut self) -> Result<ResponseHandle, Error> {
        match self.settlement.take() {
            Some(outcome) => outcome,
            None => Err(decorator::transport(Unsettled, &self.context)),
        }
    }
}

/// Execute one request described by `config`.
pub async fn execute(config: RequestConfig) -> Result<ResponseHandle, Error> {
    let mut operation = Operation::new(&config);
    let outcome = operation.run(config).await;
    tracing::trace!(
        state = %operation.state(),
        transitions = operation.history().len(),
        "Operation finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::error::ErrorKind;
    use crate::error::Phase;
    use crate::pool::{
        BoxedIo, Connect, Connecting, ConnectionPool, Destination, Pools, TransportKind,
    };
    use crate::request::{build, Payload, RequestOptions, Target, TimeoutDefaults};
    use bytes::Bytes;
    use futures_util::stream;
    use http_body_util::{BodyExt, Full};
    use hyper::service::service_fn;
    use hyper_util::rt::TokioIo;
    use std::convert::Infallible;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Never completes its handshake.
    struct Stalled;

    impl Connect for Stalled {
        fn connect(&self, _dest: &Destination) -> Connecting {
            Box::pin(std::future::pending())
        }
    }

    /// In-memory transport served by a hyper server. Requests to `/slow`
    /// are never answered.
    #[derive(Default)]
    struct InMemory {
        opened: Arc<AtomicUsize>,
    }

    impl Connect for InMemory {
        fn connect(&self, _dest: &Destination) -> Connecting {
            self.opened.fetch_add(1, Ordering::SeqCst);
            let (client, server) = tokio::io::duplex(64 * 1024);
            tokio::spawn(async move {
                let service = service_fn(|req: hyper::Request<hyper::body::Incoming>| async move {
                    if req.uri().path() == "/slow" {
                        std::future::pending::<()>().await;
                    }
                    let body = req.into_body().collect().await.map(|b| b.to_bytes());
                    let body = body.unwrap_or_default();
                    Ok::<_, Infallible>(hyper::Response::new(Full::new(body)))
                });
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(server), service)
                    .await;
            });
            Box::pin(async move { Ok(Box::new(client) as BoxedIo) })
        }
    }

    fn pool_with(connector: impl Connect) -> Arc<ConnectionPool> {
        ConnectionPool::new(TransportKind::Plain, Arc::new(connector), &PoolConfig::default())
    }

    fn config(url: &str, pool: &Arc<ConnectionPool>, options: RequestOptions) -> RequestConfig {
        build(
            &Target::from(url),
            options.connection_pool(pool.clone()),
            &Pools::new(&PoolConfig::default()),
            &TimeoutDefaults::default(),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_handshake_times_out_in_connect_phase() {
        let pool = pool_with(Stalled);
        let config = config(
            "http://example.test/a",
            &pool,
            RequestOptions::new().connect_timeout_ms(100u64),
        );

        let started = tokio::time::Instant::now();
        let mut op = Operation::new(&config);
        let err = op.run(config).await.unwrap_err();

        assert_eq!(started.elapsed(), Duration::from_millis(100));
        assert!(err.is_connect_timeout());
        assert_eq!(err.timeout_bound(), Some(Duration::from_millis(100)));
        assert_eq!(
            err.to_string(),
            "RequestTimeout: ConnectTimeout(100). GET http://example.test/a failed."
        );
        assert!(op.timers().is_idle());
        assert_eq!(
            op.history(),
            &[
                LifecycleState::Created,
                LifecycleState::Dispatched,
                LifecycleState::Connecting,
                LifecycleState::Settled(Outcome::Rejected),
            ]
        );
    }

    #[tokio::test]
    async fn new_connection_goes_through_connecting() {
        let pool = pool_with(InMemory::default());
        let config = config("http://example.test/echo", &pool, RequestOptions::new());

        let mut op = Operation::new(&config);
        let handle = op.run(config).await.unwrap();

        assert_eq!(handle.status(), http::StatusCode::OK);
        assert!(!handle.reused_connection());
        assert!(op.timers().is_idle());
        assert_eq!(
            op.history(),
            &[
                LifecycleState::Created,
                LifecycleState::Dispatched,
                LifecycleState::Connecting,
                LifecycleState::Connected,
                LifecycleState::AwaitingResponse,
                LifecycleState::Settled(Outcome::Fulfilled),
            ]
        );
    }

    #[tokio::test]
    async fn pool_hit_skips_connect_phase() {
        let connector = InMemory::default();
        let opened = connector.opened.clone();
        let pool = pool_with(connector);

        let first = execute(config("http://example.test/one", &pool, RequestOptions::new()))
            .await
            .unwrap();
        let first_id = first.connection_id();
        first.bytes().await.unwrap();

        let config = config("http://example.test/two", &pool, RequestOptions::new());
        let mut op = Operation::new(&config);
        let second = op.run(config).await.unwrap();

        assert!(second.reused_connection());
        assert_eq!(second.connection_id(), first_id);
        assert_eq!(opened.load(Ordering::SeqCst), 1);
        assert_eq!(
            op.history(),
            &[
                LifecycleState::Created,
                LifecycleState::Dispatched,
                LifecycleState::Connected,
                LifecycleState::AwaitingResponse,
                LifecycleState::Settled(Outcome::Fulfilled),
            ]
        );
    }

    #[tokio::test]
    async fn payload_round_trips_unmodified() {
        let pool = pool_with(InMemory::default());
        let config = config(
            "http://example.test/echo",
            &pool,
            RequestOptions::new().method("put").payload("exactly this payload"),
        );
        let body = execute(config).await.unwrap().bytes().await.unwrap();
        assert_eq!(&body[..], b"exactly this payload");
    }

    #[tokio::test(start_paused = true)]
    async fn silent_server_times_out_in_response_phase() {
        let pool = pool_with(InMemory::default());
        let config = config(
            "http://example.test/slow",
            &pool,
            RequestOptions::new().response_timeout_ms(250u64),
        );

        let mut op = Operation::new(&config);
        let err = op.run(config).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(!err.is_connect_timeout());
        assert_eq!(
            err.kind(),
            &ErrorKind::RequestTimeout {
                phase: Phase::Response,
                bound: Duration::from_millis(250),
            }
        );
        assert!(op.timers().is_idle());
        let dest = Destination {
            kind: TransportKind::Plain,
            host: "example.test".into(),
            port: 80,
            verify_certificates: true,
        };
        assert_eq!(pool.idle_count(&dest), 0, "aborted connection must not be pooled");
    }

    #[tokio::test]
    async fn stream_error_settles_with_stream_source_failure() {
        let pool = pool_with(InMemory::default());
        let chunks = vec![
            Ok(Bytes::from_static(b"first chunk")),
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "upstream file vanished")),
        ];
        let config = config(
            "http://example.test/upload",
            &pool,
            RequestOptions::new()
                .method("POST")
                .payload(Payload::stream(stream::iter(chunks))),
        );

        let mut op = Operation::new(&config);
        let err = op.run(config).await.unwrap_err();

        assert_eq!(err.kind(), &ErrorKind::StreamSourceFailure);
        assert_eq!(err.message(), "upstream file vanished");
        assert_eq!(err.context(), Some("POST http://example.test/upload failed."));
        assert!(op.timers().is_idle());
        assert_eq!(op.state(), LifecycleState::Settled(Outcome::Rejected));
    }

    #[tokio::test]
    async fn transport_error_settles_once() {
        struct Refusing;
        impl Connect for Refusing {
            fn connect(&self, _dest: &Destination) -> Connecting {
                Box::pin(async {
                    Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"))
                })
            }
        }

        let pool = pool_with(Refusing);
        let config = config("http://example.test/", &pool, RequestOptions::new());
        let mut op = Operation::new(&config);
        let err = op.run(config).await.unwrap_err();

        assert_eq!(err.kind(), &ErrorKind::TransportFailure);
        assert!(err.to_string().ends_with("GET http://example.test/ failed."));
        assert!(op.settlement.is_settled());
        assert!(op.settlement.take().is_none(), "outcome delivered exactly once");
    }
}
