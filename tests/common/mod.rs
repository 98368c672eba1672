//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use keepalive_client::pool::{Connect, Connecting, Destination};

/// What a backend saw for one request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: http::HeaderMap,
    pub body: Bytes,
}

/// A running mock backend.
#[derive(Clone)]
pub struct Backend {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl Backend {
    /// TCP (or TLS) connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn url(&self, scheme: &str, path: &str) -> String {
        format!("{}://localhost:{}{}", scheme, self.addr.port(), path)
    }
}

/// Echo backend: responds 200 with the request body. `/slow` never answers.
pub async fn start_echo_backend() -> Backend {
    start_backend(None).await
}

/// Echo backend behind TLS with a fresh self-signed certificate for
/// `localhost`. Returns the certificate so clients can trust it.
pub async fn start_tls_echo_backend() -> (Backend, CertificateDer<'static>) {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert = certified.cert.der().clone();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.clone()], key)
        .unwrap();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(config));

    (start_backend(Some(acceptor)).await, cert)
}

async fn start_backend(tls: Option<tokio_rustls::TlsAcceptor>) -> Backend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = Backend {
        addr: listener.local_addr().unwrap(),
        connections: Arc::new(AtomicUsize::new(0)),
        requests: Arc::new(Mutex::new(Vec::new())),
    };

    let state = backend.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            state.connections.fetch_add(1, Ordering::SeqCst);
            let requests = state.requests.clone();
            let tls = tls.clone();
            tokio::spawn(async move {
                match tls {
                    Some(acceptor) => {
                        if let Ok(stream) = acceptor.accept(socket).await {
                            serve_echo(stream, requests).await;
                        }
                    }
                    None => serve_echo(socket, requests).await,
                }
            });
        }
    });

    backend
}

async fn serve_echo<S>(io: S, requests: Arc<Mutex<Vec<RecordedRequest>>>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let service = service_fn(move |req: Request<Incoming>| {
        let requests = requests.clone();
        async move {
            let (parts, body) = req.into_parts();
            if parts.uri.path() == "/slow" {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let body = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(_) => Bytes::new(),
            };
            requests.lock().unwrap().push(RecordedRequest {
                method: parts.method.to_string(),
                path: parts.uri.to_string(),
                headers: parts.headers,
                body: body.clone(),
            });
            Ok::<_, Infallible>(Response::new(Full::new(body)))
        }
    });
    let _ = hyper::server::conn::http1::Builder::new()
        .serve_connection(TokioIo::new(io), service)
        .await;
}

/// Backend that reads requests and never answers. `closed` is notified
/// when the client closes its side.
pub struct SilentBackend {
    pub addr: SocketAddr,
    pub closed: Arc<Notify>,
}

pub async fn start_silent_backend() -> SilentBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let closed = Arc::new(Notify::new());

    let notify = closed.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let notify = notify.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => continue,
                    }
                }
                notify.notify_one();
            });
        }
    });

    SilentBackend { addr, closed }
}

/// Connector whose handshake never completes.
pub struct StalledConnector;

impl Connect for StalledConnector {
    fn connect(&self, _dest: &Destination) -> Connecting {
        Box::pin(std::future::pending())
    }
}
