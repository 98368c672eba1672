//! Client metrics.
//!
//! # Metrics
//! - `http_client_requests_total` (counter): settled requests by method, outcome
//! - `http_client_request_duration_seconds` (histogram): dispatch to settlement
//! - `http_client_pool_checkouts_total` (counter): pool hits and misses by kind
//! - `http_client_connections_aborted_total` (counter): aborted connections by kind
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! every call is a no-op.

use std::time::Instant;

use metrics::{counter, histogram};

use crate::error::{ErrorKind, Phase};
use crate::pool::TransportKind;

/// Outcome label for a settled request.
pub fn outcome_label(error: Option<&ErrorKind>) -> &'static str {
    match error {
        None => "ok",
        Some(ErrorKind::Configuration) => "configuration",
        Some(ErrorKind::RequestTimeout {
            phase: Phase::Connect,
            ..
        }) => "connect_timeout",
        Some(ErrorKind::RequestTimeout {
            phase: Phase::Response,
            ..
        }) => "response_timeout",
        Some(ErrorKind::TransportFailure) => "transport_failure",
        Some(ErrorKind::StreamSourceFailure) => "stream_source_failure",
    }
}

pub fn record_settlement(method: &str, outcome: &'static str, started: Instant) {
    counter!(
        "http_client_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!(
        "http_client_request_duration_seconds",
        "method" => method.to_string()
    )
    .record(started.elapsed().as_secs_f64());
}

pub fn record_pool_checkout(kind: TransportKind, hit: bool) {
    counter!(
        "http_client_pool_checkouts_total",
        "kind" => kind.as_str(),
        "result" => if hit { "hit" } else { "miss" }
    )
    .increment(1);
}

pub fn record_connection_aborted(kind: TransportKind) {
    counter!("http_client_connections_aborted_total", "kind" => kind.as_str()).increment(1);
}
