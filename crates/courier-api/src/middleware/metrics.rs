//! # Prometheus Metrics
//!
//! Request counters and latency histogram recorded through the `metrics`
//! facade. Without an installed recorder every call is a no-op, so tests
//! and embedded use need no setup. The binary installs the Prometheus
//! recorder and `GET /metrics` renders it.

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;

/// Label used for requests that matched no route.
const UNMATCHED: &str = "unmatched";

/// Count the request, its outcome and its latency.
///
/// Routes are labelled by their template (`/v1/contracts/{id}`) rather
/// than the concrete URI to keep label cardinality bounded.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().as_str().to_owned();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED.to_owned());
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let code = status.as_u16().to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => code.clone()
    )
    .increment(1);
    if status.is_client_error() || status.is_server_error() {
        metrics::counter!(
            "http_errors_total",
            "method" => method.clone(),
            "route" => route.clone(),
            "status" => code
        )
        .increment(1);
    }
    metrics::histogram!("http_request_duration_seconds", "method" => method, "route" => route)
        .record(started.elapsed().as_secs_f64());

    response
}
