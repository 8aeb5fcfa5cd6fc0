//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `rate_limited_total` (counter): requests answered with 429
//! - `payload_rejected_total` (counter): bodies over the ceiling
//! - `webhook_events_total` (counter): webhook deliveries by outcome
//!
//! Recording without an installed exporter is a no-op, so tests and the
//! default configuration pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!("http_requests_total", "method" => method.to_string(), "status" => status.clone())
        .increment(1);
    histogram!("http_request_duration_seconds", "method" => method.to_string(), "status" => status)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("rate_limited_total").increment(1);
}

pub fn record_payload_rejected() {
    counter!("payload_rejected_total").increment(1);
}

/// `outcome` is one of `accepted`, `ignored`, `rejected`, `disabled`.
pub fn record_webhook(outcome: &'static str) {
    counter!("webhook_events_total", "outcome" => outcome).increment(1);
}

/// Record every request that reaches the pipeline.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let response = next.run(request).await;
    record_request(method.as_str(), response.status().as_u16(), start);
    response
}
