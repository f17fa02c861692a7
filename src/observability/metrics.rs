//! Process-level metrics and their Prometheus exposition.
//!
//! # Metrics
//! - `http_in_responses_total` (counter): responses by method and status
//! - `http_in_response_duration_seconds` (histogram): time from the metrics
//!   stage to the response head
//! - `http_in_request_failures_total` (counter): failed requests by error kind
//!
//! Per-message metrics go to the host instead; these are aggregates for
//! whoever scrapes the exporter.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

pub fn record_response(method: &str, status: u16, elapsed: Duration) {
    let method = method.to_string();
    let status = status.to_string();
    counter!("http_in_responses_total", "method" => method.clone(), "status" => status.clone())
        .increment(1);
    histogram!("http_in_response_duration_seconds", "method" => method, "status" => status)
        .record(elapsed.as_secs_f64());
}

pub fn record_failure(kind: &'static str) {
    counter!("http_in_request_failures_total", "kind" => kind).increment(1);
}
