//! Metrics collection and exposition.
//!
//! # Metrics
//! - `connector_requests_total` (counter): executions by outcome
//!   (`success`, `tolerated`, `fatal`, `cache_hit`)
//! - `connector_cache_events_total` (counter): `hit`, `miss`, `write`,
//!   `read_error`, `write_error`
//! - `connector_upstream_duration_seconds` (histogram): transport latency by
//!   method and status
//! - `gateway_responses_total` (counter): gateway responses by endpoint and
//!   status

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_execution(outcome: &'static str) {
    counter!("connector_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_cache_event(event: &'static str) {
    counter!("connector_cache_events_total", "event" => event).increment(1);
}

pub fn record_upstream_duration(method: &str, status: Option<u16>, start: Instant) {
    let status = status.map_or_else(|| "none".to_string(), |code| code.to_string());
    histogram!(
        "connector_upstream_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_gateway_response(endpoint: &str, status: u16) {
    counter!(
        "gateway_responses_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
