//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): inbound requests by method, status
//! - `gateway_request_duration_seconds` (histogram): inbound latency
//! - `gateway_admission_total` (counter): admission decisions by outcome
//! - `gateway_rate_limit_identities` (gauge): identities with a live window
//! - `gateway_circuit_transitions_total` (counter): by call name, from, to
//! - `gateway_circuit_state` (gauge): 0=closed, 1=open, 2=half_open
//! - `gateway_circuit_calls_total` (counter): by call name, outcome
//! - `gateway_circuit_call_duration_seconds` (histogram): downstream latency
//! - `gateway_call_not_permitted_total` (counter): outbound limiter refusals by call name
//!
//! Without an installed recorder every call here is a no-op, which is what
//! the tests rely on.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_admission(outcome: &'static str) {
    counter!("gateway_admission_total", "outcome" => outcome).increment(1);
}

pub fn record_tracked_identities(count: usize) {
    gauge!("gateway_rate_limit_identities").set(count as f64);
}

pub fn record_circuit_transition(name: &str, from: &'static str, to: &'static str, state_value: u8) {
    counter!(
        "gateway_circuit_transitions_total",
        "name" => name.to_string(),
        "from" => from,
        "to" => to
    )
    .increment(1);
    gauge!("gateway_circuit_state", "name" => name.to_string()).set(f64::from(state_value));
}

pub fn record_call(name: &str, outcome: &'static str, elapsed: Option<Duration>) {
    counter!(
        "gateway_circuit_calls_total",
        "name" => name.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    if let Some(elapsed) = elapsed {
        histogram!("gateway_circuit_call_duration_seconds", "name" => name.to_string())
            .record(elapsed.as_secs_f64());
    }
}

pub fn record_call_not_permitted(name: &str) {
    counter!("gateway_call_not_permitted_total", "name" => name.to_string()).increment(1);
}
