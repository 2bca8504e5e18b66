//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatcher_requests_total` (counter): terminal events by outcome
//! - `dispatcher_request_duration_seconds` (histogram): send to terminal event
//! - `dispatcher_pool_managers` (gauge): managers currently pooled
//! - `dispatcher_pool_busy` (gauge): managers currently checked out
//! - `dispatcher_pool_evictions_total` (counter): managers reclaimed while idle
//! - `dispatcher_tls_warnings_total` (counter): certificate failures accepted under the lenient policy

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`. Needs a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one terminal event. `outcome` is an error kind name or `"success"`.
pub fn record_request(outcome: &'static str, elapsed: Duration) {
    counter!("dispatcher_requests_total", "outcome" => outcome).increment(1);
    histogram!("dispatcher_request_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_pool(managers: usize, busy: usize) {
    gauge!("dispatcher_pool_managers").set(managers as f64);
    gauge!("dispatcher_pool_busy").set(busy as f64);
}

pub fn record_evictions(count: usize) {
    counter!("dispatcher_pool_evictions_total").increment(count as u64);
}

pub fn record_tls_warning() {
    counter!("dispatcher_tls_warnings_total").increment(1);
}
