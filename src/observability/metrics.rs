//! Metrics collection and exposition.
//!
//! # Metrics
//! - `resolver_selections_total` (counter): selections by service, algorithm, outcome
//! - `resolver_candidates` (gauge): candidates considered on the last selection
//! - `resolver_suppressed_errors_total` (counter): degraded errors by stage
//! - `resolver_discovery_cache_total` (counter): read-through lookups by kind, result
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_selection(service: &str, algorithm: &'static str, selected: bool) {
    let outcome = if selected { "selected" } else { "empty" };
    ::metrics::counter!(
        "resolver_selections_total",
        "service" => service.to_string(),
        "algorithm" => algorithm,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_candidates(service: &str, candidates: usize) {
    ::metrics::gauge!("resolver_candidates", "service" => service.to_string())
        .set(candidates as f64);
}

pub fn record_suppressed(stage: &'static str) {
    ::metrics::counter!("resolver_suppressed_errors_total", "stage" => stage).increment(1);
}

pub fn record_cache_lookup(kind: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    ::metrics::counter!("resolver_discovery_cache_total", "kind" => kind, "result" => result)
        .increment(1);
}
