//! Prometheus metrics for gateway observability.

use metrics::{counter, gauge};

/// Initialize metrics exporter (Prometheus).
pub fn init_metrics() {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

/// Record a review submission and how it ended.
pub fn review_submitted(outcome: &str) {
    counter!("gate_reviews_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a fingerprint cache lookup.
pub fn fingerprint_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("gate_fingerprint_lookups_total", "result" => result).increment(1);
}

/// Set the number of workflows with cached fingerprints.
pub fn fingerprint_cache_size(size: usize) {
    gauge!("gate_fingerprint_cache_entries").set(size as f64);
}

/// Record an OSC progress or cancel request.
pub fn osc_request(action: &str, outcome: &str) {
    counter!(
        "gate_osc_requests_total",
        "action" => action.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a login attempt.
pub fn login_attempt(outcome: &str) {
    counter!("gate_login_attempts_total", "outcome" => outcome.to_string()).increment(1);
}
