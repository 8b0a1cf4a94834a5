//! Prometheus metrics for subscription-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Counter for reconciliation runs by outcome.
pub static RECONCILIATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "subscription_reconciliations_total",
        "Total number of subscription reconciliations",
        &["status"]
    )
    .expect("Failed to register RECONCILIATIONS")
});

/// Histogram for end-to-end reconciliation duration.
pub static RECONCILIATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "subscription_reconciliation_duration_seconds",
        "Reconciliation duration in seconds",
        &["status"],
        vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register RECONCILIATION_DURATION")
});

/// Counter for per-subscription usage fetches that were skipped.
pub static USAGE_FETCH_FAILURES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "subscription_usage_fetch_failures_total",
        "Usage fetches skipped due to upstream failure",
        &["reason"]
    )
    .expect("Failed to register USAGE_FETCH_FAILURES")
});

/// Counter for partner API calls by endpoint and status.
pub static PARTNER_API_REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "subscription_partner_api_requests_total",
        "Total number of partner API requests",
        &["endpoint", "status"]
    )
    .expect("Failed to register PARTNER_API_REQUESTS")
});

/// Histogram for database query duration.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "subscription_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Counter for errors.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "subscription_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&RECONCILIATIONS);
    Lazy::force(&RECONCILIATION_DURATION);
    Lazy::force(&USAGE_FETCH_FAILURES);
    Lazy::force(&PARTNER_API_REQUESTS);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&ERRORS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record a completed reconciliation.
pub fn record_reconciliation(status: &str, duration_secs: f64) {
    RECONCILIATIONS.with_label_values(&[status]).inc();
    RECONCILIATION_DURATION
        .with_label_values(&[status])
        .observe(duration_secs);
}

/// Record a skipped usage fetch.
pub fn record_usage_fetch_failure(reason: &str) {
    USAGE_FETCH_FAILURES.with_label_values(&[reason]).inc();
}

/// Record a partner API request.
pub fn record_partner_api_request(endpoint: &str, status: &str) {
    PARTNER_API_REQUESTS
        .with_label_values(&[endpoint, status])
        .inc();
}

/// Record an error.
pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}
