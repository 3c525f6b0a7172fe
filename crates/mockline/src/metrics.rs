//! Prometheus metrics for mockline.
//!
//! Tracks dispatch outcomes, match latency, index churn and admin activity.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

lazy_static! {
    /// Dispatched requests by outcome
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "mockline_requests_total",
        "Total number of requests dispatched against the stub index",
        &["method", "outcome"]  // outcome: matched|no_match|not_ready|error
    )
    .unwrap();

    /// Time spent in lookup and response synthesis
    pub static ref MATCH_DURATION_MS: HistogramVec = register_histogram_vec!(
        "mockline_match_duration_ms",
        "Histogram of stub lookup and response synthesis time in milliseconds",
        &["outcome"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 50.0]
    )
    .unwrap();

    /// Active entries in the match index
    pub static ref INDEX_ENTRIES: Gauge = register_gauge!(
        "mockline_index_entries",
        "Number of enabled stubs currently held by the match index"
    )
    .unwrap();

    /// Index mutations
    pub static ref INDEX_MUTATIONS_TOTAL: CounterVec = register_counter_vec!(
        "mockline_index_mutations_total",
        "Total number of match index snapshots published",
        &["operation"]  // operation: add|remove|reload
    )
    .unwrap();

    /// Admin operations
    pub static ref ADMIN_OPERATIONS_TOTAL: CounterVec = register_counter_vec!(
        "mockline_admin_operations_total",
        "Total number of administrative stub operations",
        &["operation", "result"]  // result: success|error
    )
    .unwrap();

    /// Regex cache lookups
    pub static ref REGEX_CACHE_LOOKUPS_TOTAL: CounterVec = register_counter_vec!(
        "mockline_regex_cache_lookups_total",
        "Total number of compiled regex cache lookups",
        &["result"]  // result: hit|miss
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record a dispatched request
pub fn record_request(method: &str, outcome: &str, duration_ms: f64) {
    REQUESTS_TOTAL.with_label_values(&[method, outcome]).inc();
    MATCH_DURATION_MS
        .with_label_values(&[outcome])
        .observe(duration_ms);
}

pub fn set_index_entries(count: usize) {
    INDEX_ENTRIES.set(count as f64);
}

pub fn record_index_mutation(operation: &str) {
    INDEX_MUTATIONS_TOTAL.with_label_values(&[operation]).inc();
}

/// Helper to record an admin operation
pub fn record_admin_operation(operation: &str, success: bool) {
    let result = if success { "success" } else { "error" };
    ADMIN_OPERATIONS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
}

pub fn record_regex_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    REGEX_CACHE_LOOKUPS_TOTAL.with_label_values(&[result]).inc();
}
