//! Metrics module for entitlement-service.
//! Prometheus counters for validation outcomes, guard decisions and cache use,
//! plus the HTTP metrics recorded by the shared middleware.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "entitlement_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Recorder for `metrics` macros used by the shared HTTP middleware.
pub static METRICS_HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

/// Subscription validations by resolved tier and outcome
pub static VALIDATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Guard decisions by guard and decision
pub static GUARD_DECISIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Validation cache lookups by result
pub static CACHE_LOOKUPS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Error counter for alerting
pub static ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Safe to call more than once.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder already installed or unavailable");
            None
        }
    });

    VALIDATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "entitlement_validations_total",
                "Subscription validations by user type and outcome"
            ),
            &["user_type", "outcome"]
        )
        .expect("Failed to register VALIDATIONS_TOTAL")
    });

    GUARD_DECISIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "entitlement_guard_decisions_total",
                "Access guard decisions by guard and decision"
            ),
            &["guard", "decision"]
        )
        .expect("Failed to register GUARD_DECISIONS_TOTAL")
    });

    CACHE_LOOKUPS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "entitlement_cache_lookups_total",
                "Validation cache lookups by result"
            ),
            &["result"]
        )
        .expect("Failed to register CACHE_LOOKUPS_TOTAL")
    });

    ERRORS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("entitlement_errors_total", "Total errors by type for alerting"),
            &["error_type", "operation"]
        )
        .expect("Failed to register ERRORS_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    let mut output = String::from_utf8_lossy(&buffer).into_owned();

    if let Some(Some(handle)) = METRICS_HANDLE.get() {
        output.push_str(&handle.render());
    }

    output
}

/// Record a validation outcome.
pub fn record_validation(user_type: &str, outcome: &str) {
    if let Some(counter) = VALIDATIONS_TOTAL.get() {
        counter.with_label_values(&[user_type, outcome]).inc();
    }
}

/// Record a guard decision.
pub fn record_guard_decision(guard: &str, decision: &str) {
    if let Some(counter) = GUARD_DECISIONS_TOTAL.get() {
        counter.with_label_values(&[guard, decision]).inc();
    }
}

/// Record a cache hit or miss.
pub fn record_cache_lookup(hit: bool) {
    if let Some(counter) = CACHE_LOOKUPS_TOTAL.get() {
        counter
            .with_label_values(&[if hit { "hit" } else { "miss" }])
            .inc();
    }
}

/// Record an error for alerting.
pub fn record_error(error_type: &str, operation: &str) {
    if let Some(counter) = ERRORS_TOTAL.get() {
        counter.with_label_values(&[error_type, operation]).inc();
    }
}
