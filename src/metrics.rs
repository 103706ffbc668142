//! Process-level metrics export for KubeScope
//!
//! Prometheus counters, gauges, and histograms covering ingestion,
//! admission, and query dispatch. Engine-local statistics (rolling latency,
//! effective sampling rate snapshots) live in [`crate::engine::stats`]; this
//! module is the export surface for scrapers.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram_vec, Counter,
    CounterVec, Encoder, Gauge, HistogramVec, TextEncoder,
};

lazy_static! {
    // === Ingestion Counters ===

    /// Total records offered to the engine
    pub static ref RECORDS_PROCESSED: Counter = register_counter!(
        "kubescope_records_processed_total",
        "Total measurement records offered to the sampler"
    ).unwrap();

    /// Total records admitted by the sampler
    pub static ref RECORDS_ADMITTED: Counter = register_counter!(
        "kubescope_records_admitted_total",
        "Total measurement records admitted into sketches and reservoirs"
    ).unwrap();

    // === Query Counters ===

    /// Queries by type and status
    pub static ref QUERIES_TOTAL: CounterVec = register_counter_vec!(
        "kubescope_queries_total",
        "Total queries by type and status",
        &["query_type", "status"]
    ).unwrap();

    // === Latency Histograms ===

    /// Query dispatch duration
    pub static ref QUERY_DURATION: HistogramVec = register_histogram_vec!(
        "kubescope_query_duration_seconds",
        "Query dispatch latency in seconds",
        &["query_type"],
        vec![0.000001, 0.00001, 0.0001, 0.001, 0.01, 0.1]
    ).unwrap();

    // === Sampling Gauges ===

    /// Observed admitted/processed ratio
    pub static ref EFFECTIVE_SAMPLING_RATE: Gauge = register_gauge!(
        "kubescope_effective_sampling_rate",
        "Observed ratio of admitted to processed records"
    ).unwrap();

    /// Strata with live reservoirs
    pub static ref ACTIVE_STRATA: Gauge = register_gauge!(
        "kubescope_active_strata",
        "Number of strata with an allocated reservoir"
    ).unwrap();
}

/// Initialize the metrics system
pub fn init() {
    EFFECTIVE_SAMPLING_RATE.set(0.0);
    ACTIVE_STRATA.set(0.0);

    tracing::info!("Metrics system initialized");
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}

/// Record an admission decision
#[inline]
pub fn record_ingest(admitted: bool) {
    RECORDS_PROCESSED.inc();
    if admitted {
        RECORDS_ADMITTED.inc();
    }
}

/// Record a completed query
#[inline]
pub fn record_query(query_type: &str, duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    QUERIES_TOTAL.with_label_values(&[query_type, status]).inc();

    QUERY_DURATION
        .with_label_values(&[query_type])
        .observe(duration_secs);
}

/// Update the effective sampling rate gauge
#[inline]
pub fn update_sampling_rate(rate: f64) {
    EFFECTIVE_SAMPLING_RATE.set(rate);
}

/// Update the active strata gauge
#[inline]
pub fn update_active_strata(count: usize) {
    ACTIVE_STRATA.set(count as f64);
}
