//! Prometheus metrics for the ingestion core.
//!
//! This module provides metrics for:
//! - Files (archived, released, left locked)
//! - Rows (persisted, failed by stage, field warnings)
//! - Scheduler cycles (duration, outcome)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// =============================================================================
// File Metrics
// =============================================================================

/// Files finished by disposition.
pub static FILES_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cdr_files_processed_total", "Total files processed"),
        &["result"], // "archived", "released", "locked", "claim_failed"
    )
    .unwrap()
});

// =============================================================================
// Row Metrics
// =============================================================================

/// Records persisted to the store.
pub static RECORDS_PERSISTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "cdr_records_persisted_total",
        "Total call records persisted",
    )
    .unwrap()
});

/// Rows skipped, by the stage that rejected them.
pub static ROW_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cdr_row_failures_total", "Total rows skipped"),
        &["stage"], // "parse", "transform", "persist"
    )
    .unwrap()
});

/// Field values dropped during coercion.
pub static FIELD_WARNINGS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "cdr_field_warnings_total",
        "Total field values dropped during coercion",
    )
    .unwrap()
});

// =============================================================================
// Cycle Metrics
// =============================================================================

/// Cycle duration in seconds.
pub static CYCLE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("cdr_cycle_duration_seconds", "Duration of ingestion cycles")
            .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
        &["result"],
    )
    .unwrap()
});

/// Cycles run by outcome.
pub static CYCLES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("cdr_cycles_total", "Total ingestion cycles"),
        &["result"], // "completed", "interrupted", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(FILES_PROCESSED.clone()),
        Box::new(RECORDS_PERSISTED.clone()),
        Box::new(ROW_FAILURES.clone()),
        Box::new(FIELD_WARNINGS.clone()),
        Box::new(CYCLE_DURATION.clone()),
        Box::new(CYCLES_TOTAL.clone()),
    ]
}

/// Registers every core metric, skipping ones the registry already holds.
pub fn register_core_metrics(registry: &Registry) {
    for metric in all_metrics() {
        let _ = registry.register(metric);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_core_metrics() {
        let registry = Registry::new();
        register_core_metrics(&registry);
        register_core_metrics(&registry);

        FILES_PROCESSED.with_label_values(&["archived"]).inc();
        ROW_FAILURES.with_label_values(&["persist"]).inc();

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"cdr_files_processed_total".to_string()));
        assert!(names.contains(&"cdr_row_failures_total".to_string()));
        assert!(names.contains(&"cdr_records_persisted_total".to_string()));
    }
}
