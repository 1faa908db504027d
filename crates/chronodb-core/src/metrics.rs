//! Central metrics registry and metric definitions
//!
//! Prometheus metrics for the background policy engine.
//! Metrics are registered lazily on first access using once_cell::Lazy.

use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec};

// ===== Policy Execution Metrics =====

/// Total number of policy executions by job type and outcome
pub static POLICY_EXECUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "chronodb_policy_executions_total",
        "Total number of background policy executions",
        &["job_type", "outcome"]
    )
    .expect("Failed to register policy executions counter")
});

/// Policy execution duration histogram
pub static POLICY_EXECUTION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "chronodb_policy_execution_duration_seconds",
        "Background policy execution duration in seconds",
        &["job_type"],
        vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0, 1800.0]
    )
    .expect("Failed to register policy execution duration histogram")
});

/// Total number of fast restarts requested, by job type
pub static FAST_RESTARTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "chronodb_policy_fast_restarts_total",
        "Total number of immediate re-runs requested by policies",
        &["job_type"]
    )
    .expect("Failed to register fast restart counter")
});

/// Total number of chunks processed by policies, by operation
pub static POLICY_CHUNKS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "chronodb_policy_chunks_processed_total",
        "Total number of chunks reordered or dropped by policies",
        &["operation"]
    )
    .expect("Failed to register chunks processed counter")
});
