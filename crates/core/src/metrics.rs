//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Orchestrator (jobs by outcome, active pipelines)
//! - Stage sequencer (stage durations, tracks by outcome)
//! - Credential refreshes

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Orchestrator Metrics
// =============================================================================

/// Jobs finished, by terminal status.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ripline_jobs_total", "Total jobs by terminal status"),
        &["status"], // "completed", "skipped", "error"
    )
    .unwrap()
});

/// Pipelines currently in flight.
pub static ACTIVE_PIPELINES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ripline_active_pipelines",
        "Number of pipelines currently running",
    )
    .unwrap()
});

// =============================================================================
// Stage Metrics
// =============================================================================

/// Stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ripline_stage_duration_seconds",
            "Duration of pipeline stages",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 900.0, 1800.0]),
        &["stage"],
    )
    .unwrap()
});

/// Tracks acquired or failed.
pub static TRACKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ripline_tracks_total", "Total tracks by acquisition status"),
        &["status"], // "completed", "failed"
    )
    .unwrap()
});

// =============================================================================
// Credential Metrics
// =============================================================================

/// Credential refreshes by outcome.
pub static CREDENTIAL_REFRESHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ripline_credential_refreshes_total",
            "Total credential refresh attempts",
        ),
        &["outcome"], // "refreshed", "soft_failure", "timed_out", "spawn_error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_TOTAL.clone()),
        Box::new(ACTIVE_PIPELINES.clone()),
        Box::new(STAGE_DURATION.clone()),
        Box::new(TRACKS_TOTAL.clone()),
        Box::new(CREDENTIAL_REFRESHES.clone()),
    ]
}
