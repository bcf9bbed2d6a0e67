//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Pipeline runs (stages executed, skipped and failed; run duration)
//! - Batch coordination (scans discovered, jobs submitted)
//!
//! The runner writes the encoded registry into each run directory as a
//! textfile-collector file.

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Registry holding every core metric.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in all_metrics() {
        // descriptors are unique
        let _ = registry.register(metric);
    }
    registry
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Stages executed total by stage.
pub static STAGES_EXECUTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fmriqc_stages_executed_total", "Total stages executed"),
        &["stage"],
    )
    .unwrap()
});

/// Stages skipped total by stage (artifact already present).
pub static STAGES_SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "fmriqc_stages_skipped_total",
            "Total stages skipped because their artifacts were present",
        ),
        &["stage"],
    )
    .unwrap()
});

/// Stage failures total by stage.
pub static STAGE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fmriqc_stage_failures_total", "Total stage failures"),
        &["stage"],
    )
    .unwrap()
});

/// Run duration in seconds.
pub static RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("fmriqc_run_duration_seconds", "Duration of pipeline runs").buckets(
            vec![1.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0],
        ),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Batch Metrics
// =============================================================================

/// Candidate scans found during discovery by validity.
pub static SCANS_DISCOVERED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fmriqc_scans_discovered_total", "Total candidate scans discovered"),
        &["validity"], // "valid", "empty"
    )
    .unwrap()
});

/// Jobs submitted total by kind.
pub static JOBS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fmriqc_jobs_submitted_total", "Total scheduler jobs submitted"),
        &["kind"], // "array", "aggregate"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Pipeline
        Box::new(STAGES_EXECUTED.clone()),
        Box::new(STAGES_SKIPPED.clone()),
        Box::new(STAGE_FAILURES.clone()),
        Box::new(RUN_DURATION.clone()),
        // Batch
        Box::new(SCANS_DISCOVERED.clone()),
        Box::new(JOBS_SUBMITTED.clone()),
    ]
}

/// Encodes the registry in the Prometheus text exposition format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
