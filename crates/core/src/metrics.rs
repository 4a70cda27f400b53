//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ingestion sessions (started, completed, failed, bytes)
//! - Remote readiness polling
//! - Progress store evictions
//! - Remote service calls

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Ingestion Metrics
// =============================================================================

/// Ingestions started by source.
pub static INGESTIONS_STARTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediaflow_ingestions_started_total",
            "Total ingestion sessions started",
        ),
        &["source"], // "upload", "url"
    )
    .unwrap()
});

/// Ingestions that reached COMPLETE.
pub static INGESTIONS_COMPLETED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediaflow_ingestions_completed_total",
            "Total ingestion sessions completed",
        ),
        &["source"],
    )
    .unwrap()
});

/// Ingestions that reached ERROR, by error kind.
pub static INGESTIONS_FAILED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediaflow_ingestions_failed_total",
            "Total ingestion sessions failed",
        ),
        &["source", "kind"],
    )
    .unwrap()
});

/// End-to-end ingestion duration.
pub static INGESTION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediaflow_ingestion_duration_seconds",
            "Duration from session creation to terminal stage",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0]),
        &["source", "result"],
    )
    .unwrap()
});

/// Bytes written to local storage.
pub static BYTES_RECEIVED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediaflow_bytes_received_total",
            "Total media bytes streamed into local storage",
        ),
        &["source"],
    )
    .unwrap()
});

// =============================================================================
// Polling Metrics
// =============================================================================

/// Readiness polls issued against the remote service.
pub static REMOTE_POLLS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mediaflow_remote_polls_total",
        "Total readiness polls against the remote service",
    )
    .unwrap()
});

// =============================================================================
// Progress Store Metrics
// =============================================================================

/// Sessions removed from the progress store.
pub static PROGRESS_SESSIONS_EVICTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediaflow_progress_sessions_evicted_total",
            "Progress sessions removed by retention or capacity limits",
        ),
        &["reason"], // "expired", "capacity", "capacity_active"
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// Remote service request duration.
pub static REMOTE_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediaflow_remote_request_duration_seconds",
            "Duration of remote service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 120.0]),
        &["operation"],
    )
    .unwrap()
});

/// Remote service requests total.
pub static REMOTE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mediaflow_remote_requests_total",
            "Total remote service requests",
        ),
        &["operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Ingestion
        Box::new(INGESTIONS_STARTED.clone()),
        Box::new(INGESTIONS_COMPLETED.clone()),
        Box::new(INGESTIONS_FAILED.clone()),
        Box::new(INGESTION_DURATION.clone()),
        Box::new(BYTES_RECEIVED.clone()),
        // Polling
        Box::new(REMOTE_POLLS.clone()),
        // Progress store
        Box::new(PROGRESS_SESSIONS_EVICTED.clone()),
        // Remote service
        Box::new(REMOTE_REQUEST_DURATION.clone()),
        Box::new(REMOTE_REQUESTS.clone()),
    ]
}

/// Record a remote service call outcome.
pub fn record_remote_call(operation: &str, duration_secs: f64, success: bool) {
    REMOTE_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
    REMOTE_REQUESTS
        .with_label_values(&[operation, if success { "success" } else { "error" }])
        .inc();
}
