//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the mediaflow server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Progress store and asset cache sizes (collected dynamically)
//! - Core ingestion metrics (registered from `mediaflow_core::metrics`)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mediaflow_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        // Direct uploads hold the request open through remote processing.
        .buckets(vec![
            0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0, 900.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mediaflow_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediaflow_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Store Metrics (collected dynamically)
// =============================================================================

/// Sessions tracked by the progress store.
pub static PROGRESS_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediaflow_progress_sessions",
        "Number of sessions held by the progress store",
    )
    .unwrap()
});

/// Sessions not yet COMPLETE or ERROR.
pub static PROGRESS_SESSIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediaflow_progress_sessions_active",
        "Number of in-flight ingestion sessions",
    )
    .unwrap()
});

/// Entries in the local asset cache.
pub static ASSET_CACHE_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mediaflow_asset_cache_entries",
        "Number of remote assets held in the local cache",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Stores
    registry
        .register(Box::new(PROGRESS_SESSIONS.clone()))
        .unwrap();
    registry
        .register(Box::new(PROGRESS_SESSIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(ASSET_CACHE_ENTRIES.clone()))
        .unwrap();

    // Core metrics (ingestion, polling, remote service)
    for metric in mediaflow_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh gauges from current application state before encoding.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let tracker = state.tracker();
    PROGRESS_SESSIONS.set(tracker.len() as i64);
    PROGRESS_SESSIONS_ACTIVE.set(tracker.active_count() as i64);
    ASSET_CACHE_ENTRIES.set(state.assets().cache().len() as i64);
}

static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

/// Normalize a path for metric labels (replace IDs with placeholders).
///
/// Upload ids become `{id}`; remote asset names under `/api/files/` collapse
/// to `{name}` since they are caller-chosen.
pub fn normalize_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("/api/files/") {
        if !rest.is_empty() {
            return "/api/files/{name}".to_string();
        }
    }
    if let Some(rest) = path.strip_prefix("/api/progress/") {
        if !rest.is_empty() && !UUID_REGEX.is_match(rest) {
            return "/api/progress/{id}".to_string();
        }
    }
    UUID_REGEX.replace_all(path, "{id}").into_owned()
}
