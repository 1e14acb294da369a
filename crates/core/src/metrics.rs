//! Prometheus metrics for the sequencer.
//!
//! This module provides metrics for:
//! - Tick scheduler (ticks by outcome)
//! - Sequencing sessions (sessions, torrents checked, check duration)
//! - Connection supervisor (reconnect attempts)
//! - Torrent client operations that failed and were skipped

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Ticks total by outcome.
pub static TICKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("qsequencer_ticks_total", "Total scheduler ticks"),
        &["outcome"], // "idle", "sequenced", "failed"
    )
    .unwrap()
});

// =============================================================================
// Sequencing Metrics
// =============================================================================

/// Sequencing sessions started.
pub static SESSIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "qsequencer_sessions_total",
        "Total sequencing sessions (ticks that found checking torrents)",
    )
    .unwrap()
});

/// Torrents driven through a serialized check.
pub static TORRENTS_CHECKED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "qsequencer_torrents_checked_total",
        "Total torrents checked one at a time",
    )
    .unwrap()
});

/// Time from resume until a torrent left the checking state.
pub static CHECK_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "qsequencer_check_duration_seconds",
            "Duration of a single serialized check",
        )
        .buckets(vec![
            5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0,
        ]),
    )
    .unwrap()
});

/// 1 while the sequencer is driving a torrent through its check.
pub static CHECK_IN_PROGRESS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "qsequencer_check_in_progress",
        "Whether a serialized check is currently running",
    )
    .unwrap()
});

/// Torrent client operations that failed and were skipped.
pub static OPERATION_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "qsequencer_operation_failures_total",
            "Torrent client operations that failed",
        ),
        &["operation"], // "pause_all", "resume", "restore", "poll"
    )
    .unwrap()
});

// =============================================================================
// Connection Metrics
// =============================================================================

/// Login attempts by result.
pub static CONNECT_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "qsequencer_connect_attempts_total",
            "Login attempts against the torrent client",
        ),
        &["result"], // "success", "failure"
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry.register(Box::new(TICKS_TOTAL.clone())).unwrap();
    registry.register(Box::new(SESSIONS_TOTAL.clone())).unwrap();
    registry
        .register(Box::new(TORRENTS_CHECKED.clone()))
        .unwrap();
    registry.register(Box::new(CHECK_DURATION.clone())).unwrap();
    registry
        .register(Box::new(CHECK_IN_PROGRESS.clone()))
        .unwrap();
    registry
        .register(Box::new(OPERATION_FAILURES.clone()))
        .unwrap();
    registry
        .register(Box::new(CONNECT_ATTEMPTS.clone()))
        .unwrap();
}

/// Encode all registered metrics in the Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
