//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `postgres_sync_reconciliations_total` - Total number of reconciliations
//! - `postgres_sync_reconciliation_errors_total` - Total number of reconciliation errors
//! - `postgres_sync_reconciliation_duration_seconds` - Duration of reconciliation passes
//! - `postgres_sync_dumps_total` - Total number of dumps pushed to git
//! - `postgres_sync_restores_total` - Total number of restores applied
//! - `postgres_sync_webhook_triggers_total` - Total number of accepted webhook triggers

use anyhow::Result;
use prometheus::{Histogram, IntCounter, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "postgres_sync_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "postgres_sync_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "postgres_sync_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static DUMPS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "postgres_sync_dumps_total",
        "Total number of database dumps committed and pushed",
    )
    .expect("Failed to create DUMPS_TOTAL metric - this should never happen")
});

static RESTORES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "postgres_sync_restores_total",
        "Total number of database restores applied",
    )
    .expect("Failed to create RESTORES_TOTAL metric - this should never happen")
});

static WEBHOOK_TRIGGERS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "postgres_sync_webhook_triggers_total",
        "Total number of accepted webhook dump triggers",
    )
    .expect("Failed to create WEBHOOK_TRIGGERS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(DUMPS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RESTORES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WEBHOOK_TRIGGERS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconcile_duration(duration: std::time::Duration) {
    RECONCILIATION_DURATION.observe(duration.as_secs_f64());
}

pub fn increment_dumps() {
    DUMPS_TOTAL.inc();
}

pub fn increment_restores() {
    RESTORES_TOTAL.inc();
}

pub fn increment_webhook_triggers() {
    WEBHOOK_TRIGGERS_TOTAL.inc();
}

/// Render all registered metrics in the Prometheus text exposition format.
pub fn gather() -> Result<String> {
    let encoder = prometheus::TextEncoder::new();
    Ok(encoder.encode_to_string(&REGISTRY.gather())?)
}
