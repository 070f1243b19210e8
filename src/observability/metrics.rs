//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `mesh_federation_reconciliations_total{kind}` - Total number of reconciliations
//! - `mesh_federation_reconciliation_errors_total{kind,reason}` - Reconciliation errors
//! - `mesh_federation_reconciliation_duration_seconds{kind}` - Duration of reconciliations
//! - `mesh_federation_style_operations_total{style,operation,outcome}` - Style operations
//! - `mesh_federation_rollbacks_total` - Gateway rollbacks after a failed VirtualService create
//! - `mesh_federation_requeues_total{reason}` - Requeues scheduled by the error policy

use anyhow::Result;
use prometheus::{HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "mesh_federation_reconciliations_total",
            "Total number of reconciliations by resource kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "mesh_federation_reconciliation_errors_total",
            "Total number of reconciliation errors by resource kind and reason",
        ),
        &["kind", "reason"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "mesh_federation_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static STYLE_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "mesh_federation_style_operations_total",
            "Total number of federation style operations by style, operation and outcome",
        ),
        &["style", "operation", "outcome"],
    )
    .expect("Failed to create STYLE_OPERATIONS_TOTAL metric - this should never happen")
});

static ROLLBACKS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "mesh_federation_rollbacks_total",
        "Total number of gateway rollbacks after a failed virtual service create",
    )
    .expect("Failed to create ROLLBACKS_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "mesh_federation_requeues_total",
            "Total number of requeues scheduled after a failed reconciliation",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(STYLE_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ROLLBACKS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors(kind: &str, reason: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[kind, reason])
        .inc();
}

pub fn observe_reconciliation_duration(kind: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[kind])
        .observe(duration);
}

pub fn increment_style_operations(style: &str, operation: &str, outcome: &str) {
    STYLE_OPERATIONS_TOTAL
        .with_label_values(&[style, operation, outcome])
        .inc();
}

pub fn increment_rollbacks() {
    ROLLBACKS_TOTAL.inc();
}

pub fn increment_requeues(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}
