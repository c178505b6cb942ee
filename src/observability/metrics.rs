//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `cloud_connectors_reconciliations_total` - Reconciliations by kind
//! - `cloud_connectors_reconciliation_errors_total` - Failed reconciliations by kind and error class
//! - `cloud_connectors_reconciliation_duration_seconds` - Duration of reconciliations by kind
//! - `cloud_connectors_reconciliations_skipped_total` - Events dropped by the skip filter
//! - `cloud_connectors_requeues_total` - Requeues by kind and reason
//! - `cloud_connectors_remote_resources_created_total` - Remote resources created
//! - `cloud_connectors_remote_resources_deleted_total` - Remote resources deleted
//! - `cloud_connectors_write_conflicts_total` - Optimistic-concurrency conflicts retried
//! - `cloud_connectors_provider_operations_total` - Provider calls by kind, operation and outcome
//! - `cloud_connectors_provider_operation_duration_seconds` - Duration of provider calls

use anyhow::Result;
use prometheus::{HistogramVec, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloud_connectors_reconciliations_total",
            "Total number of reconciliations",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloud_connectors_reconciliation_errors_total",
            "Total number of reconciliation errors by error class",
        ),
        &["kind", "class"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "cloud_connectors_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static RECONCILIATIONS_SKIPPED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloud_connectors_reconciliations_skipped_total",
            "Total number of events skipped because the object was already in sync or backing off",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_SKIPPED_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloud_connectors_requeues_total",
            "Total number of requeues by reason",
        ),
        &["kind", "reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static REMOTE_RESOURCES_CREATED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloud_connectors_remote_resources_created_total",
            "Total number of remote cloud resources created",
        ),
        &["kind"],
    )
    .expect("Failed to create REMOTE_RESOURCES_CREATED_TOTAL metric - this should never happen")
});

static REMOTE_RESOURCES_DELETED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloud_connectors_remote_resources_deleted_total",
            "Total number of remote cloud resources deleted",
        ),
        &["kind"],
    )
    .expect("Failed to create REMOTE_RESOURCES_DELETED_TOTAL metric - this should never happen")
});

static WRITE_CONFLICTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloud_connectors_write_conflicts_total",
            "Total number of conflicting object writes that were retried",
        ),
        &["kind"],
    )
    .expect("Failed to create WRITE_CONFLICTS_TOTAL metric - this should never happen")
});

// Provider-specific metrics with kind, operation and outcome labels
static PROVIDER_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloud_connectors_provider_operations_total",
            "Total number of cloud provider operations",
        ),
        &["kind", "operation", "outcome"],
    )
    .expect("Failed to create PROVIDER_OPERATIONS_TOTAL metric - this should never happen")
});

static PROVIDER_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "cloud_connectors_provider_operation_duration_seconds",
            "Duration of cloud provider operations in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["kind", "operation"],
    )
    .expect("Failed to create PROVIDER_OPERATION_DURATION metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATIONS_SKIPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REMOTE_RESOURCES_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REMOTE_RESOURCES_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WRITE_CONFLICTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_OPERATION_DURATION.clone()))?;

    Ok(())
}

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors(kind: &str, class: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[kind, class])
        .inc();
}

pub fn observe_reconciliation_duration(kind: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[kind])
        .observe(duration);
}

pub fn increment_reconciliations_skipped(kind: &str) {
    RECONCILIATIONS_SKIPPED_TOTAL.with_label_values(&[kind]).inc();
}

/// Record a requeue; `reason` is one of `resync`, `transient_error`, `fatal_error`
pub fn increment_requeues(kind: &str, reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[kind, reason]).inc();
}

pub fn increment_remote_resources_created(kind: &str) {
    REMOTE_RESOURCES_CREATED_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_remote_resources_deleted(kind: &str) {
    REMOTE_RESOURCES_DELETED_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_write_conflicts(kind: &str) {
    WRITE_CONFLICTS_TOTAL.with_label_values(&[kind]).inc();
}

/// Record one provider call with its outcome and duration
pub fn record_provider_operation(kind: &str, operation: &str, outcome: &str, duration: f64) {
    PROVIDER_OPERATIONS_TOTAL
        .with_label_values(&[kind, operation, outcome])
        .inc();
    PROVIDER_OPERATION_DURATION
        .with_label_values(&[kind, operation])
        .observe(duration);
}
