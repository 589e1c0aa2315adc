//! # Metrics
//!
//! Prometheus metrics for monitoring the controllers.
//!
//! ## Metrics Exposed
//!
//! - `lifecycle_reconciliations_total{controller}` - Reconciliation passes started
//! - `lifecycle_reconciliation_errors_total{controller,kind}` - Passes that returned a retryable error
//! - `lifecycle_reconciliation_duration_seconds{controller}` - Pass duration
//! - `lifecycle_requeues_total{controller,reason}` - Requeues scheduled, by reason
//! - `lifecycle_provider_config_users{provider_config}` - Current user count per ProviderConfig
//! - `lifecycle_connection_details_published_total{controller}` - Connection secret writes

use anyhow::Result;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "lifecycle_reconciliations_total",
            "Total number of reconciliation passes by controller",
        ),
        &["controller"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "lifecycle_reconciliation_errors_total",
            "Total number of failed reconciliation passes by controller and error kind",
        ),
        &["controller", "kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "lifecycle_reconciliation_duration_seconds",
            "Duration of reconciliation passes in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        &["controller"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "lifecycle_requeues_total",
            "Total number of requeues by controller and reason",
        ),
        &["controller", "reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static PROVIDER_CONFIG_USERS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "lifecycle_provider_config_users",
            "Number of managed resources using each ProviderConfig",
        ),
        &["provider_config"],
    )
    .expect("Failed to create PROVIDER_CONFIG_USERS metric - this should never happen")
});

static CONNECTION_DETAILS_PUBLISHED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "lifecycle_connection_details_published_total",
            "Total number of connection secret writes by controller",
        ),
        &["controller"],
    )
    .expect("Failed to create CONNECTION_DETAILS_PUBLISHED_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_CONFIG_USERS.clone()))?;
    REGISTRY.register(Box::new(CONNECTION_DETAILS_PUBLISHED_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations(controller: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[controller]).inc();
}

pub fn increment_reconciliation_errors(controller: &str, kind: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[controller, kind])
        .inc();
}

pub fn observe_reconciliation_duration(controller: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[controller])
        .observe(duration);
}

pub fn increment_requeues_total(controller: &str, reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[controller, reason]).inc();
}

pub fn set_provider_config_users(provider_config: &str, users: i64) {
    PROVIDER_CONFIG_USERS
        .with_label_values(&[provider_config])
        .set(users);
}

/// Drop the series of a ProviderConfig that no longer exists
pub fn clear_provider_config_users(provider_config: &str) {
    let _ = PROVIDER_CONFIG_USERS.remove_label_values(&[provider_config]);
}

pub fn increment_connection_details_published(controller: &str) {
    CONNECTION_DETAILS_PUBLISHED_TOTAL
        .with_label_values(&[controller])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requeue_counter_is_labelled() {
        let before = REQUEUES_TOTAL
            .with_label_values(&["claim", "waiting-for-composite"])
            .get();
        increment_requeues_total("claim", "waiting-for-composite");
        let after = REQUEUES_TOTAL
            .with_label_values(&["claim", "waiting-for-composite"])
            .get();
        assert_eq!(after, before + 1);
    }

    #[test]
    fn test_provider_config_users_gauge() {
        set_provider_config_users("metrics-test-pc", 3);
        assert_eq!(
            PROVIDER_CONFIG_USERS
                .with_label_values(&["metrics-test-pc"])
                .get(),
            3
        );
        clear_provider_config_users("metrics-test-pc");
    }
}
