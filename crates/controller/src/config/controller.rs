//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::config::{env_var_or_default, env_var_or_default_str};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Deadline for a single reconciliation pass (seconds)
    /// A pass that runs past it is abandoned and retried with backoff
    pub reconcile_timeout_secs: u64,
    /// Requeue interval after a successful pass (seconds)
    /// Managed resources may override it with `reconciliationPolicy.resyncIntervalSeconds`
    pub poll_interval_secs: u64,
    /// Requeue interval while waiting on another object (seconds)
    /// e.g. a Claim waiting for its Composite to be deleted
    pub short_wait_secs: u64,
    /// Maximum concurrent reconciliations per controller
    pub max_concurrent_reconciliations: u16,
    /// Namespace for connection secrets of Composites created from claims
    pub connection_secret_namespace: String,
    /// Fibonacci backoff floor for failed passes (seconds)
    pub backoff_min_secs: u64,
    /// Fibonacci backoff ceiling for failed passes (seconds)
    pub backoff_max_secs: u64,
    /// Delay before restarting a controller stream that ended (seconds)
    pub watch_restart_delay_secs: u64,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            reconcile_timeout_secs: DEFAULT_RECONCILE_TIMEOUT_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            short_wait_secs: DEFAULT_SHORT_WAIT_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            connection_secret_namespace: DEFAULT_CONNECTION_SECRET_NAMESPACE.to_string(),
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            reconcile_timeout_secs: env_var_or_default(
                "RECONCILE_TIMEOUT_SECS",
                DEFAULT_RECONCILE_TIMEOUT_SECS,
            ),
            poll_interval_secs: env_var_or_default(
                "POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            ),
            short_wait_secs: env_var_or_default("SHORT_WAIT_SECS", DEFAULT_SHORT_WAIT_SECS),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            connection_secret_namespace: env_var_or_default_str(
                "CONNECTION_SECRET_NAMESPACE",
                DEFAULT_CONNECTION_SECRET_NAMESPACE,
            ),
            backoff_min_secs: env_var_or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
        }
    }

    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn short_wait(&self) -> Duration {
        Duration::from_secs(self.short_wait_secs)
    }

    /// Get watch restart delay duration
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_constants() {
        let config = ControllerConfig::default();
        assert_eq!(config.reconcile_timeout(), Duration::from_secs(60));
        assert_eq!(config.short_wait(), Duration::from_secs(30));
        assert_eq!(config.connection_secret_namespace, "octopilot-system");
        assert!(config.backoff_min_secs <= config.backoff_max_secs);
    }

    #[test]
    fn test_unparseable_value_falls_back_to_default() {
        assert_eq!(
            env_var_or_default("LIFECYCLE_TEST_UNSET_VARIABLE", 42_u64),
            42
        );
    }
}
