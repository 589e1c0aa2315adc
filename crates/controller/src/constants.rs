//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group for every custom resource owned by this controller
pub const API_GROUP: &str = "lifecycle.octopilot.io";

/// API version for every custom resource owned by this controller
pub const API_VERSION: &str = "v1";

/// Field manager name used for server-side apply
pub const FIELD_MANAGER: &str = "lifecycle-controller";

/// Finalizer held by Managed, Composite and Claim resources while cleanup is pending
pub const FINALIZER: &str = "finalizer.lifecycle.octopilot.io";

/// Finalizer held by a ProviderConfig while it has users
pub const IN_USE_FINALIZER: &str = "in-use.lifecycle.octopilot.io";

/// Label on ProviderConfigUsage records naming the ProviderConfig they count against
pub const LABEL_PROVIDER_CONFIG: &str = "lifecycle.octopilot.io/provider-config";

/// Label on a Composite naming the claim it was created for
pub const LABEL_CLAIM_NAME: &str = "lifecycle.octopilot.io/claim-name";

/// Label on a Composite naming the namespace of the claim it was created for
pub const LABEL_CLAIM_NAMESPACE: &str = "lifecycle.octopilot.io/claim-namespace";

/// Annotation that pauses reconciliation of any resource when set to "true"
pub const ANNOTATION_PAUSED: &str = "lifecycle.octopilot.io/paused";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default deadline for a single reconciliation pass (seconds)
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 60;

/// Default requeue after a successful pass (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default requeue while waiting on another object (seconds)
pub const DEFAULT_SHORT_WAIT_SECS: u64 = 30;

/// Default Fibonacci backoff floor for failed passes (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 1;

/// Default Fibonacci backoff ceiling for failed passes (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting a controller stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default namespace for connection secrets written by Composites created from claims
pub const DEFAULT_CONNECTION_SECRET_NAMESPACE: &str = "octopilot-system";

/// Default maximum concurrent reconciliations per controller
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;
