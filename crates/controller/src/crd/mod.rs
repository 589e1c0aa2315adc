//! # Custom Resource Definitions
//!
//! CRD types for the lifecycle controller.
//!
//! ## Module Structure
//!
//! - `common.rs` - References, selectors and policies shared across kinds
//! - `condition.rs` - Conditions and the conditioned status block
//! - `provider_config.rs` - ProviderConfig and ProviderConfigUsage
//! - `managed.rs` - ManagedResource
//! - `composite.rs` - CompositeResource and the ComposedResource view
//! - `claim.rs` - CompositeResourceClaim

mod claim;
mod common;
mod composite;
mod condition;
mod managed;
mod provider_config;

// Re-export all public types
pub use claim::{CompositeResourceClaim, CompositeResourceClaimSpec, CompositeResourceClaimStatus};
pub use common::{
    CompositeDeletePolicy, DeletionPolicy, LabelSelector, LocalSecretReference, ManagementAction,
    ManagementPolicies, ReconciliationPolicy, Reference, SecretReference, TypedReference,
    UpdatePolicy,
};
pub use composite::{
    ComposedResource, ComposedResourceSpec, ComposedResourceStatus, CompositeResource,
    CompositeResourceSpec, CompositeResourceStatus,
};
pub use condition::{
    Condition, ConditionStatus, ConditionedStatus, REASON_AVAILABLE, REASON_CREATING,
    REASON_DELETING, REASON_IN_USE, REASON_RECONCILE_ERROR, REASON_RECONCILE_PAUSED,
    REASON_RECONCILE_SUCCESS, REASON_UNAVAILABLE, REASON_UNRESOLVABLE, TYPE_READY, TYPE_SYNCED,
};
pub(crate) use condition::now;
pub use managed::{ManagedResource, ManagedResourceSpec, ManagedResourceStatus};
pub use provider_config::{
    ProviderConfig, ProviderConfigSpec, ProviderConfigStatus, ProviderConfigUsage,
    ProviderConfigUsageSpec,
};
