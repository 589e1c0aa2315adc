//! # Controllers
//!
//! Lifecycle reconcilers and the pieces they share.
//!
//! ## Module Structure
//!
//! - `backoff.rs` - Fibonacci backoff for failed passes
//! - `types.rs` - `Reconciler` trait, pass outcomes and runtime context
//! - `usage.rs` - ProviderConfig usage ledger
//! - `provider_config.rs` - ProviderConfig in-use protection
//! - `managed/` - Managed resource lifecycle and the external client seam
//! - `composite/` - Composite resource lifecycle and the composition seams
//! - `claim/` - Claim binding, sync and deletion

pub mod backoff;
pub mod claim;
pub mod composite;
pub mod managed;
pub mod provider_config;
pub mod types;
pub mod usage;

pub use claim::{ClaimReconciler, ClaimState};
pub use composite::{
    CompositeReconciler, CompositeState, CompositionRenderer, CompositionResolver,
    composed_readiness,
};
pub use managed::{
    ExternalClient, ExternalCreation, ExternalObservation, ExternalUpdate, ManagedReconciler,
    ManagedState,
};
pub use provider_config::{ProviderConfigReconciler, ProviderConfigState};
pub use types::{BackoffState, Context, PassOutcome, Reconciler};
pub use usage::{ProviderConfigUsageTracker, usage_name};
