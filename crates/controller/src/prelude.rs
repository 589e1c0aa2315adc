//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use lifecycle_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (ProviderConfig, ManagedResource, CompositeResource, etc.)
//! - Capability traits (Object, Conditioned, Managed, etc.)
//! - Reconcilers and their collaborator traits
//! - Store and secret store traits with both implementations
//! - Config types (ControllerConfig, ServerConfig)
//! - The crate error type

// CRD types - most commonly used
pub use crate::crd::*;

// Capability traits
pub use crate::resource::*;

// Reconcilers and the seams integrators implement
pub use crate::controller::{
    ClaimReconciler, CompositeReconciler, CompositionRenderer, CompositionResolver,
    ExternalClient, ExternalCreation, ExternalObservation, ExternalUpdate, ManagedReconciler,
    PassOutcome, ProviderConfigReconciler, ProviderConfigUsageTracker, Reconciler,
};

// Storage
pub use crate::connection::{
    ConnectionDetails, KubeSecretStore, MemorySecretStore, SecretStore,
};
pub use crate::store::{KubeStore, MemoryStore, ObjectKey, ObjectStore};

// Config types - for configuration management
pub use crate::config::{
    ControllerConfig, ServerConfig, SharedControllerConfig, SharedServerConfig,
};

pub use crate::error::{Error, Result};
