//! Lifecycle Controller Library
//!
//! Keeps Claims, Composites, their composed resources, Managed resources and
//! ProviderConfig usages consistent with one another. Each lifecycle is a
//! [`controller::Reconciler`] over an [`store::ObjectStore`], so the same
//! reconcilers run against the Kubernetes API or the in-memory store used in tests.
//!
//! ## Quick Start
//!
//! ```rust
//! use lifecycle_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod connection;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod error;
pub mod observability;
pub mod prelude;
pub mod resource;
pub mod runtime;
pub mod store;

pub use error::{Error, Result};
