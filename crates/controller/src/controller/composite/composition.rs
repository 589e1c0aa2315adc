//! # Composition Seams
//!
//! Compositions and their revisions live outside this controller. A Composite
//! only needs to find them and to learn which resources a revision renders,
//! so both concerns are traits supplied by the integrator.

use crate::crd::{CompositeResource, LabelSelector, Reference, TypedReference};
use crate::error::Result;
use async_trait::async_trait;

/// Finds compositions and their revisions
#[async_trait]
pub trait CompositionResolver: Send + Sync {
    /// The composition matching the selector, if any
    async fn select_composition(&self, selector: &LabelSelector) -> Result<Option<Reference>>;

    /// The newest revision of the composition, optionally narrowed by a selector
    async fn latest_revision(
        &self,
        composition: &Reference,
        selector: Option<&LabelSelector>,
    ) -> Result<Option<Reference>>;
}

/// Produces the resources a composition revision declares for a Composite
///
/// Rendering is expected to create or update the composed resources and
/// return references to all of them, in a stable order.
#[async_trait]
pub trait CompositionRenderer: Send + Sync {
    async fn render(
        &self,
        composite: &CompositeResource,
        revision: &Reference,
    ) -> Result<Vec<TypedReference>>;
}
