//! # External Client
//!
//! Seam between the Managed lifecycle and the external system a
//! ManagedResource represents. Integrators supply an implementation per
//! external API; the lifecycle only decides when each call is allowed.

use crate::connection::ConnectionDetails;
use crate::crd::ManagedResource;
use crate::error::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// What the external system reported for a Managed resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalObservation {
    pub resource_exists: bool,
    /// The external resource matches `forProvider`
    pub resource_up_to_date: bool,
    /// `forProvider` was filled in from the observed state and should be persisted
    pub resource_late_initialized: bool,
    pub connection_details: ConnectionDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalCreation {
    pub connection_details: ConnectionDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalUpdate {
    pub connection_details: ConnectionDetails,
}

/// Operations against the external system
///
/// `observe` may mutate the resource to late-initialize `forProvider` or to
/// record `status.atProvider`. `delete` returning `NotFound` means the
/// external resource is already gone.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExternalClient: Send + Sync {
    async fn observe(&self, mr: &mut ManagedResource) -> Result<ExternalObservation>;

    async fn create(&self, mr: &mut ManagedResource) -> Result<ExternalCreation>;

    async fn update(&self, mr: &mut ManagedResource) -> Result<ExternalUpdate>;

    async fn delete(&self, mr: &ManagedResource) -> Result<()>;
}
