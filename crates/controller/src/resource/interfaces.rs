//! # Capability Contracts
//!
//! Narrow traits that resource kinds implement selectively. Lifecycle components
//! depend on the capability they need rather than on a concrete kind, e.g. the
//! finalizer manager only needs [`Object`].
//!
//! Required references are plain fields and their accessors return them
//! directly; optional ones are `Option`s. Callers holding a
//! [`RequiredProviderConfigReferencer`] never have to handle an unset reference.

use crate::crd::{
    Condition, ConditionedStatus, DeletionPolicy, LabelSelector, LocalSecretReference,
    ManagementPolicies, ReconciliationPolicy, Reference, SecretReference, TypedReference,
    UpdatePolicy, CompositeDeletePolicy,
};
use crate::store::ObjectKey;
use kube::Resource;
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;

/// Any persisted object: identity plus resource version
pub trait Object:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn key(&self) -> ObjectKey {
        let meta = self.meta();
        ObjectKey {
            api_version: Self::api_version(&()).into_owned(),
            kind: Self::kind(&()).into_owned(),
            namespace: meta.namespace.clone(),
            name: meta.name.clone().unwrap_or_default(),
        }
    }

    fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or("unknown")
    }

    fn resource_version(&self) -> Option<&str> {
        self.meta().resource_version.as_deref()
    }

    fn is_being_deleted(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }

    fn has_finalizer(&self, finalizer: &str) -> bool {
        self.meta()
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|x| x == finalizer))
    }

    /// Reference to this object that carries its type
    fn typed_reference(&self) -> TypedReference {
        let key = self.key();
        TypedReference {
            api_version: key.api_version,
            kind: key.kind,
            name: key.name,
            namespace: key.namespace,
        }
    }
}

impl<T> Object for T where
    T: Resource<DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// A resource whose status holds conditions
pub trait Conditioned {
    fn conditioned(&self) -> Option<&ConditionedStatus>;
    fn conditioned_mut(&mut self) -> &mut ConditionedStatus;

    fn set_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        self.conditioned_mut().set_conditions(conditions);
    }

    fn get_condition(&self, r#type: &str) -> Condition {
        match self.conditioned() {
            Some(status) => status.get_condition(r#type),
            None => ConditionedStatus::default().get_condition(r#type),
        }
    }
}

/// May reference the claim it was created for
pub trait ClaimReferencer {
    fn set_claim_reference(&mut self, r: Option<TypedReference>);
    fn get_claim_reference(&self) -> Option<&TypedReference>;
}

/// May reference the Composite that materializes it
pub trait CompositeResourceReferencer {
    fn set_resource_reference(&mut self, r: Option<TypedReference>);
    fn get_resource_reference(&self) -> Option<&TypedReference>;
}

/// References the resources it composes
pub trait ComposedResourcesReferencer {
    fn set_resource_references(&mut self, refs: Vec<TypedReference>);
    fn get_resource_references(&self) -> &[TypedReference];
}

pub trait EnvironmentConfigReferencer {
    fn set_environment_config_references(&mut self, refs: Vec<TypedReference>);
    fn get_environment_config_references(&self) -> &[TypedReference];
}

/// May write a connection secret to an arbitrary namespace
pub trait ConnectionSecretWriterTo {
    fn set_write_connection_secret_to_reference(&mut self, r: Option<SecretReference>);
    fn get_write_connection_secret_to_reference(&self) -> Option<&SecretReference>;
}

/// May write a connection secret to its own namespace
pub trait LocalConnectionSecretWriterTo {
    fn set_write_connection_secret_to_reference(&mut self, r: Option<LocalSecretReference>);
    fn get_write_connection_secret_to_reference(&self) -> Option<&LocalSecretReference>;
}

pub trait Manageable {
    fn set_management_policies(&mut self, p: ManagementPolicies);
    fn get_management_policies(&self) -> &ManagementPolicies;
}

pub trait Orphanable {
    fn set_deletion_policy(&mut self, p: DeletionPolicy);
    fn get_deletion_policy(&self) -> DeletionPolicy;
}

pub trait CustomReconciliation {
    fn set_reconciliation_policy(&mut self, p: Option<ReconciliationPolicy>);
    fn get_reconciliation_policy(&self) -> Option<&ReconciliationPolicy>;
}

/// References a ProviderConfig; the reference is never unset
pub trait RequiredProviderConfigReferencer {
    fn set_provider_config_reference(&mut self, r: Reference);
    fn get_provider_config_reference(&self) -> &Reference;
}

/// References exactly one resource
pub trait RequiredTypedResourceReferencer {
    fn set_resource_reference(&mut self, r: TypedReference);
    fn get_resource_reference(&self) -> &TypedReference;
}

/// Counts how many resources use it
pub trait UserCounter {
    fn set_users(&mut self, users: i64);
    fn get_users(&self) -> i64;
}

pub trait CompositionSelector {
    fn set_composition_selector(&mut self, s: Option<LabelSelector>);
    fn get_composition_selector(&self) -> Option<&LabelSelector>;
}

pub trait CompositionReferencer {
    fn set_composition_reference(&mut self, r: Option<Reference>);
    fn get_composition_reference(&self) -> Option<&Reference>;
}

pub trait CompositionRevisionReferencer {
    fn set_composition_revision_reference(&mut self, r: Option<Reference>);
    fn get_composition_revision_reference(&self) -> Option<&Reference>;
}

pub trait CompositionRevisionSelector {
    fn set_composition_revision_selector(&mut self, s: Option<LabelSelector>);
    fn get_composition_revision_selector(&self) -> Option<&LabelSelector>;
}

/// Uses a composition and may follow new revisions of it
pub trait CompositionUpdater {
    fn set_composition_update_policy(&mut self, p: UpdatePolicy);
    fn get_composition_update_policy(&self) -> UpdatePolicy;
}

/// Creates a Composite and controls how it is deleted
pub trait CompositeResourceDeleter {
    fn set_composite_delete_policy(&mut self, p: CompositeDeletePolicy);
    fn get_composite_delete_policy(&self) -> CompositeDeletePolicy;
}

pub trait ConnectionDetailsPublishedTimer {
    fn set_connection_details_last_published_time(&mut self, t: Option<String>);
    fn get_connection_details_last_published_time(&self) -> Option<&str>;
}

pub trait ReconciliationObserver {
    fn set_observed_generation(&mut self, generation: i64);
    fn get_observed_generation(&self) -> i64;
}

/// A concrete external resource representation
pub trait Managed:
    Object
    + RequiredProviderConfigReferencer
    + ConnectionSecretWriterTo
    + Manageable
    + Orphanable
    + CustomReconciliation
    + Conditioned
{
}

impl<T> Managed for T where
    T: Object
        + RequiredProviderConfigReferencer
        + ConnectionSecretWriterTo
        + Manageable
        + Orphanable
        + CustomReconciliation
        + Conditioned
{
}

/// Composes one or more Composed resources
pub trait Composite:
    Object
    + CompositionSelector
    + CompositionReferencer
    + CompositionUpdater
    + CompositionRevisionReferencer
    + CompositionRevisionSelector
    + ComposedResourcesReferencer
    + EnvironmentConfigReferencer
    + ClaimReferencer
    + ConnectionSecretWriterTo
    + Conditioned
    + ConnectionDetailsPublishedTimer
    + ReconciliationObserver
{
}

impl<T> Composite for T where
    T: Object
        + CompositionSelector
        + CompositionReferencer
        + CompositionUpdater
        + CompositionRevisionReferencer
        + CompositionRevisionSelector
        + ComposedResourcesReferencer
        + EnvironmentConfigReferencer
        + ClaimReferencer
        + ConnectionSecretWriterTo
        + Conditioned
        + ConnectionDetailsPublishedTimer
        + ReconciliationObserver
{
}

/// Can be composed into a Composite
///
/// Composed kinds are arbitrary, so this bundle does not require [`Object`];
/// they are read through a view keyed by the Composite's typed references.
pub trait Composed: Conditioned + ConnectionSecretWriterTo + ReconciliationObserver {}

impl<T> Composed for T where T: Conditioned + ConnectionSecretWriterTo + ReconciliationObserver {}

/// The user-facing handle for a Composite
pub trait CompositeClaim:
    Object
    + CompositionSelector
    + CompositionReferencer
    + CompositionUpdater
    + CompositionRevisionReferencer
    + CompositionRevisionSelector
    + CompositeResourceDeleter
    + CompositeResourceReferencer
    + LocalConnectionSecretWriterTo
    + Conditioned
    + ConnectionDetailsPublishedTimer
    + ReconciliationObserver
{
}

impl<T> CompositeClaim for T where
    T: Object
        + CompositionSelector
        + CompositionReferencer
        + CompositionUpdater
        + CompositionRevisionReferencer
        + CompositionRevisionSelector
        + CompositeResourceDeleter
        + CompositeResourceReferencer
        + LocalConnectionSecretWriterTo
        + Conditioned
        + ConnectionDetailsPublishedTimer
        + ReconciliationObserver
{
}
