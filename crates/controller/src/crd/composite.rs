//! # CompositeResource and ComposedResource
//!
//! A CompositeResource is materialized by the resources a composition renders
//! for it. Those composed resources are read through [`ComposedResource`], a
//! view that decodes only the fields every composed kind shares.

use crate::crd::{
    ConditionedStatus, LabelSelector, Reference, SecretReference, TypedReference, UpdatePolicy,
};
use crate::resource::{
    ClaimReferencer, ComposedResourcesReferencer, CompositionReferencer,
    CompositionRevisionReferencer, CompositionRevisionSelector, CompositionSelector,
    CompositionUpdater, Conditioned, ConnectionDetailsPublishedTimer, ConnectionSecretWriterTo,
    EnvironmentConfigReferencer, ReconciliationObserver,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// CompositeResource Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: lifecycle.octopilot.io/v1
/// kind: CompositeResource
/// metadata:
///   name: orders-platform
/// spec:
///   compositionSelector:
///     matchLabels:
///       tier: standard
///   compositionUpdatePolicy: Manual
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "CompositeResource",
    group = "lifecycle.octopilot.io",
    version = "v1",
    status = "CompositeResourceStatus",
    shortname = "xr",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Composition", "type":"string", "jsonPath":".spec.compositionRef.name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition_selector: Option<LabelSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition_revision_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition_revision_selector: Option<LabelSelector>,
    #[serde(default)]
    pub composition_update_policy: UpdatePolicy,
    /// Resources rendered from the composition
    #[serde(default)]
    pub resource_refs: Vec<TypedReference>,
    #[serde(default)]
    pub environment_config_refs: Vec<TypedReference>,
    /// The claim this Composite was created for, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_ref: Option<TypedReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<SecretReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResourceStatus {
    #[serde(flatten)]
    pub conditioned: ConditionedStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_details_last_published_time: Option<String>,
    /// SHA-256 of the last published connection details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_details_digest: Option<String>,
    #[serde(default)]
    pub observed_generation: i64,
}

impl Conditioned for CompositeResource {
    fn conditioned(&self) -> Option<&ConditionedStatus> {
        self.status.as_ref().map(|s| &s.conditioned)
    }

    fn conditioned_mut(&mut self) -> &mut ConditionedStatus {
        &mut self.status.get_or_insert_with(Default::default).conditioned
    }
}

impl CompositionSelector for CompositeResource {
    fn set_composition_selector(&mut self, s: Option<LabelSelector>) {
        self.spec.composition_selector = s;
    }

    fn get_composition_selector(&self) -> Option<&LabelSelector> {
        self.spec.composition_selector.as_ref()
    }
}

impl CompositionReferencer for CompositeResource {
    fn set_composition_reference(&mut self, r: Option<Reference>) {
        self.spec.composition_ref = r;
    }

    fn get_composition_reference(&self) -> Option<&Reference> {
        self.spec.composition_ref.as_ref()
    }
}

impl CompositionRevisionReferencer for CompositeResource {
    fn set_composition_revision_reference(&mut self, r: Option<Reference>) {
        self.spec.composition_revision_ref = r;
    }

    fn get_composition_revision_reference(&self) -> Option<&Reference> {
        self.spec.composition_revision_ref.as_ref()
    }
}

impl CompositionRevisionSelector for CompositeResource {
    fn set_composition_revision_selector(&mut self, s: Option<LabelSelector>) {
        self.spec.composition_revision_selector = s;
    }

    fn get_composition_revision_selector(&self) -> Option<&LabelSelector> {
        self.spec.composition_revision_selector.as_ref()
    }
}

impl CompositionUpdater for CompositeResource {
    fn set_composition_update_policy(&mut self, p: UpdatePolicy) {
        self.spec.composition_update_policy = p;
    }

    fn get_composition_update_policy(&self) -> UpdatePolicy {
        self.spec.composition_update_policy
    }
}

impl ComposedResourcesReferencer for CompositeResource {
    fn set_resource_references(&mut self, refs: Vec<TypedReference>) {
        self.spec.resource_refs = refs;
    }

    fn get_resource_references(&self) -> &[TypedReference] {
        &self.spec.resource_refs
    }
}

impl EnvironmentConfigReferencer for CompositeResource {
    fn set_environment_config_references(&mut self, refs: Vec<TypedReference>) {
        self.spec.environment_config_refs = refs;
    }

    fn get_environment_config_references(&self) -> &[TypedReference] {
        &self.spec.environment_config_refs
    }
}

impl ClaimReferencer for CompositeResource {
    fn set_claim_reference(&mut self, r: Option<TypedReference>) {
        self.spec.claim_ref = r;
    }

    fn get_claim_reference(&self) -> Option<&TypedReference> {
        self.spec.claim_ref.as_ref()
    }
}

impl ConnectionSecretWriterTo for CompositeResource {
    fn set_write_connection_secret_to_reference(&mut self, r: Option<SecretReference>) {
        self.spec.write_connection_secret_to_ref = r;
    }

    fn get_write_connection_secret_to_reference(&self) -> Option<&SecretReference> {
        self.spec.write_connection_secret_to_ref.as_ref()
    }
}

impl ConnectionDetailsPublishedTimer for CompositeResource {
    fn set_connection_details_last_published_time(&mut self, t: Option<String>) {
        self.status
            .get_or_insert_with(Default::default)
            .connection_details_last_published_time = t;
    }

    fn get_connection_details_last_published_time(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.connection_details_last_published_time.as_deref())
    }
}

impl ReconciliationObserver for CompositeResource {
    fn set_observed_generation(&mut self, generation: i64) {
        self.status
            .get_or_insert_with(Default::default)
            .observed_generation = generation;
    }

    fn get_observed_generation(&self) -> i64 {
        self.status.as_ref().map_or(0, |s| s.observed_generation)
    }
}

/// Shared view of any composed resource
///
/// Decodes the identity, the connection secret destination and the conditions
/// of an arbitrary kind. It carries no reference back to its Composite.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedResource {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ComposedResourceSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ComposedResourceStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedResourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<SecretReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedResourceStatus {
    #[serde(flatten)]
    pub conditioned: ConditionedStatus,
    #[serde(default)]
    pub observed_generation: i64,
}

impl Conditioned for ComposedResource {
    fn conditioned(&self) -> Option<&ConditionedStatus> {
        self.status.as_ref().map(|s| &s.conditioned)
    }

    fn conditioned_mut(&mut self) -> &mut ConditionedStatus {
        &mut self.status.get_or_insert_with(Default::default).conditioned
    }
}

impl ConnectionSecretWriterTo for ComposedResource {
    fn set_write_connection_secret_to_reference(&mut self, r: Option<SecretReference>) {
        self.spec.write_connection_secret_to_ref = r;
    }

    fn get_write_connection_secret_to_reference(&self) -> Option<&SecretReference> {
        self.spec.write_connection_secret_to_ref.as_ref()
    }
}

impl ReconciliationObserver for ComposedResource {
    fn set_observed_generation(&mut self, generation: i64) {
        self.status
            .get_or_insert_with(Default::default)
            .observed_generation = generation;
    }

    fn get_observed_generation(&self) -> i64 {
        self.status.as_ref().map_or(0, |s| s.observed_generation)
    }
}
