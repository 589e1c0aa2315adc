//! # CompositeResourceClaim
//!
//! The namespaced handle users create to request a Composite. The claim owns
//! the lifecycle of the Composite bound through `spec.resourceRef`.

use crate::crd::{
    CompositeDeletePolicy, ConditionedStatus, LabelSelector, LocalSecretReference, Reference,
    TypedReference, UpdatePolicy,
};
use crate::resource::{
    CompositeResourceDeleter, CompositeResourceReferencer, CompositionReferencer,
    CompositionRevisionReferencer, CompositionRevisionSelector, CompositionSelector,
    CompositionUpdater, Conditioned, ConnectionDetailsPublishedTimer,
    LocalConnectionSecretWriterTo, ReconciliationObserver,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// CompositeResourceClaim Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: lifecycle.octopilot.io/v1
/// kind: CompositeResourceClaim
/// metadata:
///   name: orders
///   namespace: team-a
/// spec:
///   compositionSelector:
///     matchLabels:
///       tier: standard
///   compositeDeletePolicy: Foreground
///   writeConnectionSecretToRef:
///     name: orders-conn
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "CompositeResourceClaim",
    group = "lifecycle.octopilot.io",
    version = "v1",
    namespaced,
    status = "CompositeResourceClaimStatus",
    shortname = "claim",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Composite", "type":"string", "jsonPath":".spec.resourceRef.name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResourceClaimSpec {
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
    #[serde(default)]
    pub composite_delete_policy: CompositeDeletePolicy,
    /// The Composite bound to this claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_ref: Option<TypedReference>,
    /// Secret in the claim's namespace receiving the Composite's connection details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<LocalSecretReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResourceClaimStatus {
    #[serde(flatten)]
    pub conditioned: ConditionedStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_details_last_published_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_details_digest: Option<String>,
    #[serde(default)]
    pub observed_generation: i64,
}

impl Conditioned for CompositeResourceClaim {
    fn conditioned(&self) -> Option<&ConditionedStatus> {
        self.status.as_ref().map(|s| &s.conditioned)
    }

    fn conditioned_mut(&mut self) -> &mut ConditionedStatus {
        &mut self.status.get_or_insert_with(Default::default).conditioned
    }
}

impl CompositionSelector for CompositeResourceClaim {
    fn set_composition_selector(&mut self, s: Option<LabelSelector>) {
        self.spec.composition_selector = s;
    }

    fn get_composition_selector(&self) -> Option<&LabelSelector> {
        self.spec.composition_selector.as_ref()
    }
}

impl CompositionReferencer for CompositeResourceClaim {
    fn set_composition_reference(&mut self, r: Option<Reference>) {
        self.spec.composition_ref = r;
    }

    fn get_composition_reference(&self) -> Option<&Reference> {
        self.spec.composition_ref.as_ref()
    }
}

impl CompositionRevisionReferencer for CompositeResourceClaim {
    fn set_composition_revision_reference(&mut self, r: Option<Reference>) {
        self.spec.composition_revision_ref = r;
    }

    fn get_composition_revision_reference(&self) -> Option<&Reference> {
        self.spec.composition_revision_ref.as_ref()
    }
}

impl CompositionRevisionSelector for CompositeResourceClaim {
    fn set_composition_revision_selector(&mut self, s: Option<LabelSelector>) {
        self.spec.composition_revision_selector = s;
    }

    fn get_composition_revision_selector(&self) -> Option<&LabelSelector> {
        self.spec.composition_revision_selector.as_ref()
    }
}

impl CompositionUpdater for CompositeResourceClaim {
    fn set_composition_update_policy(&mut self, p: UpdatePolicy) {
        self.spec.composition_update_policy = p;
    }

    fn get_composition_update_policy(&self) -> UpdatePolicy {
        self.spec.composition_update_policy
    }
}

impl CompositeResourceDeleter for CompositeResourceClaim {
    fn set_composite_delete_policy(&mut self, p: CompositeDeletePolicy) {
        self.spec.composite_delete_policy = p;
    }

    fn get_composite_delete_policy(&self) -> CompositeDeletePolicy {
        self.spec.composite_delete_policy
    }
}

impl CompositeResourceReferencer for CompositeResourceClaim {
    fn set_resource_reference(&mut self, r: Option<TypedReference>) {
        self.spec.resource_ref = r;
    }

    fn get_resource_reference(&self) -> Option<&TypedReference> {
        self.spec.resource_ref.as_ref()
    }
}

impl LocalConnectionSecretWriterTo for CompositeResourceClaim {
    fn set_write_connection_secret_to_reference(&mut self, r: Option<LocalSecretReference>) {
        self.spec.write_connection_secret_to_ref = r;
    }

    fn get_write_connection_secret_to_reference(&self) -> Option<&LocalSecretReference> {
        self.spec.write_connection_secret_to_ref.as_ref()
    }
}

impl ConnectionDetailsPublishedTimer for CompositeResourceClaim {
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

impl ReconciliationObserver for CompositeResourceClaim {
    fn set_observed_generation(&mut self, generation: i64) {
        self.status
            .get_or_insert_with(Default::default)
            .observed_generation = generation;
    }

    fn get_observed_generation(&self) -> i64 {
        self.status.as_ref().map_or(0, |s| s.observed_generation)
    }
}
