//! # ManagedResource
//!
//! A ManagedResource is the in-cluster representation of exactly one external
//! resource. `forProvider` carries the desired external state and
//! `status.atProvider` the last observed one.

use crate::crd::{
    ConditionedStatus, DeletionPolicy, ManagementPolicies, ReconciliationPolicy, Reference,
    SecretReference,
};
use crate::resource::{
    Conditioned, ConnectionSecretWriterTo, CustomReconciliation, Manageable, Orphanable,
    ReconciliationObserver, RequiredProviderConfigReferencer,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ManagedResource Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: lifecycle.octopilot.io/v1
/// kind: ManagedResource
/// metadata:
///   name: orders-db
/// spec:
///   providerConfigRef:
///     name: default
///   managementPolicies: ["Observe", "Delete"]
///   deletionPolicy: Delete
///   forProvider:
///     engine: postgres
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "ManagedResource",
    group = "lifecycle.octopilot.io",
    version = "v1",
    status = "ManagedResourceStatus",
    shortname = "mr",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Synced", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Synced\")].status"}, {"name":"Config", "type":"string", "jsonPath":".spec.providerConfigRef.name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceSpec {
    /// ProviderConfig used to reach the external system (required)
    pub provider_config_ref: Reference,
    /// Where to publish the connection details of the external resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<SecretReference>,
    /// Actions the controller may take against the external resource
    #[serde(default)]
    pub management_policies: ManagementPolicies,
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciliation_policy: Option<ReconciliationPolicy>,
    /// Desired state of the external resource
    #[serde(default)]
    pub for_provider: BTreeMap<String, String>,
}

impl ManagedResourceSpec {
    pub fn new(provider_config: impl Into<String>) -> Self {
        Self {
            provider_config_ref: Reference::new(provider_config),
            write_connection_secret_to_ref: None,
            management_policies: ManagementPolicies::default(),
            deletion_policy: DeletionPolicy::default(),
            reconciliation_policy: None,
            for_provider: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceStatus {
    #[serde(flatten)]
    pub conditioned: ConditionedStatus,
    /// Last observed state of the external resource
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub at_provider: BTreeMap<String, String>,
    #[serde(default)]
    pub observed_generation: i64,
}

impl Conditioned for ManagedResource {
    fn conditioned(&self) -> Option<&ConditionedStatus> {
        self.status.as_ref().map(|s| &s.conditioned)
    }

    fn conditioned_mut(&mut self) -> &mut ConditionedStatus {
        &mut self.status.get_or_insert_with(Default::default).conditioned
    }
}

impl RequiredProviderConfigReferencer for ManagedResource {
    fn set_provider_config_reference(&mut self, r: Reference) {
        self.spec.provider_config_ref = r;
    }

    fn get_provider_config_reference(&self) -> &Reference {
        &self.spec.provider_config_ref
    }
}

impl ConnectionSecretWriterTo for ManagedResource {
    fn set_write_connection_secret_to_reference(&mut self, r: Option<SecretReference>) {
        self.spec.write_connection_secret_to_ref = r;
    }

    fn get_write_connection_secret_to_reference(&self) -> Option<&SecretReference> {
        self.spec.write_connection_secret_to_ref.as_ref()
    }
}

impl Manageable for ManagedResource {
    fn set_management_policies(&mut self, p: ManagementPolicies) {
        self.spec.management_policies = p;
    }

    fn get_management_policies(&self) -> &ManagementPolicies {
        &self.spec.management_policies
    }
}

impl Orphanable for ManagedResource {
    fn set_deletion_policy(&mut self, p: DeletionPolicy) {
        self.spec.deletion_policy = p;
    }

    fn get_deletion_policy(&self) -> DeletionPolicy {
        self.spec.deletion_policy
    }
}

impl CustomReconciliation for ManagedResource {
    fn set_reconciliation_policy(&mut self, p: Option<ReconciliationPolicy>) {
        self.spec.reconciliation_policy = p;
    }

    fn get_reconciliation_policy(&self) -> Option<&ReconciliationPolicy> {
        self.spec.reconciliation_policy.as_ref()
    }
}

impl ReconciliationObserver for ManagedResource {
    fn set_observed_generation(&mut self, generation: i64) {
        self.status
            .get_or_insert_with(Default::default)
            .observed_generation = generation;
    }

    fn get_observed_generation(&self) -> i64 {
        self.status.as_ref().map_or(0, |s| s.observed_generation)
    }
}
