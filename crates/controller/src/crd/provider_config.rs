//! # ProviderConfig and ProviderConfigUsage
//!
//! A ProviderConfig holds shared configuration for a set of Managed resources.
//! Every Managed resource that uses one is recorded by a ProviderConfigUsage,
//! and the ProviderConfig's `status.users` is recomputed from those records.

use crate::crd::{ConditionedStatus, Reference, SecretReference, TypedReference};
use crate::resource::{
    Conditioned, RequiredProviderConfigReferencer, RequiredTypedResourceReferencer, UserCounter,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ProviderConfig Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: lifecycle.octopilot.io/v1
/// kind: ProviderConfig
/// metadata:
///   name: default
/// spec:
///   credentialsSecretRef:
///     name: provider-creds
///     namespace: octopilot-system
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "ProviderConfig",
    group = "lifecycle.octopilot.io",
    version = "v1",
    status = "ProviderConfigStatus",
    shortname = "pc",
    printcolumn = r#"{"name":"Users", "type":"integer", "jsonPath":".status.users"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigSpec {
    /// Secret holding the credentials used to reach the external system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_secret_ref: Option<SecretReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigStatus {
    /// Number of ProviderConfigUsage records pointing at this ProviderConfig
    #[serde(default)]
    pub users: i64,
    #[serde(flatten)]
    pub conditioned: ConditionedStatus,
}

impl Conditioned for ProviderConfig {
    fn conditioned(&self) -> Option<&ConditionedStatus> {
        self.status.as_ref().map(|s| &s.conditioned)
    }

    fn conditioned_mut(&mut self) -> &mut ConditionedStatus {
        &mut self.status.get_or_insert_with(Default::default).conditioned
    }
}

impl UserCounter for ProviderConfig {
    fn set_users(&mut self, users: i64) {
        self.status.get_or_insert_with(Default::default).users = users;
    }

    fn get_users(&self) -> i64 {
        self.status.as_ref().map_or(0, |s| s.users)
    }
}

/// ProviderConfigUsage records that one Managed resource uses one ProviderConfig
///
/// Usages are labelled with the ProviderConfig name so they can be listed by
/// label selector.
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "ProviderConfigUsage",
    group = "lifecycle.octopilot.io",
    version = "v1",
    shortname = "pcu",
    printcolumn = r#"{"name":"Config", "type":"string", "jsonPath":".spec.providerConfigRef.name"}, {"name":"Resource", "type":"string", "jsonPath":".spec.resourceRef.name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigUsageSpec {
    pub provider_config_ref: Reference,
    pub resource_ref: TypedReference,
}

impl RequiredProviderConfigReferencer for ProviderConfigUsage {
    fn set_provider_config_reference(&mut self, r: Reference) {
        self.spec.provider_config_ref = r;
    }

    fn get_provider_config_reference(&self) -> &Reference {
        &self.spec.provider_config_ref
    }
}

impl RequiredTypedResourceReferencer for ProviderConfigUsage {
    fn set_resource_reference(&mut self, r: TypedReference) {
        self.spec.resource_ref = r;
    }

    fn get_resource_reference(&self) -> &TypedReference {
        &self.spec.resource_ref
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Condition, TYPE_READY};

    #[test]
    fn test_user_count_defaults_to_zero() {
        let mut pc = ProviderConfig::new("pc1", ProviderConfigSpec::default());
        assert_eq!(pc.get_users(), 0);
        pc.set_users(3);
        assert_eq!(pc.get_users(), 3);
    }

    #[test]
    fn test_status_wire_format_flattens_conditions() {
        let mut pc = ProviderConfig::new("pc1", ProviderConfigSpec::default());
        pc.set_users(1);
        pc.set_conditions([Condition::available()]);
        let json = serde_json::to_value(&pc).unwrap();
        assert_eq!(json["status"]["users"], 1);
        assert_eq!(json["status"]["conditions"][0]["type"], TYPE_READY);
    }
}
