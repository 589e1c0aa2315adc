//! # Common Types
//!
//! References, selectors and policies shared by several resource kinds.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reference to a cluster-scoped object of a kind implied by the field holding it
/// (ProviderConfig, Composition, CompositionRevision)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub name: String,
}

impl Reference {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Reference that carries its own type information
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TypedReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl fmt::Display for TypedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Secret in an arbitrary namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    pub name: String,
    pub namespace: String,
}

impl fmt::Display for SecretReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Secret in the namespace of the object that references it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalSecretReference {
    pub name: String,
}

impl LocalSecretReference {
    /// Qualify with the owning object's namespace
    #[must_use]
    pub fn in_namespace(&self, namespace: &str) -> SecretReference {
        SecretReference {
            name: self.name.clone(),
            namespace: namespace.to_string(),
        }
    }
}

/// Equality-based label selector
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    pub fn from_labels<I, K, V>(labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            match_labels: labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// An empty selector matches everything
    #[must_use]
    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        self.match_labels.iter().all(|(k, v)| {
            labels
                .and_then(|l| l.get(k))
                .is_some_and(|actual| actual == v)
        })
    }

    /// Render in the `k=v,k2=v2` form accepted by the Kubernetes API
    #[must_use]
    pub fn to_query(&self) -> String {
        self.match_labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A capability a Managed resource's controller may exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum ManagementAction {
    #[serde(rename = "*")]
    All,
    Observe,
    Create,
    Update,
    Delete,
    LateInitialize,
}

/// Set of permitted management actions, `["*"]` unless specified
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct ManagementPolicies(pub Vec<ManagementAction>);

impl Default for ManagementPolicies {
    fn default() -> Self {
        Self(vec![ManagementAction::All])
    }
}

impl ManagementPolicies {
    pub fn new(actions: impl IntoIterator<Item = ManagementAction>) -> Self {
        Self(actions.into_iter().collect())
    }

    #[must_use]
    pub fn allows(&self, action: ManagementAction) -> bool {
        self.0
            .iter()
            .any(|a| *a == ManagementAction::All || *a == action)
    }

    /// Every supported combination includes Observe
    pub fn validate(&self) -> Result<(), String> {
        if self.allows(ManagementAction::Observe) {
            Ok(())
        } else {
            Err(format!(
                "management policies {:?} do not include Observe",
                self.0
            ))
        }
    }
}

/// What happens to the external resource when its Managed resource is deleted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum DeletionPolicy {
    #[default]
    Delete,
    Orphan,
}

/// Per-resource reconciliation overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationPolicy {
    /// Stop all reconciliation other than refreshing the paused condition
    #[serde(default)]
    pub paused: bool,
    /// Requeue after this many seconds instead of the controller's poll interval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resync_interval_seconds: Option<u64>,
}

/// How a Composite or Claim follows new CompositionRevisions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum UpdatePolicy {
    #[default]
    Automatic,
    Manual,
}

/// How deleting a Claim propagates to its Composite
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum CompositeDeletePolicy {
    #[default]
    Background,
    Foreground,
}
