//! # Object Store
//!
//! Persistence seam for every resource the lifecycle components touch.
//!
//! All writes carry the resource version that was read, so a write based on a
//! stale read fails with [`Error::Conflict`](crate::Error::Conflict) instead of
//! overwriting a concurrent change.
//!
//! Two implementations are provided:
//! - [`KubeStore`] talks to the Kubernetes API through dynamic objects
//! - [`MemoryStore`] keeps objects in process and emulates Kubernetes write
//!   semantics (resource versions, generation bumps, finalizer-gated deletion)

mod kubernetes;
mod memory;

pub use kubernetes::KubeStore;
pub use memory::MemoryStore;

use crate::crd::{LabelSelector, TypedReference};
use crate::error::Result;
use crate::resource::Object;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;

/// Identity of a persisted object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn cluster(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            namespace: None,
            name: name.into(),
        }
    }

    pub fn namespaced(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Key for a statically typed kind
    pub fn of<K: Object>(namespace: Option<&str>, name: &str) -> Self {
        Self {
            api_version: K::api_version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }

    /// Split `apiVersion` into group and version; the core group is empty
    #[must_use]
    pub fn group_version(&self) -> (&str, &str) {
        match self.api_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", self.api_version.as_str()),
        }
    }
}

impl From<&TypedReference> for ObjectKey {
    fn from(r: &TypedReference) -> Self {
        Self {
            api_version: r.api_version.clone(),
            kind: r.kind.clone(),
            namespace: r.namespace.clone(),
            name: r.name.clone(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Versioned object storage
///
/// `update` writes everything but the status and `update_status` writes only
/// the status. Both refresh the resource version (and generation) on the
/// passed object, leaving the rest of it untouched, so a pass can update the
/// spec and then the status of the same value.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Read one object; `K` may be a view decoding a subset of the fields
    async fn get<K>(&self, key: &ObjectKey) -> Result<K>
    where
        K: DeserializeOwned + Send + 'static;

    /// All objects of kind `K` whose labels match the selector, across namespaces
    async fn list<K: Object>(&self, selector: &LabelSelector) -> Result<Vec<K>>;

    /// Create an object; fails `AlreadyExists` if the identity is taken
    async fn create<K: Object>(&self, obj: &mut K) -> Result<()>;

    async fn update<K: Object>(&self, obj: &mut K) -> Result<()>;

    async fn update_status<K: Object>(&self, obj: &mut K) -> Result<()>;

    /// Request deletion; objects holding finalizers are only marked for deletion
    async fn delete(&self, key: &ObjectKey, expected_version: Option<&str>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ProviderConfig;

    #[test]
    fn test_key_for_typed_kind() {
        let key = ObjectKey::of::<ProviderConfig>(None, "pc1");
        assert_eq!(key.api_version, "lifecycle.octopilot.io/v1");
        assert_eq!(key.kind, "ProviderConfig");
        assert_eq!(key.group_version(), ("lifecycle.octopilot.io", "v1"));
        assert_eq!(key.to_string(), "ProviderConfig pc1");
    }

    #[test]
    fn test_core_group_version() {
        let key = ObjectKey::namespaced("v1", "Secret", "infra", "conn");
        assert_eq!(key.group_version(), ("", "v1"));
        assert_eq!(key.to_string(), "Secret infra/conn");
    }
}
