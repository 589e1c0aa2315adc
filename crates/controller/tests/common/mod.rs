//! Common test utilities for the lifecycle scenario tests
//!
//! Provides in-memory fixtures and fake collaborators for the composition and
//! external-system seams.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use lifecycle_controller::Result;
use lifecycle_controller::controller::{
    CompositionRenderer, CompositionResolver, ExternalClient, ExternalCreation,
    ExternalObservation, ExternalUpdate,
};
use lifecycle_controller::crd::{
    CompositeResource, LabelSelector, ManagedResource, ProviderConfig, ProviderConfigSpec,
    Reference, SecretReference, TypedReference,
};
use lifecycle_controller::store::{MemoryStore, ObjectKey, ObjectStore};
use serde_json::json;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const COMPOSED_API_VERSION: &str = "storage.example.org/v1";
pub const COMPOSED_KIND: &str = "Bucket";

pub async fn create_provider_config(store: &MemoryStore, name: &str) -> ProviderConfig {
    let mut pc = ProviderConfig::new(name, ProviderConfigSpec::default());
    store.create(&mut pc).await.unwrap();
    pc
}

pub async fn provider_config(store: &MemoryStore, name: &str) -> ProviderConfig {
    store
        .get(&ObjectKey::of::<ProviderConfig>(None, name))
        .await
        .unwrap()
}

pub fn composed_ref(name: &str) -> TypedReference {
    TypedReference {
        api_version: COMPOSED_API_VERSION.to_string(),
        kind: COMPOSED_KIND.to_string(),
        name: name.to_string(),
        namespace: None,
    }
}

/// Seed or replace a composed resource reporting the given Ready status
pub async fn put_composed(store: &MemoryStore, name: &str, ready: &str) -> ObjectKey {
    put_composed_with(store, name, ready, &[], None).await
}

/// Seed or replace a composed resource with finalizers and a connection secret
pub async fn put_composed_with(
    store: &MemoryStore,
    name: &str,
    ready: &str,
    finalizers: &[&str],
    connection_secret: Option<&SecretReference>,
) -> ObjectKey {
    let mut spec = json!({});
    if let Some(secret) = connection_secret {
        spec["writeConnectionSecretToRef"] = json!({
            "name": secret.name,
            "namespace": secret.namespace,
        });
    }
    store
        .put_raw(json!({
            "apiVersion": COMPOSED_API_VERSION,
            "kind": COMPOSED_KIND,
            "metadata": { "name": name, "finalizers": finalizers },
            "spec": spec,
            "status": {
                "conditions": [{
                    "type": "Ready",
                    "status": ready,
                    "reason": "Test",
                    "lastTransitionTime": "2026-01-01T00:00:00Z",
                }],
            },
        }))
        .await
        .unwrap()
}

/// Resolves every composition to `<composition>-rev<N>`, where N can be bumped
#[derive(Debug)]
pub struct RevisionResolver {
    latest: AtomicUsize,
}

impl RevisionResolver {
    pub fn new() -> Self {
        Self {
            latest: AtomicUsize::new(1),
        }
    }

    /// Make a newer revision the latest one
    pub fn release(&self, revision: usize) {
        self.latest.store(revision, Ordering::SeqCst);
    }
}

impl Default for RevisionResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompositionResolver for RevisionResolver {
    async fn select_composition(&self, _selector: &LabelSelector) -> Result<Option<Reference>> {
        Ok(Some(Reference::new("default")))
    }

    async fn latest_revision(
        &self,
        composition: &Reference,
        _selector: Option<&LabelSelector>,
    ) -> Result<Option<Reference>> {
        let revision = self.latest.load(Ordering::SeqCst);
        Ok(Some(Reference::new(format!("{}-rev{revision}", composition.name))))
    }
}

/// Renders whatever reference list the test last set
#[derive(Debug, Default)]
pub struct StaticRenderer {
    refs: Mutex<Vec<TypedReference>>,
}

impl StaticRenderer {
    pub fn new(refs: Vec<TypedReference>) -> Self {
        Self {
            refs: Mutex::new(refs),
        }
    }

    pub fn set(&self, refs: Vec<TypedReference>) {
        *self.refs.lock().unwrap() = refs;
    }
}

#[async_trait]
impl CompositionRenderer for StaticRenderer {
    async fn render(
        &self,
        _composite: &CompositeResource,
        _revision: &Reference,
    ) -> Result<Vec<TypedReference>> {
        Ok(self.refs.lock().unwrap().clone())
    }
}

/// External system where every resource already exists and is up to date
#[derive(Debug, Default)]
pub struct ExistingExternal {
    pub deletes: AtomicUsize,
}

impl ExistingExternal {
    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExternalClient for ExistingExternal {
    async fn observe(&self, _managed: &mut ManagedResource) -> Result<ExternalObservation> {
        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: true,
            ..ExternalObservation::default()
        })
    }

    async fn create(&self, _managed: &mut ManagedResource) -> Result<ExternalCreation> {
        Ok(ExternalCreation::default())
    }

    async fn update(&self, _managed: &mut ManagedResource) -> Result<ExternalUpdate> {
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, _managed: &ManagedResource) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
