//! # In-Memory Store
//!
//! Process-local [`ObjectStore`] used by tests and local tooling.
//!
//! Objects are held as JSON so any kind (including views over composed
//! resources) can be stored and read back. Write semantics follow the
//! Kubernetes API server:
//! - every write must carry the current resource version
//! - spec changes bump `metadata.generation`
//! - deleting an object with finalizers only sets `metadata.deletionTimestamp`
//! - removing the last finalizer of a terminating object purges it

use crate::crd::{LabelSelector, now};
use crate::error::{Error, Result};
use crate::resource::Object;
use crate::store::{ObjectKey, ObjectStore};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct State {
    objects: HashMap<ObjectKey, Value>,
    resource_version: u64,
    writes: u64,
}

impl State {
    fn next_version(&mut self) -> String {
        self.resource_version += 1;
        self.writes += 1;
        self.resource_version.to_string()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes so far
    pub async fn writes(&self) -> u64 {
        self.state.lock().await.writes
    }

    pub async fn contains(&self, key: &ObjectKey) -> bool {
        self.state.lock().await.objects.contains_key(key)
    }

    /// Insert or replace an arbitrary object without version checks
    ///
    /// Used to seed kinds that have no Rust type, such as composed resources.
    pub async fn put_raw(&self, mut value: Value) -> Result<ObjectKey> {
        let key = key_of(&value);
        let mut state = self.state.lock().await;
        let version = state.next_version();
        set_meta(&mut value, "resourceVersion", json!(version));
        if value["metadata"]["uid"].is_null() {
            set_meta(&mut value, "uid", json!(uuid::Uuid::new_v4().to_string()));
        }
        if value["metadata"]["generation"].is_null() {
            set_meta(&mut value, "generation", json!(1));
        }
        state.objects.insert(key.clone(), value);
        Ok(key)
    }
}

fn key_of(value: &Value) -> ObjectKey {
    let field = |v: &Value| v.as_str().unwrap_or_default().to_string();
    ObjectKey {
        api_version: field(&value["apiVersion"]),
        kind: field(&value["kind"]),
        namespace: value["metadata"]["namespace"].as_str().map(str::to_string),
        name: field(&value["metadata"]["name"]),
    }
}

fn set_meta(value: &mut Value, field: &str, v: Value) {
    value["metadata"][field] = v;
}

fn remove_meta(value: &mut Value, field: &str) {
    if let Some(meta) = value["metadata"].as_object_mut() {
        meta.remove(field);
    }
}

fn resource_version(value: &Value) -> Option<&str> {
    value["metadata"]["resourceVersion"].as_str()
}

fn has_finalizers(value: &Value) -> bool {
    value["metadata"]["finalizers"]
        .as_array()
        .is_some_and(|f| !f.is_empty())
}

fn is_terminating(value: &Value) -> bool {
    !value["metadata"]["deletionTimestamp"].is_null()
}

fn labels(value: &Value) -> Option<BTreeMap<String, String>> {
    serde_json::from_value(value["metadata"]["labels"].clone()).ok()
}

fn check_version(key: &ObjectKey, stored: &Value, given: Option<&str>) -> Result<()> {
    if given.is_some() && given == resource_version(stored) {
        Ok(())
    } else {
        Err(Error::Conflict { key: key.clone() })
    }
}

fn set_version<K: Object>(obj: &mut K, version: String, generation: Option<i64>) {
    let meta = obj.meta_mut();
    meta.resource_version = Some(version);
    if generation.is_some() {
        meta.generation = generation;
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get<K>(&self, key: &ObjectKey) -> Result<K>
    where
        K: DeserializeOwned + Send + 'static,
    {
        let value = {
            let state = self.state.lock().await;
            state
                .objects
                .get(key)
                .cloned()
                .ok_or_else(|| Error::NotFound { key: key.clone() })?
        };
        Ok(serde_json::from_value(value)?)
    }

    async fn list<K: Object>(&self, selector: &LabelSelector) -> Result<Vec<K>> {
        let api_version = K::api_version(&());
        let kind = K::kind(&());
        let matching: Vec<Value> = {
            let state = self.state.lock().await;
            state
                .objects
                .iter()
                .filter(|(k, _)| k.api_version == api_version && k.kind == kind)
                .filter(|(_, v)| selector.matches(labels(v).as_ref()))
                .map(|(_, v)| v.clone())
                .collect()
        };
        matching
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(Error::from))
            .collect()
    }

    async fn create<K: Object>(&self, obj: &mut K) -> Result<()> {
        let key = obj.key();
        let mut value = serde_json::to_value(&*obj)?;
        let mut state = self.state.lock().await;
        if state.objects.contains_key(&key) {
            return Err(Error::AlreadyExists { key });
        }
        let version = state.next_version();
        set_meta(&mut value, "resourceVersion", json!(version));
        set_meta(&mut value, "uid", json!(uuid::Uuid::new_v4().to_string()));
        set_meta(&mut value, "generation", json!(1));
        set_meta(&mut value, "creationTimestamp", json!(now()));
        remove_meta(&mut value, "deletionTimestamp");
        *obj = serde_json::from_value(value.clone())?;
        debug!(object = %key, resource_version = %version, "created");
        state.objects.insert(key, value);
        Ok(())
    }

    async fn update<K: Object>(&self, obj: &mut K) -> Result<()> {
        let key = obj.key();
        let mut value = serde_json::to_value(&*obj)?;
        let mut state = self.state.lock().await;
        let stored = state
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::NotFound { key: key.clone() })?;
        check_version(&key, &stored, obj.resource_version())?;

        let mut generation = stored["metadata"]["generation"].as_i64().unwrap_or(1);
        if value["spec"] != stored["spec"] {
            generation += 1;
        }
        let version = state.next_version();
        match stored.get("status") {
            Some(status) => value["status"] = status.clone(),
            None => {
                if let Some(map) = value.as_object_mut() {
                    map.remove("status");
                }
            }
        }
        set_meta(&mut value, "resourceVersion", json!(version));
        set_meta(&mut value, "generation", json!(generation));
        for preserved in ["uid", "creationTimestamp", "deletionTimestamp"] {
            match &stored["metadata"][preserved] {
                Value::Null => remove_meta(&mut value, preserved),
                v => set_meta(&mut value, preserved, v.clone()),
            }
        }

        if is_terminating(&value) && !has_finalizers(&value) {
            debug!(object = %key, "last finalizer removed, purging");
            state.objects.remove(&key);
        } else {
            state.objects.insert(key, value);
        }
        set_version(obj, version, Some(generation));
        Ok(())
    }

    async fn update_status<K: Object>(&self, obj: &mut K) -> Result<()> {
        let key = obj.key();
        let value = serde_json::to_value(&*obj)?;
        let mut state = self.state.lock().await;
        let mut stored = state
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::NotFound { key: key.clone() })?;
        check_version(&key, &stored, obj.resource_version())?;

        let version = state.next_version();
        stored["status"] = value.get("status").cloned().unwrap_or(Value::Null);
        set_meta(&mut stored, "resourceVersion", json!(version));
        state.objects.insert(key, stored);
        set_version(obj, version, None);
        Ok(())
    }

    async fn delete(&self, key: &ObjectKey, expected_version: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut stored = state
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound { key: key.clone() })?;
        if expected_version.is_some() {
            check_version(key, &stored, expected_version)?;
        }

        if !has_finalizers(&stored) {
            debug!(object = %key, "deleted");
            state.objects.remove(key);
            state.writes += 1;
            return Ok(());
        }
        if is_terminating(&stored) {
            return Ok(());
        }
        let version = state.next_version();
        set_meta(&mut stored, "deletionTimestamp", json!(now()));
        set_meta(&mut stored, "resourceVersion", json!(version));
        debug!(object = %key, "marked for deletion, waiting on finalizers");
        state.objects.insert(key.clone(), stored);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ProviderConfig, ProviderConfigSpec, SecretReference};

    fn pc(name: &str) -> ProviderConfig {
        ProviderConfig::new(name, ProviderConfigSpec::default())
    }

    #[tokio::test]
    async fn test_create_assigns_identity() {
        let store = MemoryStore::new();
        let mut obj = pc("pc1");
        store.create(&mut obj).await.unwrap();
        assert!(obj.metadata.uid.is_some());
        assert_eq!(obj.metadata.generation, Some(1));
        assert!(obj.resource_version().is_some());

        let again = store.create(&mut pc("pc1")).await;
        assert!(matches!(again, Err(Error::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = MemoryStore::new();
        let mut obj = pc("pc1");
        store.create(&mut obj).await.unwrap();
        let mut stale = obj.clone();

        obj.metadata.labels = Some([("a".to_string(), "b".to_string())].into());
        store.update(&mut obj).await.unwrap();

        stale.metadata.labels = Some([("a".to_string(), "c".to_string())].into());
        let result = store.update(&mut stale).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_spec_change_bumps_generation() {
        let store = MemoryStore::new();
        let mut obj = pc("pc1");
        store.create(&mut obj).await.unwrap();

        obj.metadata.labels = Some([("a".to_string(), "b".to_string())].into());
        store.update(&mut obj).await.unwrap();
        assert_eq!(obj.metadata.generation, Some(1));

        obj.spec.credentials_secret_ref = Some(SecretReference {
            name: "creds".to_string(),
            namespace: "infra".to_string(),
        });
        store.update(&mut obj).await.unwrap();
        assert_eq!(obj.metadata.generation, Some(2));
    }

    #[tokio::test]
    async fn test_update_does_not_write_status() {
        let store = MemoryStore::new();
        let mut obj = pc("pc1");
        store.create(&mut obj).await.unwrap();
        obj.status = Some(Default::default());
        obj.status.as_mut().unwrap().users = 4;
        store.update(&mut obj).await.unwrap();

        let stored: ProviderConfig = store.get(&obj.key()).await.unwrap();
        assert!(stored.status.is_none());

        store.update_status(&mut obj).await.unwrap();
        let stored: ProviderConfig = store.get(&obj.key()).await.unwrap();
        assert_eq!(stored.status.map(|s| s.users), Some(4));
    }

    #[tokio::test]
    async fn test_delete_waits_for_finalizers() {
        let store = MemoryStore::new();
        let mut obj = pc("pc1");
        obj.metadata.finalizers = Some(vec!["example.org/hold".to_string()]);
        store.create(&mut obj).await.unwrap();

        store.delete(&obj.key(), None).await.unwrap();
        let mut terminating: ProviderConfig = store.get(&obj.key()).await.unwrap();
        assert!(terminating.is_being_deleted());

        terminating.metadata.finalizers = Some(Vec::new());
        store.update(&mut terminating).await.unwrap();
        assert!(!store.contains(&obj.key()).await);
    }

    #[tokio::test]
    async fn test_delete_with_stale_version_conflicts() {
        let store = MemoryStore::new();
        let mut obj = pc("pc1");
        store.create(&mut obj).await.unwrap();
        let result = store.delete(&obj.key(), Some("0")).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));
        assert!(store.contains(&obj.key()).await);
    }

    #[tokio::test]
    async fn test_list_filters_kind_and_labels() {
        let store = MemoryStore::new();
        let mut a = pc("a");
        a.metadata.labels = Some([("team".to_string(), "x".to_string())].into());
        store.create(&mut a).await.unwrap();
        store.create(&mut pc("b")).await.unwrap();
        store
            .put_raw(json!({
                "apiVersion": "example.org/v1",
                "kind": "Other",
                "metadata": {"name": "a", "labels": {"team": "x"}}
            }))
            .await
            .unwrap();

        let selected: Vec<ProviderConfig> = store
            .list(&LabelSelector::from_labels([("team", "x")]))
            .await
            .unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name(), "a");

        let all: Vec<ProviderConfig> = store.list(&LabelSelector::default()).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
