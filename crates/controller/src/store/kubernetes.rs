//! # Kubernetes Store
//!
//! [`ObjectStore`] backed by the Kubernetes API.
//!
//! Every kind is accessed through `Api<DynamicObject>` so the same code path
//! serves the controller's own CRDs and arbitrary composed kinds. Writes use
//! `replace` / `replace_status`, which the API server rejects with 409 when the
//! carried resource version is stale.

use crate::crd::LabelSelector;
use crate::error::{Error, Result};
use crate::resource::Object;
use crate::store::{ObjectKey, ObjectStore};
use async_trait::async_trait;
use kube::api::{
    Api, ApiResource, DeleteParams, DynamicObject, ListParams, PostParams, Preconditions,
};
use kube::core::GroupVersionKind;
use kube::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, key: &ObjectKey) -> Api<DynamicObject> {
        let (group, version) = key.group_version();
        let gvk = GroupVersionKind::gvk(group, version, &key.kind);
        let resource = ApiResource::from_gvk(&gvk);
        match &key.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }
}

/// Map API status codes onto the store's error taxonomy
fn classify(err: kube::Error, key: &ObjectKey) -> Error {
    match &err {
        kube::Error::Api(api_err) if api_err.code == 404 => Error::NotFound { key: key.clone() },
        kube::Error::Api(api_err) if api_err.code == 409 && api_err.reason == "AlreadyExists" => {
            Error::AlreadyExists { key: key.clone() }
        }
        kube::Error::Api(api_err) if api_err.code == 409 => Error::Conflict { key: key.clone() },
        _ => Error::Kube(err),
    }
}

fn to_dynamic<K: Object>(obj: &K) -> Result<DynamicObject> {
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}

fn refresh_version<K: Object>(obj: &mut K, written: &DynamicObject, with_generation: bool) {
    let meta = obj.meta_mut();
    meta.resource_version = written.metadata.resource_version.clone();
    if with_generation {
        meta.generation = written.metadata.generation;
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K>(&self, key: &ObjectKey) -> Result<K>
    where
        K: DeserializeOwned + Send + 'static,
    {
        let obj = self
            .api(key)
            .get(&key.name)
            .await
            .map_err(|e| classify(e, key))?;
        Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
    }

    async fn list<K: Object>(&self, selector: &LabelSelector) -> Result<Vec<K>> {
        let key = ObjectKey::of::<K>(None, "");
        let query = selector.to_query();
        let params = if query.is_empty() {
            ListParams::default()
        } else {
            ListParams::default().labels(&query)
        };
        let list = self
            .api(&key)
            .list(&params)
            .await
            .map_err(|e| classify(e, &key))?;
        list.items
            .into_iter()
            .map(|item| Ok(serde_json::from_value(serde_json::to_value(item)?)?))
            .collect()
    }

    async fn create<K: Object>(&self, obj: &mut K) -> Result<()> {
        let key = obj.key();
        let created = self
            .api(&key)
            .create(&PostParams::default(), &to_dynamic(obj)?)
            .await
            .map_err(|e| classify(e, &key))?;
        debug!(object = %key, "created");
        *obj = serde_json::from_value(serde_json::to_value(created)?)?;
        Ok(())
    }

    async fn update<K: Object>(&self, obj: &mut K) -> Result<()> {
        let key = obj.key();
        let written = self
            .api(&key)
            .replace(&key.name, &PostParams::default(), &to_dynamic(obj)?)
            .await
            .map_err(|e| classify(e, &key))?;
        refresh_version(obj, &written, true);
        Ok(())
    }

    async fn update_status<K: Object>(&self, obj: &mut K) -> Result<()> {
        let key = obj.key();
        let body = serde_json::to_vec(&*obj)?;
        let written = self
            .api(&key)
            .replace_status(&key.name, &PostParams::default(), body)
            .await
            .map_err(|e| classify(e, &key))?;
        refresh_version(obj, &written, false);
        Ok(())
    }

    async fn delete(&self, key: &ObjectKey, expected_version: Option<&str>) -> Result<()> {
        let params = DeleteParams {
            preconditions: expected_version.map(|rv| Preconditions {
                resource_version: Some(rv.to_string()),
                uid: None,
            }),
            ..DeleteParams::default()
        };
        self.api(key)
            .delete(&key.name, &params)
            .await
            .map_err(|e| classify(e, key))?;
        debug!(object = %key, "deletion requested");
        Ok(())
    }
}
