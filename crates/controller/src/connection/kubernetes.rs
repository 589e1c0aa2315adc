//! # Kubernetes Secret Store
//!
//! Publishes connection details as core/v1 Secrets using server-side apply.

use crate::connection::{ConnectionDetails, SecretStore};
use crate::constants::FIELD_MANAGER;
use crate::crd::SecretReference;
use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use kube::Client;
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use std::collections::BTreeMap;
use tracing::debug;

/// Secret type stamped on every connection secret
const CONNECTION_SECRET_TYPE: &str = "connection.lifecycle.octopilot.io/v1";

#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn publish(&self, dest: &SecretReference, details: &ConnectionDetails) -> Result<()> {
        let data: BTreeMap<String, ByteString> = details
            .iter()
            .map(|(k, v)| (k.clone(), ByteString(v.clone())))
            .collect();
        let patch = serde_json::json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {
                "name": dest.name,
                "namespace": dest.namespace,
            },
            "type": CONNECTION_SECRET_TYPE,
            "data": data,
        });

        let patch_params = PatchParams::apply(FIELD_MANAGER).force();
        self.api(&dest.namespace)
            .patch(&dest.name, &patch_params, &Patch::Apply(patch))
            .await?;

        debug!(secret = %dest, keys = details.len(), "published connection details");
        Ok(())
    }

    async fn unpublish(&self, dest: &SecretReference) -> Result<()> {
        match self
            .api(&dest.namespace)
            .delete(&dest.name, &DeleteParams::default())
            .await
        {
            Ok(_) => {
                debug!(secret = %dest, "removed connection secret");
                Ok(())
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch(&self, src: &SecretReference) -> Result<ConnectionDetails> {
        let secret = self.api(&src.namespace).get_opt(&src.name).await?;
        Ok(secret
            .and_then(|s| s.data)
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, v.0))
            .collect())
    }
}
