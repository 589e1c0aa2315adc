//! # In-Memory Secret Store

use crate::connection::{ConnectionDetails, SecretStore};
use crate::crd::SecretReference;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<SecretReference, ConnectionDetails>>,
    publishes: Mutex<u64>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of publish calls so far
    pub async fn publishes(&self) -> u64 {
        *self.publishes.lock().await
    }

    pub async fn contains(&self, dest: &SecretReference) -> bool {
        self.secrets.lock().await.contains_key(dest)
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn publish(&self, dest: &SecretReference, details: &ConnectionDetails) -> Result<()> {
        self.secrets
            .lock()
            .await
            .insert(dest.clone(), details.clone());
        *self.publishes.lock().await += 1;
        Ok(())
    }

    async fn unpublish(&self, dest: &SecretReference) -> Result<()> {
        self.secrets.lock().await.remove(dest);
        Ok(())
    }

    async fn fetch(&self, src: &SecretReference) -> Result<ConnectionDetails> {
        Ok(self
            .secrets
            .lock()
            .await
            .get(src)
            .cloned()
            .unwrap_or_default())
    }
}
