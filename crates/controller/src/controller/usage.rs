//! # ProviderConfig Usage Ledger
//!
//! Records which Managed resources use which ProviderConfig.
//!
//! Each use is a ProviderConfigUsage named deterministically from the Managed
//! resource, so concurrent calls for the same resource converge on a single
//! record. A ProviderConfig's `status.users` is never incremented in place: it
//! is always recomputed from a labelled list of its usages.

use crate::constants::LABEL_PROVIDER_CONFIG;
use crate::crd::{LabelSelector, ProviderConfig, ProviderConfigUsage, ProviderConfigUsageSpec};
use crate::error::{Error, Result, ignore_not_found};
use crate::observability;
use crate::resource::{
    Managed, Object, RequiredProviderConfigReferencer, RequiredTypedResourceReferencer,
    UserCounter,
};
use crate::store::{ObjectKey, ObjectStore};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the usage record for a Managed resource
///
/// Derived from the resource's uid when it has one, so a deleted and
/// recreated resource gets a fresh record.
pub fn usage_name<M: Object>(managed: &M) -> String {
    let kind = M::kind(&()).to_ascii_lowercase();
    match managed.meta().uid.as_deref() {
        Some(uid) => format!("{kind}-{uid}"),
        None => format!("{kind}-{}", managed.name()),
    }
}

#[derive(Debug)]
pub struct ProviderConfigUsageTracker<S> {
    store: Arc<S>,
}

impl<S> Clone for ProviderConfigUsageTracker<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ObjectStore> ProviderConfigUsageTracker<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Ensure a usage record exists for the Managed resource
    ///
    /// Fails with `ReferenceUnresolvable` when the referenced ProviderConfig
    /// does not exist.
    pub async fn record_usage<M: Managed>(&self, managed: &M) -> Result<()> {
        let pc_name = managed.get_provider_config_reference().name.clone();
        let pc_key = ObjectKey::of::<ProviderConfig>(None, &pc_name);
        match self.store.get::<ProviderConfig>(&pc_key).await {
            Ok(_) => {}
            Err(Error::NotFound { .. }) => {
                return Err(Error::ReferenceUnresolvable {
                    reference: format!("ProviderConfig {pc_name}"),
                    reason: "not found".to_string(),
                });
            }
            Err(e) => return Err(e),
        }

        let mut usage = ProviderConfigUsage::new(
            &usage_name(managed),
            ProviderConfigUsageSpec {
                provider_config_ref: managed.get_provider_config_reference().clone(),
                resource_ref: managed.typed_reference(),
            },
        );
        usage.metadata.labels = Some([(LABEL_PROVIDER_CONFIG.to_string(), pc_name.clone())].into());
        if let Some(uid) = managed.meta().uid.clone() {
            usage.metadata.owner_references = Some(vec![OwnerReference {
                api_version: M::api_version(&()).into_owned(),
                kind: M::kind(&()).into_owned(),
                name: managed.name().to_string(),
                uid,
                ..OwnerReference::default()
            }]);
        }

        match self.store.create(&mut usage).await {
            Ok(()) => {
                debug!(usage = %usage.name(), provider_config = %pc_name, "recorded usage");
                Ok(())
            }
            Err(Error::AlreadyExists { key }) => self.converge(&key, &usage).await,
            Err(e) => Err(e),
        }
    }

    /// Point an existing record at the desired ProviderConfig
    async fn converge(&self, key: &ObjectKey, desired: &ProviderConfigUsage) -> Result<()> {
        let mut existing: ProviderConfigUsage = self.store.get(key).await?;
        let desired_pc = desired.get_provider_config_reference();
        let labelled = existing
            .metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(LABEL_PROVIDER_CONFIG))
            .is_some_and(|v| *v == desired_pc.name);

        if existing.get_provider_config_reference() == desired_pc
            && existing.get_resource_reference() == desired.get_resource_reference()
            && labelled
        {
            return Ok(());
        }

        info!(
            usage = %existing.name(),
            provider_config = %desired_pc.name,
            "usage points at a different ProviderConfig, updating"
        );
        existing.set_provider_config_reference(desired_pc.clone());
        existing.set_resource_reference(desired.get_resource_reference().clone());
        existing
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert(LABEL_PROVIDER_CONFIG.to_string(), desired_pc.name.clone());
        self.store.update(&mut existing).await
    }

    /// Delete the usage record of the Managed resource; a missing record is fine
    pub async fn remove_usage<M: Managed>(&self, managed: &M) -> Result<()> {
        let key = ObjectKey::of::<ProviderConfigUsage>(None, &usage_name(managed));
        ignore_not_found(self.store.delete(&key, None).await)?;
        debug!(usage = %key.name, "removed usage");
        Ok(())
    }

    /// Recompute `status.users` from the usage records and persist it if it changed
    pub async fn refresh_user_count(&self, pc: &mut ProviderConfig) -> Result<i64> {
        let name = pc.name().to_string();
        let selector = LabelSelector::from_labels([(LABEL_PROVIDER_CONFIG, name.as_str())]);
        let usages: Vec<ProviderConfigUsage> = self.store.list(&selector).await?;
        let users = usages
            .iter()
            .filter(|u| u.get_provider_config_reference().name == name)
            .count();
        let users = i64::try_from(users).unwrap_or(i64::MAX);

        if pc.get_users() != users {
            debug!(provider_config = %name, from = pc.get_users(), to = users, "user count changed");
            pc.set_users(users);
            self.store.update_status(pc).await?;
        }
        observability::set_provider_config_users(&name, users);
        Ok(users)
    }

    /// Delete a ProviderConfig, refusing while any Managed resource still uses it
    pub async fn delete_provider_config(&self, name: &str) -> Result<()> {
        let key = ObjectKey::of::<ProviderConfig>(None, name);
        let mut pc: ProviderConfig = self.store.get(&key).await?;
        let users = self.refresh_user_count(&mut pc).await?;
        if users > 0 {
            return Err(Error::InUse {
                name: name.to_string(),
                users,
            });
        }
        self.store.delete(&key, pc.resource_version()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ManagedResource, ManagedResourceSpec, ProviderConfigSpec, Reference};
    use crate::store::MemoryStore;

    async fn setup() -> (Arc<MemoryStore>, ProviderConfigUsageTracker<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let mut pc = ProviderConfig::new("pc1", ProviderConfigSpec::default());
        store.create(&mut pc).await.unwrap();
        let tracker = ProviderConfigUsageTracker::new(Arc::clone(&store));
        (store, tracker)
    }

    async fn managed(store: &MemoryStore, name: &str, pc: &str) -> ManagedResource {
        let mut mr = ManagedResource::new(name, ManagedResourceSpec::new(pc));
        store.create(&mut mr).await.unwrap();
        mr
    }

    async fn provider_config(store: &MemoryStore) -> ProviderConfig {
        store
            .get(&ObjectKey::of::<ProviderConfig>(None, "pc1"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_usage_is_idempotent() {
        let (store, tracker) = setup().await;
        let mr = managed(&store, "m1", "pc1").await;

        tracker.record_usage(&mr).await.unwrap();
        tracker.record_usage(&mr).await.unwrap();

        let mut pc = provider_config(&store).await;
        assert_eq!(tracker.refresh_user_count(&mut pc).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_record_usage_for_missing_provider_config() {
        let (store, tracker) = setup().await;
        let mr = managed(&store, "m1", "missing").await;
        let result = tracker.record_usage(&mr).await;
        assert!(matches!(result, Err(Error::ReferenceUnresolvable { .. })));
    }

    #[tokio::test]
    async fn test_record_usage_repoints_existing_record() {
        let (store, tracker) = setup().await;
        let mut pc2 = ProviderConfig::new("pc2", ProviderConfigSpec::default());
        store.create(&mut pc2).await.unwrap();
        let mut mr = managed(&store, "m1", "pc1").await;
        tracker.record_usage(&mr).await.unwrap();

        mr.set_provider_config_reference(Reference::new("pc2"));
        tracker.record_usage(&mr).await.unwrap();

        let mut pc1 = provider_config(&store).await;
        assert_eq!(tracker.refresh_user_count(&mut pc1).await.unwrap(), 0);
        assert_eq!(tracker.refresh_user_count(&mut pc2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_refresh_writes_only_on_change() {
        let (store, tracker) = setup().await;
        let mr = managed(&store, "m1", "pc1").await;
        tracker.record_usage(&mr).await.unwrap();

        let mut pc = provider_config(&store).await;
        tracker.refresh_user_count(&mut pc).await.unwrap();
        let writes = store.writes().await;
        tracker.refresh_user_count(&mut pc).await.unwrap();
        assert_eq!(store.writes().await, writes);
        assert_eq!(provider_config(&store).await.get_users(), 1);
    }

    #[tokio::test]
    async fn test_delete_provider_config_in_use() {
        let (store, tracker) = setup().await;
        let m1 = managed(&store, "m1", "pc1").await;
        let m2 = managed(&store, "m2", "pc1").await;
        tracker.record_usage(&m1).await.unwrap();
        tracker.record_usage(&m2).await.unwrap();

        let result = tracker.delete_provider_config("pc1").await;
        assert!(matches!(result, Err(Error::InUse { users: 2, .. })));

        tracker.remove_usage(&m1).await.unwrap();
        tracker.remove_usage(&m2).await.unwrap();
        tracker.remove_usage(&m2).await.unwrap();
        tracker.delete_provider_config("pc1").await.unwrap();
        assert!(
            !store
                .contains(&ObjectKey::of::<ProviderConfig>(None, "pc1"))
                .await
        );
    }
}
