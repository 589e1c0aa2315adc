//! # Managed Lifecycle Tests
//!
//! Deletion of Managed resources honours their management policies.

mod common;

use common::{ExistingExternal, create_provider_config, provider_config};
use lifecycle_controller::config::ControllerConfig;
use lifecycle_controller::connection::MemorySecretStore;
use lifecycle_controller::controller::{
    ManagedReconciler, ManagedState, ProviderConfigUsageTracker, Reconciler, usage_name,
};
use lifecycle_controller::crd::{
    DeletionPolicy, ManagedResource, ManagedResourceSpec, ManagementAction, ManagementPolicies,
    ProviderConfigUsage,
};
use lifecycle_controller::resource::Object;
use lifecycle_controller::store::{MemoryStore, ObjectKey, ObjectStore};
use std::sync::Arc;

struct Harness {
    store: Arc<MemoryStore>,
    external: Arc<ExistingExternal>,
    reconciler: ManagedReconciler<MemoryStore>,
}

async fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    create_provider_config(&store, "pc1").await;
    let external = Arc::new(ExistingExternal::default());
    let reconciler = ManagedReconciler::new(
        Arc::clone(&store),
        Arc::new(MemorySecretStore::new()),
        Arc::<ExistingExternal>::clone(&external),
        &ControllerConfig::default(),
    );
    Harness {
        store,
        external,
        reconciler,
    }
}

async fn create(store: &MemoryStore, actions: Vec<ManagementAction>) -> ManagedResource {
    let mut spec = ManagedResourceSpec::new("pc1");
    spec.management_policies = ManagementPolicies::new(actions);
    spec.deletion_policy = DeletionPolicy::Delete;
    let mut mr = ManagedResource::new("managed1", spec);
    store.create(&mut mr).await.unwrap();
    mr
}

#[tokio::test]
async fn test_observe_only_deletion_skips_external_delete() {
    let h = harness().await;
    let mr = create(&h.store, vec![ManagementAction::Observe]).await;
    let key = mr.key();
    let usage_key = ObjectKey::of::<ProviderConfigUsage>(None, &usage_name(&mr));

    assert_eq!(
        h.reconciler.reconcile(&key).await.unwrap().state,
        ManagedState::Observing
    );
    assert!(h.store.contains(&usage_key).await);

    h.store.delete(&key, None).await.unwrap();
    let outcome = h.reconciler.reconcile(&key).await.unwrap();

    assert_eq!(outcome.state, ManagedState::Gone);
    assert_eq!(h.external.delete_calls(), 0);
    assert!(!h.store.contains(&usage_key).await);
    assert!(!h.store.contains(&key).await);

    let tracker = ProviderConfigUsageTracker::new(Arc::clone(&h.store));
    let mut pc = provider_config(&h.store, "pc1").await;
    assert_eq!(tracker.refresh_user_count(&mut pc).await.unwrap(), 0);
}

#[tokio::test]
async fn test_full_policies_delete_the_external_resource() {
    let h = harness().await;
    let mr = create(&h.store, vec![ManagementAction::All]).await;
    let key = mr.key();

    h.reconciler.reconcile(&key).await.unwrap();
    h.store.delete(&key, None).await.unwrap();
    let outcome = h.reconciler.reconcile(&key).await.unwrap();

    assert_eq!(outcome.state, ManagedState::Gone);
    assert_eq!(h.external.delete_calls(), 1);
    assert!(!h.store.contains(&key).await);
}
