//! # Composite Lifecycle Tests
//!
//! A Composite is Ready exactly when every composed resource it currently
//! references is Ready.

mod common;

use common::{RevisionResolver, StaticRenderer, composed_ref, put_composed, put_composed_with};
use lifecycle_controller::config::ControllerConfig;
use lifecycle_controller::connection::{MemorySecretStore, SecretStore};
use lifecycle_controller::constants::FINALIZER;
use lifecycle_controller::controller::{CompositeReconciler, CompositeState, Reconciler};
use lifecycle_controller::crd::{
    CompositeResource, CompositeResourceSpec, ConditionStatus, REASON_DELETING,
    REASON_RECONCILE_ERROR, Reference, SecretReference, TYPE_READY, TYPE_SYNCED, UpdatePolicy,
};
use lifecycle_controller::resource::{
    ComposedResourcesReferencer, CompositionRevisionReferencer, Conditioned,
    ConnectionDetailsPublishedTimer, Object,
};
use lifecycle_controller::store::{MemoryStore, ObjectKey, ObjectStore};
use serde_json::json;
use std::sync::Arc;

struct Harness {
    store: Arc<MemoryStore>,
    secrets: Arc<MemorySecretStore>,
    resolver: Arc<RevisionResolver>,
    renderer: Arc<StaticRenderer>,
    reconciler: CompositeReconciler<MemoryStore>,
    key: ObjectKey,
}

async fn harness(refs: &[&str]) -> Harness {
    harness_with(refs, CompositeResourceSpec::default()).await
}

async fn harness_with(refs: &[&str], spec: CompositeResourceSpec) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let secrets = Arc::new(MemorySecretStore::new());
    let resolver = Arc::new(RevisionResolver::new());
    let renderer = Arc::new(StaticRenderer::new(
        refs.iter().map(|n| composed_ref(n)).collect(),
    ));
    let reconciler = CompositeReconciler::new(
        Arc::clone(&store),
        Arc::<MemorySecretStore>::clone(&secrets),
        Arc::<RevisionResolver>::clone(&resolver),
        Arc::<StaticRenderer>::clone(&renderer),
        &ControllerConfig::default(),
    );
    let mut xr = CompositeResource::new(
        "platform",
        CompositeResourceSpec {
            composition_ref: Some(Reference::new("standard")),
            ..spec
        },
    );
    store.create(&mut xr).await.unwrap();
    Harness {
        key: xr.key(),
        store,
        secrets,
        resolver,
        renderer,
        reconciler,
    }
}

impl Harness {
    async fn composite(&self) -> CompositeResource {
        self.store.get(&self.key).await.unwrap()
    }

    async fn ready(&self) -> ConditionStatus {
        self.composite().await.get_condition(TYPE_READY).status
    }

    async fn revision(&self) -> Option<String> {
        self.composite()
            .await
            .get_composition_revision_reference()
            .map(|r| r.name.clone())
    }
}

fn secret(name: &str) -> SecretReference {
    SecretReference {
        name: name.to_string(),
        namespace: "infra".to_string(),
    }
}

#[tokio::test]
async fn test_ready_follows_every_composed_resource() {
    let h = harness(&["bucket-a", "bucket-b"]).await;
    put_composed(&h.store, "bucket-a", "True").await;

    // bucket-b does not exist yet
    let outcome = h.reconciler.reconcile(&h.key).await.unwrap();
    assert_eq!(outcome.state, CompositeState::Composing);
    assert_eq!(h.ready().await, ConditionStatus::Unknown);

    put_composed(&h.store, "bucket-b", "False").await;
    h.reconciler.reconcile(&h.key).await.unwrap();
    assert_eq!(h.ready().await, ConditionStatus::False);

    put_composed(&h.store, "bucket-b", "True").await;
    let outcome = h.reconciler.reconcile(&h.key).await.unwrap();
    assert_eq!(outcome.state, CompositeState::Ready);
    assert_eq!(h.ready().await, ConditionStatus::True);
}

#[tokio::test]
async fn test_removing_a_reference_reflects_the_remaining_set() {
    let h = harness(&["bucket-a", "bucket-b"]).await;
    put_composed(&h.store, "bucket-a", "True").await;
    put_composed(&h.store, "bucket-b", "False").await;

    h.reconciler.reconcile(&h.key).await.unwrap();
    assert_eq!(h.ready().await, ConditionStatus::False);

    h.renderer.set(vec![composed_ref("bucket-a")]);
    let outcome = h.reconciler.reconcile(&h.key).await.unwrap();
    assert_eq!(outcome.state, CompositeState::Ready);
    assert_eq!(h.ready().await, ConditionStatus::True);

    assert_eq!(h.composite().await.get_resource_references(), [composed_ref("bucket-a")]);
}

#[tokio::test]
async fn test_settled_composite_makes_no_writes() {
    let h = harness(&["bucket-a"]).await;
    put_composed(&h.store, "bucket-a", "True").await;

    h.reconciler.reconcile(&h.key).await.unwrap();
    let writes = h.store.writes().await;
    h.reconciler.reconcile(&h.key).await.unwrap();
    assert_eq!(h.store.writes().await, writes);
}

#[tokio::test]
async fn test_deletion_removes_unfinalized_composed_resources() {
    let h = harness(&["bucket-a"]).await;
    let composed = put_composed(&h.store, "bucket-a", "True").await;
    h.reconciler.reconcile(&h.key).await.unwrap();

    h.store.delete(&h.key, None).await.unwrap();
    let outcome = h.reconciler.reconcile(&h.key).await.unwrap();

    // The composed resource holds no finalizer, so it is gone at once
    assert_eq!(outcome.state, CompositeState::Gone);
    assert!(!h.store.contains(&composed).await);
    assert!(!h.store.contains(&h.key).await);
}

#[tokio::test]
async fn test_deletion_waits_for_finalized_composed_resources() {
    let h = harness(&["bucket-a"]).await;
    let composed =
        put_composed_with(&h.store, "bucket-a", "True", &["storage.example.org/cleanup"], None)
            .await;
    h.reconciler.reconcile(&h.key).await.unwrap();

    h.store.delete(&h.key, None).await.unwrap();
    for _ in 0..2 {
        let outcome = h.reconciler.reconcile(&h.key).await.unwrap();
        assert_eq!(outcome.state, CompositeState::Deleting);
    }
    let xr = h.composite().await;
    assert!(xr.has_finalizer(FINALIZER));
    assert_eq!(xr.get_condition(TYPE_READY).reason, REASON_DELETING);
    assert!(h.store.contains(&composed).await);

    // The composed resource's own controller lets go of it
    put_composed(&h.store, "bucket-a", "True").await;
    let outcome = h.reconciler.reconcile(&h.key).await.unwrap();
    assert_eq!(outcome.state, CompositeState::Gone);
    assert!(!h.store.contains(&composed).await);
    assert!(!h.store.contains(&h.key).await);
}

#[tokio::test]
async fn test_automatic_policy_follows_latest_revision() {
    let h = harness(&[]).await;
    h.reconciler.reconcile(&h.key).await.unwrap();
    assert_eq!(h.revision().await.as_deref(), Some("standard-rev1"));

    h.resolver.release(2);
    h.reconciler.reconcile(&h.key).await.unwrap();
    assert_eq!(h.revision().await.as_deref(), Some("standard-rev2"));
}

#[tokio::test]
async fn test_manual_policy_keeps_pinned_revision() {
    let spec = CompositeResourceSpec {
        composition_update_policy: UpdatePolicy::Manual,
        ..CompositeResourceSpec::default()
    };
    let h = harness_with(&[], spec).await;

    // Nothing recorded yet, so the latest revision is selected once
    h.reconciler.reconcile(&h.key).await.unwrap();
    assert_eq!(h.revision().await.as_deref(), Some("standard-rev1"));

    h.resolver.release(2);
    let writes = h.store.writes().await;
    h.reconciler.reconcile(&h.key).await.unwrap();
    assert_eq!(h.revision().await.as_deref(), Some("standard-rev1"));
    assert_eq!(h.store.writes().await, writes);
}

#[tokio::test]
async fn test_connection_details_published_only_on_change() {
    let spec = CompositeResourceSpec {
        write_connection_secret_to_ref: Some(secret("platform-conn")),
        ..CompositeResourceSpec::default()
    };
    let h = harness_with(&["bucket-a"], spec).await;
    let bucket_secret = secret("bucket-a-conn");
    put_composed_with(&h.store, "bucket-a", "True", &[], Some(&bucket_secret)).await;
    h.secrets
        .publish(&bucket_secret, &[("endpoint".to_string(), b"a:443".to_vec())].into())
        .await
        .unwrap();
    let seeded = h.secrets.publishes().await;

    h.reconciler.reconcile(&h.key).await.unwrap();
    assert_eq!(h.secrets.publishes().await, seeded + 1);
    let first = h.composite().await;
    let published_at = first
        .get_connection_details_last_published_time()
        .map(str::to_string);
    assert!(published_at.is_some());

    h.reconciler.reconcile(&h.key).await.unwrap();
    assert_eq!(h.secrets.publishes().await, seeded + 1, "same payload is not republished");
    let settled = h.composite().await;
    assert_eq!(
        settled.get_connection_details_last_published_time(),
        published_at.as_deref()
    );

    h.secrets
        .publish(&bucket_secret, &[("endpoint".to_string(), b"b:443".to_vec())].into())
        .await
        .unwrap();
    h.reconciler.reconcile(&h.key).await.unwrap();
    assert_eq!(h.secrets.publishes().await, seeded + 3);
    let fetched = h.secrets.fetch(&secret("platform-conn")).await.unwrap();
    assert_eq!(fetched.get("endpoint").map(Vec::as_slice), Some(b"b:443".as_slice()));
    let digest = |xr: &CompositeResource| {
        xr.status
            .as_ref()
            .and_then(|s| s.connection_details_digest.clone())
    };
    assert_ne!(digest(&h.composite().await), digest(&settled));
}

#[tokio::test]
async fn test_unreadable_composed_resource_is_recorded() {
    let h = harness(&["bucket-a"]).await;
    h.store
        .put_raw(json!({
            "apiVersion": common::COMPOSED_API_VERSION,
            "kind": common::COMPOSED_KIND,
            "metadata": { "name": "bucket-a" },
            "status": { "conditions": "not-a-list" },
        }))
        .await
        .unwrap();

    let outcome = h.reconciler.reconcile(&h.key).await.unwrap();
    assert_eq!(outcome.state, CompositeState::Composing);
    let synced = h.composite().await.get_condition(TYPE_SYNCED);
    assert_eq!(synced.status, ConditionStatus::False);
    assert_eq!(synced.reason, REASON_RECONCILE_ERROR);
}
