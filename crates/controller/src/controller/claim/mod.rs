//! # Claim Lifecycle
//!
//! Binds a CompositeResourceClaim to a CompositeResource, keeps their
//! composition fields in sync and surfaces the Composite's readiness and
//! connection details in the claim's namespace.
//!
//! Revision references flow in one direction per pass so the two objects
//! never overwrite each other: a claim pinned with `Manual` drives the
//! Composite, otherwise the Composite's resolved revision flows back.

use crate::config::ControllerConfig;
use crate::connection::{self, SecretStore};
use crate::constants::{ANNOTATION_PAUSED, FINALIZER, LABEL_CLAIM_NAME, LABEL_CLAIM_NAMESPACE};
use crate::controller::types::{PassOutcome, Reconciler, write_status_if_changed};
use crate::crd::{
    CompositeDeletePolicy, CompositeResource, CompositeResourceClaim, CompositeResourceSpec,
    Condition, ConditionStatus, REASON_CREATING, SecretReference, TYPE_READY, TypedReference,
    UpdatePolicy, now,
};
use crate::error::{Error, Result, ignore_not_found};
use crate::observability;
use crate::resource::{
    APIFinalizer, ClaimReferencer, CompositeResourceDeleter, CompositeResourceReferencer,
    CompositionReferencer, CompositionRevisionReferencer, CompositionRevisionSelector,
    CompositionSelector, CompositionUpdater, Conditioned, ConnectionDetailsPublishedTimer,
    ConnectionSecretWriterTo, LocalConnectionSecretWriterTo, Object, ReconciliationObserver,
};
use crate::store::{ObjectKey, ObjectStore};
use async_trait::async_trait;
use kube::Resource;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle state a Claim pass leaves behind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    /// No usable Composite could be read or created
    Unbound,
    /// Bound to a Composite that is not ready yet
    Bound,
    Ready,
    /// The referenced Composite belongs to another claim
    Rejected,
    Deleting,
    Gone,
    Paused,
}

/// Composite name for a claim that has none yet
fn generate_composite_name(claim: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{claim}-{}", &suffix[..5])
}

fn claim_namespace(claim: &CompositeResourceClaim) -> &str {
    claim.metadata.namespace.as_deref().unwrap_or("default")
}

pub struct ClaimReconciler<S> {
    store: Arc<S>,
    secrets: Arc<dyn SecretStore>,
    finalizer: APIFinalizer<S>,
    connection_secret_namespace: String,
    poll_interval: Duration,
    short_wait: Duration,
}

impl<S> std::fmt::Debug for ClaimReconciler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimReconciler")
            .field("connection_secret_namespace", &self.connection_secret_namespace)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl<S: ObjectStore> ClaimReconciler<S> {
    pub fn new(store: Arc<S>, secrets: Arc<dyn SecretStore>, config: &ControllerConfig) -> Self {
        Self {
            finalizer: APIFinalizer::new(Arc::clone(&store), FINALIZER),
            store,
            secrets,
            connection_secret_namespace: config.connection_secret_namespace.clone(),
            poll_interval: config.poll_interval(),
            short_wait: config.short_wait(),
        }
    }

    async fn reconcile_claim(&self, key: &ObjectKey) -> Result<PassOutcome<ClaimState>> {
        let mut claim: CompositeResourceClaim = match self.store.get(key).await {
            Ok(claim) => claim,
            Err(Error::NotFound { .. }) => return Ok(PassOutcome::await_change(ClaimState::Gone)),
            Err(e) => return Err(e),
        };
        let before = claim.clone();

        let paused = claim
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(ANNOTATION_PAUSED))
            .is_some_and(|v| v == "true");
        if paused {
            claim.set_conditions([Condition::reconcile_paused()]);
            write_status_if_changed(self.store.as_ref(), &mut claim, &before).await?;
            return Ok(PassOutcome::await_change(ClaimState::Paused));
        }

        if claim.is_being_deleted() {
            return self.finalize(claim, &before).await;
        }

        self.finalizer.add_finalizer(&mut claim).await?;

        let mut xr = match self.bind(&mut claim).await {
            Ok(xr) => xr,
            Err(e @ Error::PolicyViolation(_)) => {
                warn!(claim = %key, error = %e, "cannot bind claim");
                observability::increment_reconciliation_errors(Self::CONTROLLER, e.kind());
                claim.set_conditions([Condition::reconcile_error(&e)]);
                write_status_if_changed(self.store.as_ref(), &mut claim, &before).await?;
                return Ok(PassOutcome::await_change(ClaimState::Rejected));
            }
            Err(e) if e.is_retryable() => return Err(e),
            Err(e) => return self.record_error(claim, &before, e, ClaimState::Unbound).await,
        };

        let synced = match self.sync_composition_fields(&mut claim, &mut xr).await {
            Ok(()) => self.propagate_connection_details(&mut claim, &xr).await,
            Err(e) => Err(e),
        };
        match synced {
            Ok(()) => {}
            Err(e) if e.is_retryable() => return Err(e),
            Err(e) => return self.record_error(claim, &before, e, ClaimState::Bound).await,
        }

        let mut ready = xr.get_condition(TYPE_READY);
        if ready.reason.is_empty() {
            ready = Condition::new(TYPE_READY, ConditionStatus::Unknown, REASON_CREATING)
                .with_message("waiting for the composite resource to report readiness");
        }
        let is_ready = ready.status == ConditionStatus::True;
        claim.set_conditions([ready, Condition::reconcile_success()]);
        let generation = claim.metadata.generation.unwrap_or_default();
        claim.set_observed_generation(generation);
        write_status_if_changed(self.store.as_ref(), &mut claim, &before).await?;

        if is_ready {
            Ok(PassOutcome::requeue(ClaimState::Ready, self.poll_interval))
        } else {
            Ok(PassOutcome::requeue(ClaimState::Bound, self.short_wait))
        }
    }

    /// Find or create the Composite this claim is bound to
    ///
    /// The generated name is recorded on the claim before the Composite is
    /// created, so a crash in between never leaks an unreferenced Composite.
    async fn bind(&self, claim: &mut CompositeResourceClaim) -> Result<CompositeResource> {
        let xr_ref = match claim.get_resource_reference() {
            Some(r) => r.clone(),
            None => {
                let r = TypedReference {
                    api_version: CompositeResource::api_version(&()).into_owned(),
                    kind: CompositeResource::kind(&()).into_owned(),
                    name: generate_composite_name(claim.name()),
                    namespace: None,
                };
                claim.set_resource_reference(Some(r.clone()));
                self.store.update(claim).await?;
                debug!(claim = %claim.key(), composite = %r.name, "recorded composite reference");
                r
            }
        };

        let key = ObjectKey::from(&xr_ref);
        let mut xr = match self.store.get::<CompositeResource>(&key).await {
            Ok(xr) => xr,
            Err(Error::NotFound { .. }) => {
                let mut xr = self.composite_for(claim, &key.name);
                match self.store.create(&mut xr).await {
                    Ok(()) => {
                        info!("✨ Created composite {} for claim {}", key.name, claim.key());
                        xr
                    }
                    Err(Error::AlreadyExists { .. }) => self.store.get(&key).await?,
                    Err(e) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        };

        let claim_ref = claim.typed_reference();
        match xr.get_claim_reference() {
            Some(bound) if *bound != claim_ref => {
                return Err(Error::PolicyViolation(format!(
                    "composite {} is bound to {bound}, not {claim_ref}",
                    key.name
                )));
            }
            Some(_) => {}
            None => {
                info!("🔗 Binding existing composite {} to claim {}", key.name, claim.key());
                xr.set_claim_reference(Some(claim_ref));
                self.label_for(claim, &mut xr);
                self.store.update(&mut xr).await?;
            }
        }
        Ok(xr)
    }

    fn composite_for(&self, claim: &CompositeResourceClaim, name: &str) -> CompositeResource {
        let write_ref = LocalConnectionSecretWriterTo::get_write_connection_secret_to_reference(claim)
            .map(|_| SecretReference {
                name: name.to_string(),
                namespace: self.connection_secret_namespace.clone(),
            });
        let mut xr = CompositeResource::new(
            name,
            CompositeResourceSpec {
                composition_selector: claim.get_composition_selector().cloned(),
                composition_ref: claim.get_composition_reference().cloned(),
                composition_revision_ref: claim.get_composition_revision_reference().cloned(),
                composition_revision_selector: claim.get_composition_revision_selector().cloned(),
                composition_update_policy: claim.get_composition_update_policy(),
                claim_ref: Some(claim.typed_reference()),
                write_connection_secret_to_ref: write_ref,
                ..CompositeResourceSpec::default()
            },
        );
        self.label_for(claim, &mut xr);
        xr
    }

    fn label_for(&self, claim: &CompositeResourceClaim, xr: &mut CompositeResource) {
        let labels = xr.metadata.labels.get_or_insert_with(Default::default);
        labels.insert(LABEL_CLAIM_NAME.to_string(), claim.name().to_string());
        labels.insert(
            LABEL_CLAIM_NAMESPACE.to_string(),
            claim_namespace(claim).to_string(),
        );
    }

    /// Push claim-owned composition fields down and resolved ones back up
    async fn sync_composition_fields(
        &self,
        claim: &mut CompositeResourceClaim,
        xr: &mut CompositeResource,
    ) -> Result<()> {
        let mut xr_changed = false;
        if let Some(selector) = claim.get_composition_selector() {
            if xr.get_composition_selector() != Some(selector) {
                xr.set_composition_selector(Some(selector.clone()));
                xr_changed = true;
            }
        }
        if let Some(selector) = claim.get_composition_revision_selector() {
            if xr.get_composition_revision_selector() != Some(selector) {
                xr.set_composition_revision_selector(Some(selector.clone()));
                xr_changed = true;
            }
        }
        if let Some(composition) = claim.get_composition_reference() {
            if xr.get_composition_reference() != Some(composition) {
                xr.set_composition_reference(Some(composition.clone()));
                xr_changed = true;
            }
        }
        if xr.get_composition_update_policy() != claim.get_composition_update_policy() {
            xr.set_composition_update_policy(claim.get_composition_update_policy());
            xr_changed = true;
        }
        let pinned = claim.get_composition_update_policy() == UpdatePolicy::Manual
            && claim.get_composition_revision_reference().is_some();
        if pinned && xr.get_composition_revision_reference() != claim.get_composition_revision_reference() {
            xr.set_composition_revision_reference(claim.get_composition_revision_reference().cloned());
            xr_changed = true;
        }
        if xr_changed {
            debug!(composite = %xr.key(), "propagating composition fields from claim");
            self.store.update(xr).await?;
        }

        let mut claim_changed = false;
        if claim.get_composition_reference().is_none() && xr.get_composition_reference().is_some() {
            claim.set_composition_reference(xr.get_composition_reference().cloned());
            claim_changed = true;
        }
        if !pinned
            && xr.get_composition_revision_reference().is_some()
            && xr.get_composition_revision_reference() != claim.get_composition_revision_reference()
        {
            claim.set_composition_revision_reference(xr.get_composition_revision_reference().cloned());
            claim_changed = true;
        }
        if claim_changed {
            debug!(claim = %claim.key(), "recording resolved composition on claim");
            self.store.update(claim).await?;
        }
        Ok(())
    }

    /// Copy the Composite's connection secret into the claim's namespace
    async fn propagate_connection_details(
        &self,
        claim: &mut CompositeResourceClaim,
        xr: &CompositeResource,
    ) -> Result<()> {
        let Some(local) = LocalConnectionSecretWriterTo::get_write_connection_secret_to_reference(&*claim) else {
            return Ok(());
        };
        let Some(src) = ConnectionSecretWriterTo::get_write_connection_secret_to_reference(xr) else {
            return Ok(());
        };
        let dest = local.in_namespace(claim_namespace(claim));

        let details = self.secrets.fetch(src).await?;
        if details.is_empty() {
            return Ok(());
        }
        let digest = connection::digest(&details);
        let published = claim
            .status
            .as_ref()
            .and_then(|s| s.connection_details_digest.as_deref());
        if published == Some(digest.as_str()) {
            return Ok(());
        }

        self.secrets.publish(&dest, &details).await?;
        observability::increment_connection_details_published(Self::CONTROLLER);
        debug!(claim = %claim.key(), secret = %dest, "published connection details");
        claim.set_connection_details_last_published_time(Some(now()));
        claim.status.get_or_insert_with(Default::default).connection_details_digest = Some(digest);
        Ok(())
    }

    /// Record a failure that retrying cannot fix on the claim
    async fn record_error(
        &self,
        mut claim: CompositeResourceClaim,
        before: &CompositeResourceClaim,
        err: Error,
        state: ClaimState,
    ) -> Result<PassOutcome<ClaimState>> {
        warn!(claim = %claim.key(), error = %err, "claim pass failed");
        observability::increment_reconciliation_errors(Self::CONTROLLER, err.kind());
        claim.set_conditions([Condition::reconcile_error(&err)]);
        write_status_if_changed(self.store.as_ref(), &mut claim, before).await?;
        Ok(PassOutcome::requeue(state, self.short_wait))
    }

    async fn finalize(
        &self,
        mut claim: CompositeResourceClaim,
        before: &CompositeResourceClaim,
    ) -> Result<PassOutcome<ClaimState>> {
        if !claim.has_finalizer(FINALIZER) {
            return Ok(PassOutcome::await_change(ClaimState::Gone));
        }

        if let Some(xr_ref) = claim.get_resource_reference().cloned() {
            let key = ObjectKey::from(&xr_ref);
            match self.store.get::<CompositeResource>(&key).await {
                Err(Error::NotFound { .. }) => {}
                Err(e) => return Err(e),
                Ok(xr) if xr.get_claim_reference() != Some(&claim.typed_reference()) => {
                    warn!(claim = %claim.key(), composite = %key.name, "composite is not bound to this claim, leaving it in place");
                }
                Ok(xr) => match claim.get_composite_delete_policy() {
                    CompositeDeletePolicy::Background => {
                        ignore_not_found(self.store.delete(&key, None).await)?;
                        info!("🗑️  Deleting composite {} in the background", key.name);
                    }
                    CompositeDeletePolicy::Foreground => {
                        if !xr.is_being_deleted() {
                            ignore_not_found(self.store.delete(&key, None).await)?;
                            info!("🗑️  Deleting composite {}, waiting for it to be gone", key.name);
                        }
                        claim.set_conditions([Condition::deleting().with_message(format!(
                            "waiting for composite {} to be deleted",
                            key.name
                        ))]);
                        write_status_if_changed(self.store.as_ref(), &mut claim, before).await?;
                        return Ok(PassOutcome::requeue(ClaimState::Deleting, self.short_wait));
                    }
                },
            }
        }

        if let Some(local) = LocalConnectionSecretWriterTo::get_write_connection_secret_to_reference(&claim) {
            let dest = local.in_namespace(claim_namespace(&claim));
            self.secrets.unpublish(&dest).await?;
        }
        self.finalizer.remove_finalizer(&mut claim).await?;
        info!("🧹 Claim {} released", claim.key());
        Ok(PassOutcome::await_change(ClaimState::Gone))
    }
}

#[async_trait]
impl<S: ObjectStore> Reconciler for ClaimReconciler<S> {
    type Resource = CompositeResourceClaim;
    type State = ClaimState;
    const CONTROLLER: &'static str = "claim";

    async fn reconcile(&self, key: &ObjectKey) -> Result<PassOutcome<ClaimState>> {
        self.reconcile_claim(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionDetails, MemorySecretStore};
    use crate::crd::{CompositeResourceClaimSpec, LocalSecretReference, Reference};
    use crate::store::MemoryStore;

    struct Harness {
        store: Arc<MemoryStore>,
        secrets: Arc<MemorySecretStore>,
        reconciler: ClaimReconciler<MemoryStore>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let secrets = Arc::new(MemorySecretStore::new());
        let reconciler =
            ClaimReconciler::new(Arc::clone(&store), secrets.clone(), &ControllerConfig::default());
        Harness {
            store,
            secrets,
            reconciler,
        }
    }

    async fn create_claim(store: &MemoryStore, spec: CompositeResourceClaimSpec) -> ObjectKey {
        let mut claim = CompositeResourceClaim::new("db", spec);
        claim.metadata.namespace = Some("team-a".to_string());
        store.create(&mut claim).await.unwrap();
        claim.key()
    }

    async fn bound_composite(store: &MemoryStore, key: &ObjectKey) -> CompositeResource {
        let claim: CompositeResourceClaim = store.get(key).await.unwrap();
        let xr_ref = claim.get_resource_reference().expect("claim is bound");
        store.get(&ObjectKey::from(xr_ref)).await.unwrap()
    }

    #[test]
    fn test_generated_names_are_prefixed_by_claim() {
        let a = generate_composite_name("db");
        let b = generate_composite_name("db");
        assert!(a.starts_with("db-"));
        assert_eq!(a.len(), "db-".len() + 5);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_first_pass_binds_new_composite() {
        let h = harness();
        let spec = CompositeResourceClaimSpec {
            composition_ref: Some(Reference::new("postgres")),
            ..CompositeResourceClaimSpec::default()
        };
        let key = create_claim(&h.store, spec).await;

        let outcome = h.reconciler.reconcile(&key).await.unwrap();
        assert_eq!(outcome.state, ClaimState::Bound);

        let claim: CompositeResourceClaim = h.store.get(&key).await.unwrap();
        assert!(claim.has_finalizer(FINALIZER));
        let xr = bound_composite(&h.store, &key).await;
        assert_eq!(xr.get_claim_reference(), Some(&claim.typed_reference()));
        assert_eq!(xr.get_composition_reference(), Some(&Reference::new("postgres")));
        let labels = xr.metadata.labels.clone().unwrap_or_default();
        assert_eq!(labels.get(LABEL_CLAIM_NAME).map(String::as_str), Some("db"));
        assert_eq!(labels.get(LABEL_CLAIM_NAMESPACE).map(String::as_str), Some("team-a"));
    }

    #[tokio::test]
    async fn test_second_pass_reuses_composite() {
        let h = harness();
        let key = create_claim(&h.store, CompositeResourceClaimSpec::default()).await;

        h.reconciler.reconcile(&key).await.unwrap();
        let first = bound_composite(&h.store, &key).await;
        h.reconciler.reconcile(&key).await.unwrap();
        let second = bound_composite(&h.store, &key).await;
        assert_eq!(first.metadata.uid, second.metadata.uid);
    }

    #[tokio::test]
    async fn test_composite_of_another_claim_is_rejected() {
        let h = harness();
        let mut xr = CompositeResource::new(
            "shared",
            CompositeResourceSpec {
                claim_ref: Some(TypedReference {
                    api_version: CompositeResourceClaim::api_version(&()).into_owned(),
                    kind: CompositeResourceClaim::kind(&()).into_owned(),
                    name: "other".to_string(),
                    namespace: Some("team-b".to_string()),
                }),
                ..CompositeResourceSpec::default()
            },
        );
        h.store.create(&mut xr).await.unwrap();
        let spec = CompositeResourceClaimSpec {
            resource_ref: Some(xr.typed_reference()),
            ..CompositeResourceClaimSpec::default()
        };
        let key = create_claim(&h.store, spec).await;

        let outcome = h.reconciler.reconcile(&key).await.unwrap();
        assert_eq!(outcome, PassOutcome::await_change(ClaimState::Rejected));
        let claim: CompositeResourceClaim = h.store.get(&key).await.unwrap();
        assert_eq!(
            claim.get_condition(crate::crd::TYPE_SYNCED).status,
            ConditionStatus::False
        );
    }

    #[tokio::test]
    async fn test_unbound_composite_is_adopted() {
        let h = harness();
        let mut xr = CompositeResource::new("existing", CompositeResourceSpec::default());
        h.store.create(&mut xr).await.unwrap();
        let spec = CompositeResourceClaimSpec {
            resource_ref: Some(xr.typed_reference()),
            ..CompositeResourceClaimSpec::default()
        };
        let key = create_claim(&h.store, spec).await;

        h.reconciler.reconcile(&key).await.unwrap();
        let xr = bound_composite(&h.store, &key).await;
        assert_eq!(xr.get_claim_reference().map(|r| r.name.as_str()), Some("db"));
    }

    #[tokio::test]
    async fn test_unreadable_composite_is_recorded_on_claim() {
        let h = harness();
        let xr_ref = TypedReference {
            api_version: CompositeResource::api_version(&()).into_owned(),
            kind: CompositeResource::kind(&()).into_owned(),
            name: "broken".to_string(),
            namespace: None,
        };
        h.store
            .put_raw(serde_json::json!({
                "apiVersion": xr_ref.api_version.clone(),
                "kind": xr_ref.kind.clone(),
                "metadata": { "name": "broken" },
                "spec": { "compositionUpdatePolicy": 42 },
            }))
            .await
            .unwrap();
        let spec = CompositeResourceClaimSpec {
            resource_ref: Some(xr_ref),
            ..CompositeResourceClaimSpec::default()
        };
        let key = create_claim(&h.store, spec).await;

        let outcome = h.reconciler.reconcile(&key).await.unwrap();
        assert_eq!(outcome.state, ClaimState::Unbound);
        let claim: CompositeResourceClaim = h.store.get(&key).await.unwrap();
        let synced = claim.get_condition(crate::crd::TYPE_SYNCED);
        assert_eq!(synced.status, ConditionStatus::False);
        assert_eq!(synced.reason, crate::crd::REASON_RECONCILE_ERROR);
    }

    #[tokio::test]
    async fn test_resolved_revision_flows_back_to_claim() {
        let h = harness();
        let key = create_claim(&h.store, CompositeResourceClaimSpec::default()).await;
        h.reconciler.reconcile(&key).await.unwrap();

        let mut xr = bound_composite(&h.store, &key).await;
        xr.set_composition_reference(Some(Reference::new("postgres")));
        xr.set_composition_revision_reference(Some(Reference::new("postgres-7f2a1")));
        h.store.update(&mut xr).await.unwrap();

        h.reconciler.reconcile(&key).await.unwrap();
        let claim: CompositeResourceClaim = h.store.get(&key).await.unwrap();
        assert_eq!(claim.get_composition_reference(), Some(&Reference::new("postgres")));
        assert_eq!(
            claim.get_composition_revision_reference(),
            Some(&Reference::new("postgres-7f2a1"))
        );

        let writes = h.store.writes().await;
        h.reconciler.reconcile(&key).await.unwrap();
        assert_eq!(h.store.writes().await, writes, "settled objects must not be rewritten");
    }

    #[tokio::test]
    async fn test_manual_pin_drives_composite_revision() {
        let h = harness();
        let spec = CompositeResourceClaimSpec {
            composition_update_policy: UpdatePolicy::Manual,
            composition_revision_ref: Some(Reference::new("postgres-1")),
            ..CompositeResourceClaimSpec::default()
        };
        let key = create_claim(&h.store, spec).await;
        h.reconciler.reconcile(&key).await.unwrap();

        let mut xr = bound_composite(&h.store, &key).await;
        xr.set_composition_revision_reference(Some(Reference::new("postgres-2")));
        h.store.update(&mut xr).await.unwrap();

        h.reconciler.reconcile(&key).await.unwrap();
        let xr = bound_composite(&h.store, &key).await;
        assert_eq!(
            xr.get_composition_revision_reference(),
            Some(&Reference::new("postgres-1"))
        );
    }

    #[tokio::test]
    async fn test_connection_details_are_copied_once() {
        let h = harness();
        let spec = CompositeResourceClaimSpec {
            write_connection_secret_to_ref: Some(LocalSecretReference {
                name: "db-conn".to_string(),
            }),
            ..CompositeResourceClaimSpec::default()
        };
        let key = create_claim(&h.store, spec).await;
        h.reconciler.reconcile(&key).await.unwrap();

        let xr = bound_composite(&h.store, &key).await;
        let src = ConnectionSecretWriterTo::get_write_connection_secret_to_reference(&xr)
            .cloned()
            .expect("composite writes a connection secret");
        assert_eq!(src.namespace, ControllerConfig::default().connection_secret_namespace);
        let details: ConnectionDetails = [("password".to_string(), b"s3cret".to_vec())].into();
        h.secrets.publish(&src, &details).await.unwrap();
        let baseline = h.secrets.publishes().await;

        h.reconciler.reconcile(&key).await.unwrap();
        h.reconciler.reconcile(&key).await.unwrap();

        assert_eq!(h.secrets.publishes().await, baseline + 1);
        let dest = SecretReference {
            name: "db-conn".to_string(),
            namespace: "team-a".to_string(),
        };
        assert_eq!(h.secrets.fetch(&dest).await.unwrap(), details);
    }

    #[tokio::test]
    async fn test_background_deletion_releases_immediately() {
        let h = harness();
        let key = create_claim(&h.store, CompositeResourceClaimSpec::default()).await;
        h.reconciler.reconcile(&key).await.unwrap();
        let xr_key = bound_composite(&h.store, &key).await.key();

        h.store.delete(&key, None).await.unwrap();
        let outcome = h.reconciler.reconcile(&key).await.unwrap();
        assert_eq!(outcome.state, ClaimState::Gone);
        assert!(!h.store.contains(&key).await);
        assert!(!h.store.contains(&xr_key).await);
    }
}
