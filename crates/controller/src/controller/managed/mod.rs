//! # Managed Resource Lifecycle
//!
//! Drives one ManagedResource towards its desired external state.
//!
//! ```text
//! Creating -> Observing <-> Updating -> Deleting -> Gone
//! ```
//!
//! Every create, update, delete and late-initialization is gated on the
//! resource's management policies. A ProviderConfigUsage is recorded before
//! the external system is touched and removed only after the external
//! resource is gone (or orphaned).

mod external;

pub use external::{ExternalClient, ExternalCreation, ExternalObservation, ExternalUpdate};
#[cfg(test)]
pub use external::MockExternalClient;

use crate::config::ControllerConfig;
use crate::connection::{ConnectionDetails, SecretStore};
use crate::constants::{ANNOTATION_PAUSED, FINALIZER};
use crate::controller::types::{PassOutcome, Reconciler, write_status_if_changed};
use crate::controller::usage::ProviderConfigUsageTracker;
use crate::crd::{
    Condition, ConditionStatus, DeletionPolicy, ManagedResource, ManagementAction,
    ManagementPolicies, REASON_UNRESOLVABLE, TYPE_SYNCED,
};
use crate::error::{Error, Result};
use crate::observability;
use crate::resource::{
    APIFinalizer, Conditioned, ConnectionSecretWriterTo, CustomReconciliation, Manageable, Object,
    Orphanable, ReconciliationObserver,
};
use crate::store::{ObjectKey, ObjectStore};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle state a Managed pass leaves behind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagedState {
    Creating,
    Observing,
    Updating,
    Deleting,
    Gone,
    /// The resource could not be read or is misconfigured
    Unknown,
    Paused,
}

/// Reconciliation is paused by annotation or by policy
fn is_paused(mr: &ManagedResource) -> bool {
    let annotated = mr
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_PAUSED))
        .is_some_and(|v| v == "true");
    annotated || mr.get_reconciliation_policy().is_some_and(|p| p.paused)
}

pub struct ManagedReconciler<S> {
    store: Arc<S>,
    secrets: Arc<dyn SecretStore>,
    external: Arc<dyn ExternalClient>,
    usage: ProviderConfigUsageTracker<S>,
    finalizer: APIFinalizer<S>,
    poll_interval: Duration,
    short_wait: Duration,
}

impl<S> std::fmt::Debug for ManagedReconciler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedReconciler")
            .field("poll_interval", &self.poll_interval)
            .field("short_wait", &self.short_wait)
            .finish_non_exhaustive()
    }
}

impl<S: ObjectStore> ManagedReconciler<S> {
    pub fn new(
        store: Arc<S>,
        secrets: Arc<dyn SecretStore>,
        external: Arc<dyn ExternalClient>,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            usage: ProviderConfigUsageTracker::new(Arc::clone(&store)),
            finalizer: APIFinalizer::new(Arc::clone(&store), FINALIZER),
            store,
            secrets,
            external,
            poll_interval: config.poll_interval(),
            short_wait: config.short_wait(),
        }
    }

    async fn reconcile_managed(&self, key: &ObjectKey) -> Result<PassOutcome<ManagedState>> {
        let mut mr: ManagedResource = match self.store.get(key).await {
            Ok(mr) => mr,
            Err(Error::NotFound { .. }) => {
                return Ok(PassOutcome::await_change(ManagedState::Gone));
            }
            Err(e) if e.is_retryable() => return Err(e),
            Err(e) => {
                warn!(resource = %key, error = %e, "cannot read managed resource");
                return Ok(PassOutcome::requeue(ManagedState::Unknown, self.poll_interval));
            }
        };
        let before = mr.clone();

        if is_paused(&mr) {
            debug!(resource = %key, "reconciliation paused");
            mr.set_conditions([Condition::reconcile_paused()]);
            write_status_if_changed(self.store.as_ref(), &mut mr, &before).await?;
            return Ok(PassOutcome::await_change(ManagedState::Paused));
        }

        // Deletion must stay possible whatever the policies say
        if mr.is_being_deleted() {
            return self.finalize(mr, &before).await;
        }

        if let Err(reason) = mr.get_management_policies().validate() {
            let err = Error::PolicyViolation(reason);
            warn!(resource = %key, error = %err, "rejecting management policies");
            mr.set_conditions([Condition::reconcile_error(&err)]);
            write_status_if_changed(self.store.as_ref(), &mut mr, &before).await?;
            return Ok(PassOutcome::await_change(ManagedState::Unknown));
        }

        self.finalizer.add_finalizer(&mut mr).await?;

        match self.usage.record_usage(&mr).await {
            Ok(()) => {}
            Err(e) if e.is_retryable() => return Err(e),
            Err(e) => {
                warn!(resource = %key, error = %e, "cannot record provider config usage");
                mr.set_conditions([Condition::new(
                    TYPE_SYNCED,
                    ConditionStatus::False,
                    REASON_UNRESOLVABLE,
                )
                .with_message(e.to_string())]);
                write_status_if_changed(self.store.as_ref(), &mut mr, &before).await?;
                return Ok(PassOutcome::requeue(ManagedState::Unknown, self.short_wait));
            }
        }

        let desired = mr.spec.clone();
        let observation = match self.external.observe(&mut mr).await {
            Ok(observation) => observation,
            Err(e) => {
                return self
                    .record_external_error(mr, &before, "observe", e, ManagedState::Observing)
                    .await;
            }
        };

        let policies = mr.get_management_policies().clone();
        if observation.resource_late_initialized
            && policies.allows(ManagementAction::LateInitialize)
        {
            debug!(resource = %key, "persisting late-initialized fields");
            self.store.update(&mut mr).await?;
        } else {
            mr.spec = desired;
        }

        if !observation.resource_exists {
            return self.create_external(mr, &before, &policies).await;
        }

        let mut details = observation.connection_details;
        let mut state = ManagedState::Observing;
        if !observation.resource_up_to_date {
            if policies.allows(ManagementAction::Update) {
                match self.external.update(&mut mr).await {
                    Ok(update) => {
                        info!("🔄 Updated external resource for {}", key);
                        details.extend(update.connection_details);
                        state = ManagedState::Updating;
                    }
                    Err(e) => {
                        return self
                            .record_external_error(mr, &before, "update", e, ManagedState::Updating)
                            .await;
                    }
                }
            } else {
                debug!(resource = %key, "external resource drifted but updates are not allowed");
            }
        }

        self.publish(&mr, &details).await?;

        mr.set_conditions([Condition::available(), Condition::reconcile_success()]);
        let generation = mr.metadata.generation.unwrap_or_default();
        mr.set_observed_generation(generation);
        write_status_if_changed(self.store.as_ref(), &mut mr, &before).await?;

        let resync = mr
            .get_reconciliation_policy()
            .and_then(|p| p.resync_interval_seconds)
            .map_or(self.poll_interval, Duration::from_secs);
        Ok(PassOutcome::requeue(state, resync))
    }

    async fn create_external(
        &self,
        mut mr: ManagedResource,
        before: &ManagedResource,
        policies: &ManagementPolicies,
    ) -> Result<PassOutcome<ManagedState>> {
        if !policies.allows(ManagementAction::Create) {
            let err = Error::PolicyViolation(
                "external resource does not exist and management policies do not allow Create"
                    .to_string(),
            );
            mr.set_conditions([Condition::reconcile_error(&err)]);
            write_status_if_changed(self.store.as_ref(), &mut mr, before).await?;
            return Ok(PassOutcome::requeue(ManagedState::Observing, self.poll_interval));
        }

        match self.external.create(&mut mr).await {
            Ok(creation) => {
                info!("✨ Created external resource for {}", mr.key());
                self.publish(&mr, &creation.connection_details).await?;
                mr.set_conditions([Condition::creating(), Condition::reconcile_success()]);
                write_status_if_changed(self.store.as_ref(), &mut mr, before).await?;
                Ok(PassOutcome::requeue(ManagedState::Creating, self.short_wait))
            }
            Err(e) => {
                self.record_external_error(mr, before, "create", e, ManagedState::Creating)
                    .await
            }
        }
    }

    /// Deletion path, entered once the resource carries a deletion timestamp
    async fn finalize(
        &self,
        mut mr: ManagedResource,
        before: &ManagedResource,
    ) -> Result<PassOutcome<ManagedState>> {
        if !mr.has_finalizer(FINALIZER) {
            return Ok(PassOutcome::await_change(ManagedState::Gone));
        }
        let key = mr.key();
        mr.set_conditions([Condition::deleting()]);

        let policies = mr.get_management_policies();
        let orphan = mr.get_deletion_policy() == DeletionPolicy::Orphan
            || policies.validate().is_err()
            || !policies.allows(ManagementAction::Delete);
        if orphan {
            info!("🔓 Leaving external resource for {} in place", key);
        } else {
            match self.external.delete(&mr).await {
                Ok(()) => info!("🗑️  Deleted external resource for {}", key),
                Err(Error::NotFound { .. }) => debug!(resource = %key, "external resource already gone"),
                Err(e) => {
                    return self
                        .record_external_error(mr, before, "delete", e, ManagedState::Deleting)
                        .await;
                }
            }
        }

        if let Some(dest) = mr.get_write_connection_secret_to_reference() {
            self.secrets.unpublish(dest).await?;
        }
        self.usage.remove_usage(&mr).await?;
        self.finalizer.remove_finalizer(&mut mr).await?;
        Ok(PassOutcome::await_change(ManagedState::Gone))
    }

    /// Record a failed external call on the resource and retry after a short wait
    async fn record_external_error(
        &self,
        mut mr: ManagedResource,
        before: &ManagedResource,
        operation: &str,
        err: Error,
        state: ManagedState,
    ) -> Result<PassOutcome<ManagedState>> {
        warn!(resource = %mr.key(), operation, error = %err, "external call failed");
        observability::increment_reconciliation_errors(Self::CONTROLLER, err.kind());
        mr.set_conditions([Condition::reconcile_error(&err)]);
        write_status_if_changed(self.store.as_ref(), &mut mr, before).await?;
        Ok(PassOutcome::requeue(state, self.short_wait))
    }

    async fn publish(&self, mr: &ManagedResource, details: &ConnectionDetails) -> Result<()> {
        let Some(dest) = mr.get_write_connection_secret_to_reference() else {
            return Ok(());
        };
        if details.is_empty() {
            return Ok(());
        }
        self.secrets.publish(dest, details).await?;
        observability::increment_connection_details_published(Self::CONTROLLER);
        debug!(resource = %mr.key(), secret = %dest, "published connection details");
        Ok(())
    }
}

#[async_trait]
impl<S: ObjectStore> Reconciler for ManagedReconciler<S> {
    type Resource = ManagedResource;
    type State = ManagedState;
    const CONTROLLER: &'static str = "managed";

    async fn reconcile(&self, key: &ObjectKey) -> Result<PassOutcome<ManagedState>> {
        self.reconcile_managed(key).await
    }
}
