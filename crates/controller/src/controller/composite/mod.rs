//! # Composite Resource Lifecycle
//!
//! Resolves a CompositeResource's composition and revision, renders the
//! composed resources it declares and aggregates their readiness and
//! connection details.
//!
//! Readiness is derived from the currently referenced composed resources on
//! every pass:
//! - no references: `Ready=True`
//! - any reference not found: `Ready=Unknown`
//! - all `Ready=True`: `Ready=True`
//! - otherwise `Ready=False`

mod composition;

pub use composition::{CompositionRenderer, CompositionResolver};

use crate::config::ControllerConfig;
use crate::connection::{self, ConnectionDetails, SecretStore};
use crate::constants::{ANNOTATION_PAUSED, FINALIZER};
use crate::controller::types::{PassOutcome, Reconciler, write_status_if_changed};
use crate::crd::{
    ComposedResource, CompositeResource, Condition, ConditionStatus, REASON_UNAVAILABLE,
    Reference, TYPE_READY, UpdatePolicy, now,
};
use crate::error::{Error, Result, ignore_not_found};
use crate::observability;
use crate::resource::{
    APIFinalizer, ComposedResourcesReferencer, CompositionReferencer,
    CompositionRevisionReferencer, CompositionRevisionSelector, CompositionSelector,
    CompositionUpdater, Conditioned, ConnectionDetailsPublishedTimer, ConnectionSecretWriterTo,
    Object, ReconciliationObserver,
};
use crate::store::{ObjectKey, ObjectStore};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle state a Composite pass leaves behind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeState {
    /// No composition or revision could be resolved
    Unresolved,
    /// Composed resources exist but are not all ready
    Composing,
    Ready,
    Deleting,
    Gone,
    Paused,
}

/// Aggregate readiness over a set of composed resources
///
/// `None` entries are references that could not be found.
pub fn composed_readiness<'a, I>(composed: I) -> Condition
where
    I: IntoIterator<Item = (&'a str, Option<&'a ComposedResource>)>,
{
    let mut missing = Vec::new();
    let mut unready = Vec::new();
    for (name, resource) in composed {
        match resource {
            None => missing.push(name),
            Some(r) if r.get_condition(TYPE_READY).status != ConditionStatus::True => {
                unready.push(name);
            }
            Some(_) => {}
        }
    }

    if !missing.is_empty() {
        Condition::new(TYPE_READY, ConditionStatus::Unknown, REASON_UNAVAILABLE)
            .with_message(format!("composed resources not found: {}", missing.join(", ")))
    } else if !unready.is_empty() {
        Condition::unavailable()
            .with_message(format!("composed resources not ready: {}", unready.join(", ")))
    } else {
        Condition::available()
    }
}

pub struct CompositeReconciler<S> {
    store: Arc<S>,
    secrets: Arc<dyn SecretStore>,
    resolver: Arc<dyn CompositionResolver>,
    renderer: Arc<dyn CompositionRenderer>,
    finalizer: APIFinalizer<S>,
    poll_interval: Duration,
    short_wait: Duration,
}

impl<S> std::fmt::Debug for CompositeReconciler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeReconciler")
            .field("poll_interval", &self.poll_interval)
            .field("short_wait", &self.short_wait)
            .finish_non_exhaustive()
    }
}

impl<S: ObjectStore> CompositeReconciler<S> {
    pub fn new(
        store: Arc<S>,
        secrets: Arc<dyn SecretStore>,
        resolver: Arc<dyn CompositionResolver>,
        renderer: Arc<dyn CompositionRenderer>,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            finalizer: APIFinalizer::new(Arc::clone(&store), FINALIZER),
            store,
            secrets,
            resolver,
            renderer,
            poll_interval: config.poll_interval(),
            short_wait: config.short_wait(),
        }
    }

    async fn reconcile_composite(&self, key: &ObjectKey) -> Result<PassOutcome<CompositeState>> {
        let mut xr: CompositeResource = match self.store.get(key).await {
            Ok(xr) => xr,
            Err(Error::NotFound { .. }) => return Ok(PassOutcome::await_change(CompositeState::Gone)),
            Err(e) => return Err(e),
        };
        let before = xr.clone();

        let paused = xr
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(ANNOTATION_PAUSED))
            .is_some_and(|v| v == "true");
        if paused {
            xr.set_conditions([Condition::reconcile_paused()]);
            write_status_if_changed(self.store.as_ref(), &mut xr, &before).await?;
            return Ok(PassOutcome::await_change(CompositeState::Paused));
        }

        if xr.is_being_deleted() {
            return self.finalize(xr, &before).await;
        }

        self.finalizer.add_finalizer(&mut xr).await?;

        let revision = match self.select_revision(&mut xr).await {
            Ok(revision) => revision,
            Err(e) if e.is_retryable() && !matches!(e, Error::External(_)) => return Err(e),
            Err(e) => return self.record_error(xr, &before, e, CompositeState::Unresolved).await,
        };

        let rendered = match self.renderer.render(&xr, &revision).await {
            Ok(refs) => refs,
            Err(e) => return self.record_error(xr, &before, e, CompositeState::Composing).await,
        };
        if rendered.as_slice() != xr.get_resource_references() {
            debug!(composite = %key, count = rendered.len(), "composed resource references changed");
            xr.set_resource_references(rendered);
            self.store.update(&mut xr).await?;
        }

        let mut composed = Vec::with_capacity(xr.get_resource_references().len());
        let mut unreadable = None;
        for r in xr.get_resource_references() {
            match self.store.get::<ComposedResource>(&ObjectKey::from(r)).await {
                Ok(c) => composed.push((r.name.clone(), Some(c))),
                Err(Error::NotFound { .. }) => composed.push((r.name.clone(), None)),
                Err(e) if e.is_retryable() => return Err(e),
                Err(e) => {
                    unreadable = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = unreadable {
            return self.record_error(xr, &before, e, CompositeState::Composing).await;
        }
        let ready = composed_readiness(composed.iter().map(|(n, c)| (n.as_str(), c.as_ref())));

        let mut sets = Vec::new();
        for resource in composed.iter().filter_map(|(_, c)| c.as_ref()) {
            if let Some(src) = resource.get_write_connection_secret_to_reference() {
                sets.push(self.secrets.fetch(src).await?);
            }
        }
        self.publish(&mut xr, connection::merge(sets)).await?;

        let is_ready = ready.status == ConditionStatus::True;
        xr.set_conditions([ready, Condition::reconcile_success()]);
        let generation = xr.metadata.generation.unwrap_or_default();
        xr.set_observed_generation(generation);
        write_status_if_changed(self.store.as_ref(), &mut xr, &before).await?;

        if is_ready {
            Ok(PassOutcome::requeue(CompositeState::Ready, self.poll_interval))
        } else {
            Ok(PassOutcome::requeue(CompositeState::Composing, self.short_wait))
        }
    }

    /// Resolve the composition and revision to use, persisting any change to the spec
    async fn select_revision(&self, xr: &mut CompositeResource) -> Result<Reference> {
        let mut changed = false;

        let composition = match xr.get_composition_reference() {
            Some(c) => c.clone(),
            None => {
                let selector = xr.get_composition_selector().ok_or_else(|| {
                    Error::ReferenceUnresolvable {
                        reference: "composition".to_string(),
                        reason: "neither compositionRef nor compositionSelector is set"
                            .to_string(),
                    }
                })?;
                let selected = self.resolver.select_composition(selector).await?.ok_or_else(
                    || Error::ReferenceUnresolvable {
                        reference: "composition".to_string(),
                        reason: format!("no composition matches {}", selector.to_query()),
                    },
                )?;
                info!("🎯 Selected composition {} for {}", selected.name, xr.key());
                xr.set_composition_reference(Some(selected.clone()));
                changed = true;
                selected
            }
        };

        let current = xr.get_composition_revision_reference().cloned();
        let revision = match (xr.get_composition_update_policy(), current) {
            (UpdatePolicy::Manual, Some(pinned)) => pinned,
            (_, current) => {
                let latest = self
                    .resolver
                    .latest_revision(&composition, xr.get_composition_revision_selector())
                    .await?
                    .ok_or_else(|| Error::ReferenceUnresolvable {
                        reference: format!("revision of composition {}", composition.name),
                        reason: "no revision found".to_string(),
                    })?;
                if current.as_ref() != Some(&latest) {
                    info!("📦 Using composition revision {} for {}", latest.name, xr.key());
                    xr.set_composition_revision_reference(Some(latest.clone()));
                    changed = true;
                }
                latest
            }
        };

        if changed {
            self.store.update(xr).await?;
        }
        Ok(revision)
    }

    /// Publish merged connection details when their digest changed
    async fn publish(&self, xr: &mut CompositeResource, details: ConnectionDetails) -> Result<()> {
        let Some(dest) = xr.get_write_connection_secret_to_reference().cloned() else {
            return Ok(());
        };
        let digest = connection::digest(&details);
        let published = xr
            .status
            .as_ref()
            .and_then(|s| s.connection_details_digest.as_deref());
        if published == Some(digest.as_str()) {
            return Ok(());
        }

        self.secrets.publish(&dest, &details).await?;
        observability::increment_connection_details_published(Self::CONTROLLER);
        debug!(composite = %xr.key(), secret = %dest, "published connection details");
        xr.set_connection_details_last_published_time(Some(now()));
        xr.status.get_or_insert_with(Default::default).connection_details_digest = Some(digest);
        Ok(())
    }

    /// Deletion path: the finalizer is held until no referenced resource exists
    async fn finalize(
        &self,
        mut xr: CompositeResource,
        before: &CompositeResource,
    ) -> Result<PassOutcome<CompositeState>> {
        if !xr.has_finalizer(FINALIZER) {
            return Ok(PassOutcome::await_change(CompositeState::Gone));
        }

        let mut remaining = Vec::new();
        for r in xr.get_resource_references() {
            let composed = ObjectKey::from(r);
            ignore_not_found(self.store.delete(&composed, None).await)?;
            match self.store.get::<ComposedResource>(&composed).await {
                Ok(_) => remaining.push(r.name.clone()),
                Err(Error::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        if !remaining.is_empty() {
            debug!(composite = %xr.key(), remaining = remaining.len(), "waiting for composed resources");
            xr.set_conditions([Condition::deleting().with_message(format!(
                "waiting for composed resources to be deleted: {}",
                remaining.join(", ")
            ))]);
            write_status_if_changed(self.store.as_ref(), &mut xr, before).await?;
            return Ok(PassOutcome::requeue(CompositeState::Deleting, self.short_wait));
        }

        if let Some(dest) = xr.get_write_connection_secret_to_reference() {
            self.secrets.unpublish(dest).await?;
        }
        self.finalizer.remove_finalizer(&mut xr).await?;
        info!("🧹 Composite {} released", xr.key());
        Ok(PassOutcome::await_change(CompositeState::Gone))
    }

    async fn record_error(
        &self,
        mut xr: CompositeResource,
        before: &CompositeResource,
        err: Error,
        state: CompositeState,
    ) -> Result<PassOutcome<CompositeState>> {
        warn!(composite = %xr.key(), error = %err, "composite pass failed");
        observability::increment_reconciliation_errors(Self::CONTROLLER, err.kind());
        xr.set_conditions([Condition::reconcile_error(&err)]);
        write_status_if_changed(self.store.as_ref(), &mut xr, before).await?;
        Ok(PassOutcome::requeue(state, self.short_wait))
    }
}

#[async_trait]
impl<S: ObjectStore> Reconciler for CompositeReconciler<S> {
    type Resource = CompositeResource;
    type State = CompositeState;
    const CONTROLLER: &'static str = "composite";

    async fn reconcile(&self, key: &ObjectKey) -> Result<PassOutcome<CompositeState>> {
        self.reconcile_composite(key).await
    }
}
