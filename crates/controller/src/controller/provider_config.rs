//! # ProviderConfig Reconciler
//!
//! Keeps `status.users` current and holds the in-use finalizer on every live
//! ProviderConfig, so a ProviderConfig that is deleted while Managed resources
//! still use it stays around until the last usage record is gone.

use crate::config::ControllerConfig;
use crate::constants::IN_USE_FINALIZER;
use crate::controller::types::{PassOutcome, Reconciler, write_status_if_changed};
use crate::controller::usage::ProviderConfigUsageTracker;
use crate::crd::{Condition, ConditionStatus, ProviderConfig, REASON_IN_USE, TYPE_READY};
use crate::error::{Error, Result};
use crate::observability;
use crate::resource::{APIFinalizer, Conditioned, Object};
use crate::store::{ObjectKey, ObjectStore};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Lifecycle state a ProviderConfig pass leaves behind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderConfigState {
    /// Live and holding the in-use finalizer
    Active,
    /// Terminating, but still used by Managed resources
    InUse,
    /// Terminating with no users; the finalizer was released
    Released,
    Gone,
}

#[derive(Debug)]
pub struct ProviderConfigReconciler<S> {
    store: Arc<S>,
    usage: ProviderConfigUsageTracker<S>,
    finalizer: APIFinalizer<S>,
    poll_interval: Duration,
}

impl<S: ObjectStore> ProviderConfigReconciler<S> {
    pub fn new(store: Arc<S>, config: &ControllerConfig) -> Self {
        Self {
            usage: ProviderConfigUsageTracker::new(Arc::clone(&store)),
            finalizer: APIFinalizer::new(Arc::clone(&store), IN_USE_FINALIZER),
            store,
            poll_interval: config.poll_interval(),
        }
    }

    async fn reconcile_provider_config(
        &self,
        key: &ObjectKey,
    ) -> Result<PassOutcome<ProviderConfigState>> {
        let mut pc: ProviderConfig = match self.store.get(key).await {
            Ok(pc) => pc,
            Err(Error::NotFound { .. }) => {
                debug!(provider_config = %key.name, "provider config is gone");
                observability::clear_provider_config_users(&key.name);
                return Ok(PassOutcome::await_change(ProviderConfigState::Gone));
            }
            Err(e) => return Err(e),
        };

        let users = self.usage.refresh_user_count(&mut pc).await?;

        if !pc.is_being_deleted() {
            self.finalizer.add_finalizer(&mut pc).await?;
            let before = pc.clone();
            pc.set_conditions([Condition::available()]);
            write_status_if_changed(self.store.as_ref(), &mut pc, &before).await?;
            return Ok(PassOutcome::requeue(
                ProviderConfigState::Active,
                self.poll_interval,
            ));
        }

        if users > 0 {
            info!(
                "⏳ ProviderConfig {} is being deleted but is still used by {} managed resource(s)",
                pc.name(),
                users
            );
            let before = pc.clone();
            pc.set_conditions([Condition::new(TYPE_READY, ConditionStatus::False, REASON_IN_USE)
                .with_message(format!(
                    "cannot delete: in use by {users} managed resource(s)"
                ))]);
            write_status_if_changed(self.store.as_ref(), &mut pc, &before).await?;
            // Woken by the ProviderConfigUsage watch once a usage goes away
            return Ok(PassOutcome::await_change(ProviderConfigState::InUse));
        }

        self.finalizer.remove_finalizer(&mut pc).await?;
        observability::clear_provider_config_users(&key.name);
        info!("🧹 ProviderConfig {} has no users, released for deletion", pc.name());
        Ok(PassOutcome::await_change(ProviderConfigState::Released))
    }
}

#[async_trait]
impl<S: ObjectStore> Reconciler for ProviderConfigReconciler<S> {
    type Resource = ProviderConfig;
    type State = ProviderConfigState;
    const CONTROLLER: &'static str = "providerconfig";

    async fn reconcile(&self, key: &ObjectKey) -> Result<PassOutcome<ProviderConfigState>> {
        self.reconcile_provider_config(key).await
    }
}
