//! # Watch Loop
//!
//! Drives a [`Reconciler`] from a Kubernetes work queue. Each controller watches
//! its own kind (plus whatever the caller adds through `configure`) and runs one
//! pass per key, never two concurrent passes for the same key.

use crate::config::SharedControllerConfig;
use crate::controller::types::{Context, Reconciler};
use crate::error::Error;
use crate::observability;
use crate::resource::Object;
use crate::runtime::error_policy::{
    backoff_key, handle_controller_stream_error, handle_reconciliation_error, reset_backoff,
};
use crate::runtime::server::ServerState;
use futures::StreamExt;
use kube::{Client, Resource, api::Api};
use kube_runtime::{Controller, controller, controller::Action, watcher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, info, warn};

/// Run a controller until shutdown is requested
///
/// `configure` is applied to every freshly built controller before it runs,
/// which is where related kinds are wired in with `Controller::watches`.
pub async fn run_controller<R, F>(
    client: Client,
    reconciler: R,
    controller_config: SharedControllerConfig,
    server_state: Arc<ServerState>,
    configure: F,
) -> Result<(), anyhow::Error>
where
    R: Reconciler,
    F: Fn(Controller<R::Resource>) -> Controller<R::Resource>,
{
    let config = controller_config.read().await;
    let concurrency = config.max_concurrent_reconciliations;
    let context = Arc::new(Context::new(reconciler, &config));
    drop(config);

    info!("Starting {} controller...", R::CONTROLLER);

    loop {
        if !server_state.is_ready() {
            info!("Shutdown requested, exiting {} controller", R::CONTROLLER);
            break;
        }

        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            controller = R::CONTROLLER
        );

        let api: Api<R::Resource> = Api::all(client.clone());
        let controller = Controller::new(api, watcher::Config::default().any_semantic())
            .with_config(controller::Config::default().concurrency(concurrency));

        configure(controller)
            .shutdown_on_signal()
            .run(
                reconcile::<R>,
                |obj, error, ctx| handle_reconciliation_error(obj, error, ctx),
                Arc::clone(&context),
            )
            .filter_map(|x| async move {
                match x {
                    Ok((obj, action)) => {
                        debug!(resource = %obj.name, action = ?action, "watch.event.reconciled");
                        Some(())
                    }
                    Err(e) => {
                        let error_string = format!("{e:?}");
                        handle_controller_stream_error(R::CONTROLLER, &error_string).then_some(())
                    }
                }
            })
            .for_each(|()| futures::future::ready(()))
            .instrument(watch_span)
            .await;

        if !server_state.is_ready() {
            info!("Shutdown requested, exiting {} controller", R::CONTROLLER);
            break;
        }

        // Reload in case it changed
        let delay = controller_config.read().await.watch_restart_delay_duration();
        warn!(
            "{} controller stream ended, restarting in {} seconds...",
            R::CONTROLLER,
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
    }

    info!("{} controller stopped gracefully", R::CONTROLLER);
    Ok(())
}

/// One pass for one object, bounded by the reconcile deadline
async fn reconcile<R: Reconciler>(
    obj: Arc<R::Resource>,
    ctx: Arc<Context<R>>,
) -> Result<Action, Error> {
    let key = obj.key();
    let span = tracing::info_span!(
        "controller.reconcile",
        controller = R::CONTROLLER,
        resource.name = key.name.as_str(),
        resource.namespace = key.namespace.as_deref().unwrap_or(""),
        resource.generation = obj.meta().generation.unwrap_or(0),
    );

    async move {
        observability::increment_reconciliations(R::CONTROLLER);
        let started = Instant::now();

        let result =
            match tokio::time::timeout(ctx.reconcile_timeout, ctx.reconciler.reconcile(&key)).await
            {
                Ok(result) => result,
                Err(elapsed) => {
                    warn!(%elapsed, "Reconciliation pass abandoned");
                    Err(Error::DeadlineExceeded {
                        key: key.to_string(),
                        seconds: ctx.reconcile_timeout.as_secs(),
                    })
                }
            };

        observability::observe_reconciliation_duration(
            R::CONTROLLER,
            started.elapsed().as_secs_f64(),
        );

        let outcome = result?;
        if reset_backoff(&ctx, &backoff_key(obj.as_ref())) {
            debug!("Reset backoff after successful pass");
        }
        debug!(state = ?outcome.state, "watch.event.pass_complete");

        Ok(action_for::<R>(outcome.requeue_after))
    }
    .instrument(span)
    .await
}

fn action_for<R: Reconciler>(requeue_after: Option<Duration>) -> Action {
    match requeue_after {
        Some(after) => {
            observability::increment_requeues_total(R::CONTROLLER, "scheduled");
            Action::requeue(after)
        }
        None => Action::await_change(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::controller::types::PassOutcome;
    use crate::crd::{ProviderConfig, ProviderConfigSpec};
    use crate::store::ObjectKey;
    use async_trait::async_trait;

    struct Fixed(Option<Duration>);

    #[async_trait]
    impl Reconciler for Fixed {
        type Resource = ProviderConfig;
        type State = &'static str;
        const CONTROLLER: &'static str = "fixed";

        async fn reconcile(&self, _key: &ObjectKey) -> crate::Result<PassOutcome<&'static str>> {
            Ok(PassOutcome {
                state: "done",
                requeue_after: self.0,
            })
        }
    }

    struct Slow;

    #[async_trait]
    impl Reconciler for Slow {
        type Resource = ProviderConfig;
        type State = ();
        const CONTROLLER: &'static str = "slow";

        async fn reconcile(&self, _key: &ObjectKey) -> crate::Result<PassOutcome<()>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(PassOutcome::await_change(()))
        }
    }

    fn pc() -> Arc<ProviderConfig> {
        Arc::new(ProviderConfig::new("pc1", ProviderConfigSpec::default()))
    }

    #[tokio::test]
    async fn test_outcome_maps_to_action() {
        let config = ControllerConfig::default();
        let ctx = Arc::new(Context::new(Fixed(Some(Duration::from_secs(7))), &config));
        let action = reconcile(pc(), ctx).await;
        assert!(matches!(action, Ok(a) if a == Action::requeue(Duration::from_secs(7))));

        let ctx = Arc::new(Context::new(Fixed(None), &config));
        let action = reconcile(pc(), ctx).await;
        assert!(matches!(action, Ok(a) if a == Action::await_change()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_past_deadline_is_abandoned() {
        let config = ControllerConfig {
            reconcile_timeout_secs: 1,
            ..ControllerConfig::default()
        };
        let ctx = Arc::new(Context::new(Slow, &config));
        let result = reconcile(pc(), ctx).await;
        assert!(matches!(
            result,
            Err(Error::DeadlineExceeded { seconds: 1, .. })
        ));
    }
}
