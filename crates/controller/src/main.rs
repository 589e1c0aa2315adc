//! # Lifecycle Controller
//!
//! Runs the Claim and ProviderConfig controllers against the Kubernetes API.
//!
//! ## Overview
//!
//! - **Claims** are bound to a Composite (created on first sight), kept in sync
//!   with it, and receive its connection details in their own namespace
//! - **ProviderConfigs** carry a live count of the Managed resources using them
//!   and cannot be deleted while that count is above zero
//!
//! Managed and Composite lifecycles need an external client or a composition
//! engine; they are exposed from the library for integrators that supply one.

use anyhow::Result;
use kube::api::Api;
use kube_runtime::reflector::ObjectRef;
use kube_runtime::watcher;
use lifecycle_controller::connection::{KubeSecretStore, SecretStore};
use lifecycle_controller::constants::{
    LABEL_CLAIM_NAME, LABEL_CLAIM_NAMESPACE, LABEL_PROVIDER_CONFIG,
};
use lifecycle_controller::controller::{ClaimReconciler, ProviderConfigReconciler};
use lifecycle_controller::crd::{
    CompositeResource, CompositeResourceClaim, ProviderConfig, ProviderConfigUsage,
};
use lifecycle_controller::runtime::{self, run_controller};
use lifecycle_controller::store::KubeStore;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let init = runtime::initialize().await?;

    let store = Arc::new(KubeStore::new(init.client.clone()));
    let secrets: Arc<dyn SecretStore> = Arc::new(KubeSecretStore::new(init.client.clone()));

    let (claims, provider_configs) = {
        let config = init.controller_config.read().await;
        (
            ClaimReconciler::new(Arc::clone(&store), secrets, &config),
            ProviderConfigReconciler::new(Arc::clone(&store), &config),
        )
    };

    let client = init.client.clone();
    let claim_controller = run_controller(
        init.client.clone(),
        claims,
        Arc::clone(&init.controller_config),
        Arc::clone(&init.server_state),
        move |controller| {
            // A Composite change wakes the claim it is labelled with
            controller.watches(
                Api::<CompositeResource>::all(client.clone()),
                watcher::Config::default(),
                |xr| {
                    let labels = xr.metadata.labels.as_ref()?;
                    let name = labels.get(LABEL_CLAIM_NAME)?;
                    let namespace = labels.get(LABEL_CLAIM_NAMESPACE)?;
                    Some(ObjectRef::<CompositeResourceClaim>::new(name).within(namespace))
                },
            )
        },
    );

    let client = init.client.clone();
    let provider_config_controller = run_controller(
        init.client.clone(),
        provider_configs,
        Arc::clone(&init.controller_config),
        Arc::clone(&init.server_state),
        move |controller| {
            // Usage churn changes the user count of the labelled ProviderConfig
            controller.watches(
                Api::<ProviderConfigUsage>::all(client.clone()),
                watcher::Config::default(),
                |usage| {
                    let name = usage.metadata.labels.as_ref()?.get(LABEL_PROVIDER_CONFIG)?;
                    Some(ObjectRef::<ProviderConfig>::new(name))
                },
            )
        },
    );

    tokio::try_join!(claim_controller, provider_config_controller)?;

    info!("Lifecycle Controller stopped");
    Ok(())
}
