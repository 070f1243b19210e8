//! # Watch Loop
//!
//! Runs one controller per federation kind until a shutdown signal arrives.
//!
//! Exposures and bindings select their FederationConfig by label, so each of
//! those controllers also watches FederationConfigs and requeues every intent
//! whose selector matches the changed config's labels.

use crate::controller::reconciler::{
    reconcile_federation_config, reconcile_service_binding, reconcile_service_exposure,
    Reconciler,
};
use crate::controller::resolver::selector_matches;
use crate::controller::server::ServerState;
use crate::crd::{FederationConfig, FederationIntent, ServiceBinding, ServiceExposure};
use crate::runtime::error_policy::handle_reconciliation_error;
use futures::StreamExt;
use k8s_openapi::NamespaceResourceScope;
use kube::api::Api;
use kube::{Client, Resource, ResourceExt};
use kube_runtime::reflector::{ObjectRef, Store};
use kube_runtime::{watcher, Controller};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Run the three controllers until shutdown
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let watch_namespace = reconciler.config.watch_namespace.clone();
    match watch_namespace.as_deref() {
        Some(ns) => info!("Watching federation intents in namespace {}", ns),
        None => info!("Watching federation intents in all namespaces"),
    }

    // FederationConfigs are resolved cluster-wide regardless of WATCH_NAMESPACE
    let configs: Api<FederationConfig> = Api::all(client.clone());
    let exposures: Api<ServiceExposure> = intent_api(&client, watch_namespace.as_deref());
    let bindings: Api<ServiceBinding> = intent_api(&client, watch_namespace.as_deref());

    let config_controller =
        Controller::new(configs.clone(), watcher::Config::default().any_semantic())
            .shutdown_on_signal()
            .run(
                reconcile_federation_config,
                handle_reconciliation_error,
                reconciler.clone(),
            )
            .for_each(log_reconcile_result("FederationConfig"));

    let exposure_controller =
        Controller::new(exposures, watcher::Config::default().any_semantic());
    let exposure_store = exposure_controller.store();
    let default_selector = reconciler.config.default_config_selector.clone();
    let exposure_controller = exposure_controller
        .watches(
            configs.clone(),
            watcher::Config::default(),
            move |config: FederationConfig| {
                intents_selecting(&exposure_store, &config, &default_selector)
            },
        )
        .shutdown_on_signal()
        .run(
            reconcile_service_exposure,
            handle_reconciliation_error,
            reconciler.clone(),
        )
        .for_each(log_reconcile_result("ServiceExposure"));

    let binding_controller =
        Controller::new(bindings, watcher::Config::default().any_semantic());
    let binding_store = binding_controller.store();
    let default_selector = reconciler.config.default_config_selector.clone();
    let binding_controller = binding_controller
        .watches(
            configs,
            watcher::Config::default(),
            move |config: FederationConfig| {
                intents_selecting(&binding_store, &config, &default_selector)
            },
        )
        .shutdown_on_signal()
        .run(
            reconcile_service_binding,
            handle_reconciliation_error,
            reconciler.clone(),
        )
        .for_each(log_reconcile_result("ServiceBinding"));

    // Not ready once a shutdown signal arrives, while in-flight reconciles drain
    let shutdown_state = server_state.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, initiating graceful shutdown...");
            shutdown_state.set_ready(false);
        }
    });

    server_state.set_ready(true);
    info!(
        "Controllers running with federation style {}",
        reconciler.style.name()
    );

    futures::join!(config_controller, exposure_controller, binding_controller);

    server_state.set_ready(false);
    info!("Controller stopped gracefully");
    Ok(())
}

fn intent_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Cached intents whose selector picks `config`
fn intents_selecting<K>(
    store: &Store<K>,
    config: &FederationConfig,
    default_selector: &str,
) -> Vec<ObjectRef<K>>
where
    K: Resource<DynamicType = ()> + FederationIntent + Clone + DeserializeOwned + Debug + 'static,
{
    let refs = selecting_refs(&store.state(), config, default_selector);
    if !refs.is_empty() {
        debug!(
            config.namespace = config.namespace().unwrap_or_default().as_str(),
            config.name = config.name_any().as_str(),
            affected_count = refs.len(),
            "FederationConfig changed, requeueing selecting intents"
        );
    }
    refs
}

fn selecting_refs<K>(
    intents: &[Arc<K>],
    config: &FederationConfig,
    default_selector: &str,
) -> Vec<ObjectRef<K>>
where
    K: Resource<DynamicType = ()> + FederationIntent,
{
    intents
        .iter()
        .filter(|intent| {
            selector_matches(
                intent.federation_config_selector(),
                default_selector,
                config.labels(),
            )
        })
        .map(|intent| ObjectRef::from_obj(intent.as_ref()))
        .collect()
}

fn log_reconcile_result<T: Debug, E: std::fmt::Display>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(object) => debug!(?object, "{} reconciliation completed", controller_name),
            Err(e) => error!(error = %e, "{} controller error", controller_name),
        }
        std::future::ready(())
    }
}
