//! # Initialization
//!
//! Controller start-up: rustls provider, logging, metrics, the probe server,
//! the Kubernetes client and the reconciler context with its federation style.

use crate::config::ControllerConfig;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use crate::store::{KubeStore, MeshStore};
use crate::style::UnprovisionedCertificates;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("reconciler", &self.reconciler)
            .field("server_ready", &self.server_state.ready())
            .finish_non_exhaustive()
    }
}

pub async fn initialize(config: ControllerConfig) -> Result<InitializationResult> {
    // Must happen before any rustls use. Fails only when a provider is
    // already installed, which is fine.
    let provider_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    observability::logging::init_logging(config.log_format)?;
    if !provider_installed {
        debug!("rustls crypto provider was already installed");
    }

    info!("Starting Mesh Federation Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        "Federation style: {}, default config selector: {}",
        config.federation_style, config.default_config_selector
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_port = config.metrics_port;
    let server_state_clone = server_state.clone();
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let store: Arc<dyn MeshStore> = Arc::new(KubeStore::new(client.clone()));
    let style = config
        .federation_style
        .build(store.clone(), Arc::new(UnprovisionedCertificates));
    let reconciler = Arc::new(Reconciler::new(store, style, config));

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
    })
}
