use super::finalizer::{
    add_finalizer, has_finalizer, is_deleting, release_without_config, remove_finalizer,
};
use super::status::{exposure_status, status_changed};
use super::{run_reconcile, Reconciler, ReconcilerError};
use crate::crd::{FederationConfig, FederationPhase, ServiceExposure};
use crate::store::IntentKind;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, info, warn};

const KIND: IntentKind = IntentKind::ServiceExposure;

/// Reconcile a ServiceExposure into a Gateway and VirtualService pair
pub async fn reconcile_service_exposure(
    exposure: Arc<ServiceExposure>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let namespace = exposure.namespace().unwrap_or_default();
    let name = exposure.name_any();
    run_reconcile(
        KIND,
        &namespace,
        &name,
        &ctx,
        reconcile(&namespace, &name, &ctx),
    )
    .await
}

async fn reconcile(
    namespace: &str,
    name: &str,
    ctx: &Reconciler,
) -> Result<Action, ReconcilerError> {
    let Some(exposure) = ctx.store.get_service_exposure(namespace, name).await? else {
        debug!("ServiceExposure no longer exists");
        return Ok(Action::await_change());
    };

    if is_deleting(&exposure.metadata) {
        return cleanup(&exposure, ctx).await;
    }

    let exposure = if has_finalizer(&exposure.metadata) {
        exposure
    } else {
        add_finalizer(ctx.store.as_ref(), KIND, &exposure.metadata).await?;
        match ctx.store.get_service_exposure(namespace, name).await? {
            Some(exposure) => exposure,
            None => return Ok(Action::await_change()),
        }
    };

    let config = match ctx
        .resolve_config(&exposure.spec.federation_config_selector)
        .await
    {
        Ok(config) => config,
        Err(e) => {
            warn!("Cannot resolve FederationConfig for {}/{}: {}", namespace, name, e);
            record_failure(ctx, &exposure, &e.to_string()).await;
            return Err(e.into());
        }
    };

    match ctx.style.effect_exposure(&exposure, &config).await {
        Ok(endpoints) if endpoints.is_empty() => {
            info!(
                "ServiceExposure {}/{} waiting for an external address on the ingress gateway",
                namespace, name
            );
            write_status(
                ctx,
                &exposure,
                FederationPhase::Pending,
                Vec::new(),
                Some("Waiting for the ingress gateway external address".to_string()),
            )
            .await?;
            Ok(Action::requeue(ctx.config.pending_requeue))
        }
        Ok(endpoints) => {
            info!(
                "ServiceExposure {}/{} exposed at {}",
                namespace,
                name,
                endpoints.join(", ")
            );
            write_status(
                ctx,
                &exposure,
                FederationPhase::Ready,
                endpoints,
                Some(exposed_through(&config)),
            )
            .await?;
            Ok(Action::await_change())
        }
        Err(e) if e.is_permanent() => {
            warn!("ServiceExposure {}/{} rejected: {}", namespace, name, e);
            write_status(ctx, &exposure, FederationPhase::Failed, Vec::new(), Some(e.to_string()))
                .await?;
            Ok(Action::await_change())
        }
        Err(e) => {
            warn!("Failed to expose {}/{}: {}", namespace, name, e);
            record_failure(ctx, &exposure, &e.to_string()).await;
            Err(e.into())
        }
    }
}

async fn cleanup(exposure: &ServiceExposure, ctx: &Reconciler) -> Result<Action, ReconcilerError> {
    if !has_finalizer(&exposure.metadata) {
        return Ok(Action::await_change());
    }

    match ctx
        .resolve_config(&exposure.spec.federation_config_selector)
        .await
    {
        Ok(config) => ctx.style.remove_exposure(exposure, &config).await?,
        Err(e) if release_without_config(&e) => {
            info!("Releasing ServiceExposure without a FederationConfig: {}", e);
        }
        Err(e) => return Err(e.into()),
    }

    remove_finalizer(ctx.store.as_ref(), KIND, &exposure.metadata).await?;
    info!(
        "ServiceExposure {}/{} removed",
        exposure.namespace().unwrap_or_default(),
        exposure.name_any()
    );
    Ok(Action::await_change())
}

fn exposed_through(config: &FederationConfig) -> String {
    format!(
        "Exposed through FederationConfig {}/{}",
        config.namespace().unwrap_or_default(),
        config.name_any()
    )
}

/// Best-effort failure status ahead of returning the original error.
/// Endpoints are kept: the derived objects may still be serving.
async fn record_failure(ctx: &Reconciler, exposure: &ServiceExposure, message: &str) {
    let endpoints = exposure
        .status
        .as_ref()
        .map(|s| s.endpoints.clone())
        .unwrap_or_default();
    if let Err(e) = write_status(
        ctx,
        exposure,
        FederationPhase::Failed,
        endpoints,
        Some(message.to_string()),
    )
    .await
    {
        warn!("Failed to record failure status: {}", e);
    }
}

async fn write_status(
    ctx: &Reconciler,
    exposure: &ServiceExposure,
    phase: FederationPhase,
    endpoints: Vec<String>,
    message: Option<String>,
) -> Result<(), ReconcilerError> {
    let previous = exposure.status.as_ref();
    let next = exposure_status(
        previous,
        exposure.metadata.generation,
        phase,
        endpoints,
        message,
    );
    if !status_changed(previous, &next) {
        debug!("Status unchanged, skipping patch");
        return Ok(());
    }
    ctx.store
        .patch_service_exposure_status(exposure, &next)
        .await?;
    Ok(())
}
