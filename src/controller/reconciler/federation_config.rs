use super::finalizer::{add_finalizer, has_finalizer, is_deleting, remove_finalizer};
use super::status::{config_status, status_changed};
use super::{run_reconcile, Reconciler, ReconcilerError};
use crate::crd::{FederationConfig, FederationPhase};
use crate::store::IntentKind;
use crate::style::naming::federation_namespace_name;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, info, warn};

const KIND: IntentKind = IntentKind::FederationConfig;

/// Reconcile a FederationConfig into its federation domain infrastructure
pub async fn reconcile_federation_config(
    config: Arc<FederationConfig>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let namespace = config.namespace().unwrap_or_default();
    let name = config.name_any();
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
    let Some(config) = ctx.store.get_federation_config(namespace, name).await? else {
        debug!("FederationConfig no longer exists");
        return Ok(Action::await_change());
    };

    if is_deleting(&config.metadata) {
        return cleanup(&config, ctx).await;
    }

    let config = if has_finalizer(&config.metadata) {
        config
    } else {
        add_finalizer(ctx.store.as_ref(), KIND, &config.metadata).await?;
        match ctx.store.get_federation_config(namespace, name).await? {
            Some(config) => config,
            None => return Ok(Action::await_change()),
        }
    };

    match ctx.style.effect_config(&config).await {
        Ok(()) => {
            let federation_namespace = federation_namespace_name(name);
            write_status(
                ctx,
                &config,
                FederationPhase::Ready,
                Some(federation_namespace.clone()),
                Some(format!("Federation namespace {federation_namespace} ready")),
            )
            .await?;
            info!(
                "FederationConfig {}/{} effected by {}",
                namespace,
                name,
                ctx.style.name()
            );
            Ok(Action::await_change())
        }
        Err(e) if e.is_permanent() => {
            warn!("FederationConfig {}/{} rejected: {}", namespace, name, e);
            write_status(ctx, &config, FederationPhase::Failed, None, Some(e.to_string())).await?;
            Ok(Action::await_change())
        }
        Err(e) => {
            warn!("Failed to effect FederationConfig {}/{}: {}", namespace, name, e);
            if let Err(status_err) =
                write_status(ctx, &config, FederationPhase::Failed, None, Some(e.to_string()))
                    .await
            {
                warn!("Failed to record failure status: {}", status_err);
            }
            Err(e.into())
        }
    }
}

async fn cleanup(config: &FederationConfig, ctx: &Reconciler) -> Result<Action, ReconcilerError> {
    if !has_finalizer(&config.metadata) {
        return Ok(Action::await_change());
    }

    ctx.style.remove_config(config).await?;
    remove_finalizer(ctx.store.as_ref(), KIND, &config.metadata).await?;
    info!(
        "FederationConfig {}/{} removed",
        config.namespace().unwrap_or_default(),
        config.name_any()
    );
    Ok(Action::await_change())
}

async fn write_status(
    ctx: &Reconciler,
    config: &FederationConfig,
    phase: FederationPhase,
    namespace: Option<String>,
    message: Option<String>,
) -> Result<(), ReconcilerError> {
    let previous = config.status.as_ref();
    // Keep the last known namespace when a failure does not tell us otherwise
    let namespace = namespace.or_else(|| previous.and_then(|s| s.namespace.clone()));
    let next = config_status(previous, config.metadata.generation, phase, namespace, message);
    if !status_changed(previous, &next) {
        debug!("Status unchanged, skipping patch");
        return Ok(());
    }
    ctx.store
        .patch_federation_config_status(config, &next)
        .await?;
    Ok(())
}
