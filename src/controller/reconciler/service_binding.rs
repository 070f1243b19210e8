use super::finalizer::{
    add_finalizer, has_finalizer, is_deleting, release_without_config, remove_finalizer,
};
use super::status::{binding_status, status_changed};
use super::{run_reconcile, Reconciler, ReconcilerError};
use crate::crd::{FederationPhase, ServiceBinding};
use crate::store::IntentKind;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, info, warn};

const KIND: IntentKind = IntentKind::ServiceBinding;

/// Reconcile a ServiceBinding. Styles may give bindings no networking effect,
/// in which case this only keeps status and the finalizer in order.
pub async fn reconcile_service_binding(
    binding: Arc<ServiceBinding>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let namespace = binding.namespace().unwrap_or_default();
    let name = binding.name_any();
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
    let Some(binding) = ctx.store.get_service_binding(namespace, name).await? else {
        debug!("ServiceBinding no longer exists");
        return Ok(Action::await_change());
    };

    if is_deleting(&binding.metadata) {
        return cleanup(&binding, ctx).await;
    }

    let binding = if has_finalizer(&binding.metadata) {
        binding
    } else {
        add_finalizer(ctx.store.as_ref(), KIND, &binding.metadata).await?;
        match ctx.store.get_service_binding(namespace, name).await? {
            Some(binding) => binding,
            None => return Ok(Action::await_change()),
        }
    };

    let config = match ctx
        .resolve_config(&binding.spec.federation_config_selector)
        .await
    {
        Ok(config) => config,
        Err(e) => {
            warn!("Cannot resolve FederationConfig for {}/{}: {}", namespace, name, e);
            record_failure(ctx, &binding, &e.to_string()).await;
            return Err(e.into());
        }
    };

    match ctx.style.effect_binding(&binding, &config).await {
        Ok(()) => {
            let message = format!(
                "Bound to {} through FederationConfig {}/{}",
                remote_target(&binding),
                config.namespace().unwrap_or_default(),
                config.name_any()
            );
            write_status(ctx, &binding, FederationPhase::Ready, Some(message)).await?;
            Ok(Action::await_change())
        }
        Err(e) if e.is_permanent() => {
            warn!("ServiceBinding {}/{} rejected: {}", namespace, name, e);
            write_status(ctx, &binding, FederationPhase::Failed, Some(e.to_string())).await?;
            Ok(Action::await_change())
        }
        Err(e) => {
            warn!("Failed to bind {}/{}: {}", namespace, name, e);
            record_failure(ctx, &binding, &e.to_string()).await;
            Err(e.into())
        }
    }
}

async fn cleanup(binding: &ServiceBinding, ctx: &Reconciler) -> Result<Action, ReconcilerError> {
    if !has_finalizer(&binding.metadata) {
        return Ok(Action::await_change());
    }

    match ctx
        .resolve_config(&binding.spec.federation_config_selector)
        .await
    {
        Ok(config) => ctx.style.remove_binding(binding, &config).await?,
        Err(e) if release_without_config(&e) => {
            info!("Releasing ServiceBinding without a FederationConfig: {}", e);
        }
        Err(e) => return Err(e.into()),
    }

    remove_finalizer(ctx.store.as_ref(), KIND, &binding.metadata).await?;
    info!(
        "ServiceBinding {}/{} removed",
        binding.namespace().unwrap_or_default(),
        binding.name_any()
    );
    Ok(Action::await_change())
}

/// `<service>.<namespace>[:port]` of the remote exposure
fn remote_target(binding: &ServiceBinding) -> String {
    let namespace = binding
        .spec
        .namespace
        .clone()
        .unwrap_or_else(|| binding.namespace().unwrap_or_default());
    match binding.spec.port {
        Some(port) => format!("{}.{}:{}", binding.spec.name, namespace, port),
        None => format!("{}.{}", binding.spec.name, namespace),
    }
}

async fn record_failure(ctx: &Reconciler, binding: &ServiceBinding, message: &str) {
    if let Err(e) = write_status(
        ctx,
        binding,
        FederationPhase::Failed,
        Some(message.to_string()),
    )
    .await
    {
        warn!("Failed to record failure status: {}", e);
    }
}

async fn write_status(
    ctx: &Reconciler,
    binding: &ServiceBinding,
    phase: FederationPhase,
    message: Option<String>,
) -> Result<(), ReconcilerError> {
    let previous = binding.status.as_ref();
    let next = binding_status(previous, binding.metadata.generation, phase, message);
    if !status_changed(previous, &next) {
        debug!("Status unchanged, skipping patch");
        return Ok(());
    }
    ctx.store.patch_service_binding_status(binding, &next).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ServiceBindingSpec;

    fn binding(namespace: Option<&str>, port: Option<u32>) -> ServiceBinding {
        let mut binding = ServiceBinding::new(
            "orders",
            ServiceBindingSpec {
                name: "orders".to_string(),
                namespace: namespace.map(str::to_string),
                port,
                alias: None,
                federation_config_selector: String::new(),
            },
        );
        binding.metadata.namespace = Some("checkout".to_string());
        binding
    }

    #[test]
    fn test_remote_target_defaults_to_own_namespace() {
        assert_eq!(remote_target(&binding(None, None)), "orders.checkout");
        assert_eq!(remote_target(&binding(Some("shop"), Some(8080))), "orders.shop:8080");
    }
}
