//! # Error Policy
//!
//! Turns a failed reconciliation into a requeue. Write conflicts come back
//! almost immediately; everything else follows the per-resource Fibonacci
//! backoff, which the next successful reconcile resets.

use crate::controller::reconciler::{resource_key, Reconciler, ReconcilerError};
use crate::observability;
use crate::store::IntentResource;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, warn};

pub fn handle_reconciliation_error<K>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action
where
    K: IntentResource,
{
    let kind = K::KIND.as_str();
    let namespace = obj.namespace().unwrap_or_default();
    let name = obj.name_any();

    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.reconciliation_error",
        resource.kind = kind,
        resource.namespace = namespace.as_str(),
        resource.name = name.as_str(),
        error = %error
    );
    let _error_guard = error_span.enter();

    if error.is_conflict() {
        debug!(
            "Write conflict on {} {}/{}, requeueing in {:?}",
            kind, namespace, name, ctx.config.conflict_requeue
        );
        observability::metrics::increment_requeues("conflict");
        return Action::requeue(ctx.config.conflict_requeue);
    }

    let delay = ctx
        .backoff
        .next_backoff(&resource_key(K::KIND, &namespace, &name));
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

    warn!(
        "Reconciliation of {} {}/{} failed: {}. Retrying in {}s at {}",
        kind,
        namespace,
        name,
        error,
        delay.as_secs(),
        next_trigger_time.to_rfc3339()
    );

    observability::metrics::increment_requeues("error_backoff");
    Action::requeue(delay)
}
