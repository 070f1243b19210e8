//! # Reconciler
//!
//! One reconcile function per federation kind. Each run re-fetches its
//! object, handles deletion through the cleanup finalizer, resolves the
//! FederationConfig (intents only), hands the work to the federation style
//! and writes status.
//!
//! Outcomes:
//! - success: `await_change`, or a short requeue while an exposure waits for
//!   its external address
//! - permanent style rejection (`DependencyUnsupported`, `InvalidSpec`):
//!   phase `Failed`, `await_change`
//! - anything else: phase `Failed` where possible, error returned to the
//!   error policy for backoff

mod federation_config;
pub mod finalizer;
mod service_binding;
mod service_exposure;
pub mod status;
mod types;

pub use federation_config::reconcile_federation_config;
pub use service_binding::reconcile_service_binding;
pub use service_exposure::reconcile_service_exposure;
pub use types::{resource_key, Reconciler, ReconcilerError};

use crate::observability::metrics;
use crate::store::IntentKind;
use kube_runtime::controller::Action;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, info_span, Instrument};

/// Wrap one reconcile with its span, metrics and backoff bookkeeping
async fn run_reconcile<F>(
    kind: IntentKind,
    namespace: &str,
    name: &str,
    ctx: &Reconciler,
    reconcile: F,
) -> Result<Action, ReconcilerError>
where
    F: Future<Output = Result<Action, ReconcilerError>>,
{
    let span = info_span!(
        "reconcile",
        kind = kind.as_str(),
        namespace = %namespace,
        name = %name
    );
    let start = Instant::now();
    metrics::increment_reconciliations(kind.as_str());

    let result = reconcile.instrument(span).await;

    metrics::observe_reconciliation_duration(kind.as_str(), start.elapsed().as_secs_f64());
    match &result {
        Ok(action) => {
            ctx.backoff.reset(&resource_key(kind, namespace, name));
            debug!(
                kind = kind.as_str(),
                namespace, name, ?action, "Reconciliation finished"
            );
        }
        Err(e) => metrics::increment_reconciliation_errors(kind.as_str(), e.reason()),
    }
    result
}
