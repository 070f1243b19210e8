//! # Types
//!
//! Core types for the reconcilers.

use crate::config::ControllerConfig;
use crate::controller::backoff::BackoffStates;
use crate::controller::resolver::{self, ResolveError};
use crate::crd::FederationConfig;
use crate::store::{IntentKind, MeshStore, StoreError};
use crate::style::{FederationStyle, StyleError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Resolve(ResolveError),

    #[error(transparent)]
    Style(StyleError),

    #[error(transparent)]
    Store(StoreError),

    /// Optimistic-concurrency failure. Requeued quickly, never swallowed.
    #[error("write conflict on {0}")]
    Conflict(String),
}

impl ReconcilerError {
    /// Metric label for this error
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcilerError::Resolve(ResolveError::InvalidSelector { .. }) => "invalid_selector",
            ReconcilerError::Resolve(ResolveError::ConfigNotFound { .. }) => "config_not_found",
            ReconcilerError::Resolve(ResolveError::AmbiguousConfig { .. }) => "ambiguous_config",
            ReconcilerError::Resolve(ResolveError::Store(_)) => "store",
            ReconcilerError::Style(StyleError::DependencyUnsupported(_)) => {
                "dependency_unsupported"
            }
            ReconcilerError::Style(StyleError::InvalidSpec(_)) => "invalid_spec",
            ReconcilerError::Style(StyleError::Store(_)) | ReconcilerError::Store(_) => "store",
            ReconcilerError::Conflict(_) => "conflict",
        }
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcilerError::Conflict(_))
    }
}

impl From<StoreError> for ReconcilerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(what) => ReconcilerError::Conflict(what),
            other => ReconcilerError::Store(other),
        }
    }
}

impl From<StyleError> for ReconcilerError {
    fn from(e: StyleError) -> Self {
        match e {
            StyleError::Store(StoreError::Conflict(what)) => ReconcilerError::Conflict(what),
            other => ReconcilerError::Style(other),
        }
    }
}

impl From<ResolveError> for ReconcilerError {
    fn from(e: ResolveError) -> Self {
        ReconcilerError::Resolve(e)
    }
}

/// Shared context handed to every reconcile by the controller runtime
pub struct Reconciler {
    pub store: Arc<dyn MeshStore>,
    pub style: Arc<dyn FederationStyle>,
    pub config: ControllerConfig,
    // Per-resource backoff lives here so the error policy and the reconcile
    // success path see the same state
    pub backoff: BackoffStates,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("style", &self.style.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn MeshStore>,
        style: Arc<dyn FederationStyle>,
        config: ControllerConfig,
    ) -> Self {
        let backoff = BackoffStates::new(config.backoff_min_minutes, config.backoff_max_minutes);
        Self {
            store,
            style,
            config,
            backoff,
        }
    }

    /// Resolve the FederationConfig an intent selects, applying the default selector
    pub async fn resolve_config(&self, selector: &str) -> Result<FederationConfig, ResolveError> {
        resolver::resolve(
            selector,
            &self.config.default_config_selector,
            self.store.as_ref(),
        )
        .await
    }
}

/// Backoff key for one object
#[must_use]
pub fn resource_key(kind: IntentKind, namespace: &str, name: &str) -> String {
    format!("{}/{}/{}", kind.as_str(), namespace, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_conflict_becomes_reconciler_conflict() {
        let err: ReconcilerError = StoreError::Conflict("ServiceExposure shop/orders".into()).into();
        assert!(err.is_conflict());
        assert_eq!(err.reason(), "conflict");

        let err: ReconcilerError =
            StyleError::Store(StoreError::Conflict("Gateway shop/orders".into())).into();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_reasons() {
        let err: ReconcilerError = ResolveError::ConfigNotFound {
            selector: "team=east".into(),
        }
        .into();
        assert_eq!(err.reason(), "config_not_found");

        let err: ReconcilerError = StyleError::DependencyUnsupported("no egress".into()).into();
        assert_eq!(err.reason(), "dependency_unsupported");

        let err: ReconcilerError = StoreError::Api("timeout".into()).into();
        assert_eq!(err.reason(), "store");
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_resource_key() {
        assert_eq!(
            resource_key(IntentKind::ServiceExposure, "shop", "orders"),
            "ServiceExposure/shop/orders"
        );
    }
}
