//! # Federation Styles
//!
//! A federation style decides *how* an intent turns into mesh networking
//! objects. Reconcilers only see the [`FederationStyle`] trait, so topologies
//! can be swapped at deployment time without touching reconciliation logic.
//!
//! Every operation is idempotent and safe to call on every reconcile:
//! - `AlreadyExists` on create is success, after the live object has been
//!   converged to the desired one
//! - `NotFound` on delete is success
//! - anything else propagates as [`StyleError`]
//!
//! Available styles:
//! - `boundary-protection`: dedicated ingress/egress gateway infrastructure per
//!   federation domain ([`BoundaryProtection`])

mod boundary_protection;
pub mod naming;

pub use boundary_protection::BoundaryProtection;

use crate::crd::{FederationConfig, ServiceBinding, ServiceExposure};
use crate::store::{MeshStore, StoreError};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StyleError {
    /// The config asks for a topology this style cannot build. Retrying
    /// does not help until the config changes.
    #[error("unsupported federation dependency: {0}")]
    DependencyUnsupported(String),

    /// The intent or config carries values no object can be built from
    #[error("invalid federation spec: {0}")]
    InvalidSpec(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StyleError {
    /// Permanent errors are surfaced as status and not retried
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            StyleError::DependencyUnsupported(_) | StyleError::InvalidSpec(_)
        )
    }
}

/// Strategy translating federation intents into networking objects
#[async_trait]
pub trait FederationStyle: Send + Sync {
    /// Name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Build the infrastructure of a federation domain
    async fn effect_config(&self, config: &FederationConfig) -> Result<(), StyleError>;

    /// Tear down the infrastructure of a federation domain
    async fn remove_config(&self, config: &FederationConfig) -> Result<(), StyleError>;

    /// Expose a local service. Returns the externally reachable endpoints,
    /// empty while the external address is not allocated yet.
    async fn effect_exposure(
        &self,
        exposure: &ServiceExposure,
        config: &FederationConfig,
    ) -> Result<Vec<String>, StyleError>;

    async fn remove_exposure(
        &self,
        exposure: &ServiceExposure,
        config: &FederationConfig,
    ) -> Result<(), StyleError>;

    async fn effect_binding(
        &self,
        binding: &ServiceBinding,
        config: &FederationConfig,
    ) -> Result<(), StyleError>;

    async fn remove_binding(
        &self,
        binding: &ServiceBinding,
        config: &FederationConfig,
    ) -> Result<(), StyleError>;
}

/// Supplies TLS material for a federation namespace.
///
/// Certificate issuance lives outside this controller. Deployments that need
/// working mutual TLS plug in a source that writes the gateway Secret.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    async fn provision(&self, config: &FederationConfig, namespace: &str)
        -> Result<(), StyleError>;
}

/// Default certificate source: provisions nothing and says so
#[derive(Debug, Default, Clone, Copy)]
pub struct UnprovisionedCertificates;

#[async_trait]
impl CertificateSource for UnprovisionedCertificates {
    async fn provision(
        &self,
        config: &FederationConfig,
        namespace: &str,
    ) -> Result<(), StyleError> {
        warn!(
            "No certificate source configured, gateway TLS material for {} must be provisioned into namespace {} externally",
            kube::ResourceExt::name_any(config),
            namespace
        );
        Ok(())
    }
}

/// Deployment-time style choice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleKind {
    BoundaryProtection,
}

impl StyleKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StyleKind::BoundaryProtection => "boundary-protection",
        }
    }

    /// Build the style over a store. Called once at start-up.
    pub fn build(
        self,
        store: Arc<dyn MeshStore>,
        certificates: Arc<dyn CertificateSource>,
    ) -> Arc<dyn FederationStyle> {
        match self {
            StyleKind::BoundaryProtection => {
                Arc::new(BoundaryProtection::new(store, certificates))
            }
        }
    }
}

impl fmt::Display for StyleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StyleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boundary-protection" | "boundary_protection" | "boundary" => {
                Ok(StyleKind::BoundaryProtection)
            }
            other => Err(format!(
                "unknown federation style '{other}' (supported: boundary-protection)"
            )),
        }
    }
}
