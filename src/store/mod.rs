//! # Backing Object Store
//!
//! The controller never talks to the API server directly from its
//! reconciliation core. Everything goes through [`MeshStore`], which has a
//! `kube::Client` implementation ([`KubeStore`]) and can be faked in tests.
//!
//! The core depends on three error distinctions from the store:
//! - create returns [`StoreError::AlreadyExists`] when the object is present
//! - delete returns [`StoreError::NotFound`] when the object is gone
//! - a write with a stale `resourceVersion` returns [`StoreError::Conflict`]
//!
//! Derived objects are created first and only re-applied (server-side apply)
//! when the live object has drifted from the desired one.

mod client;

pub use client::KubeStore;

use crate::crd::{
    FederationConfig, FederationConfigStatus, Gateway, ServiceBinding, ServiceBindingStatus,
    ServiceExposure, ServiceExposureStatus, VirtualService,
};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::fmt;
use thiserror::Error;

/// The intent/config kinds the controller reconciles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    FederationConfig,
    ServiceExposure,
    ServiceBinding,
}

impl IntentKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::FederationConfig => "FederationConfig",
            IntentKind::ServiceExposure => "ServiceExposure",
            IntentKind::ServiceBinding => "ServiceBinding",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ties a resource type to its [`IntentKind`]
pub trait IntentResource: kube::Resource<DynamicType = ()> {
    const KIND: IntentKind;
}

impl IntentResource for FederationConfig {
    const KIND: IntentKind = IntentKind::FederationConfig;
}

impl IntentResource for ServiceExposure {
    const KIND: IntentKind = IntentKind::ServiceExposure;
}

impl IntentResource for ServiceBinding {
    const KIND: IntentKind = IntentKind::ServiceBinding;
}

/// Exact-match label filter (`key=value`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelMatch {
    pub key: String,
    pub value: String,
}

impl LabelMatch {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// True when `labels` carries this key with this value
    #[must_use]
    pub fn matches(&self, labels: Option<&std::collections::BTreeMap<String, String>>) -> bool {
        labels
            .and_then(|l| l.get(&self.key))
            .is_some_and(|v| *v == self.value)
    }
}

impl fmt::Display for LabelMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflicting write to {0}")]
    Conflict(String),
    #[error("API request failed: {0}")]
    Api(String),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Treat `AlreadyExists` as success. Returns whether the object was created.
pub fn created_or_existing(result: Result<(), StoreError>) -> Result<bool, StoreError> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_already_exists() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Treat `NotFound` as success. Returns whether the object was deleted.
pub fn deleted_or_absent(result: Result<(), StoreError>) -> Result<bool, StoreError> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Capability to list FederationConfigs by label.
///
/// Config resolution only needs this, so every reconciler shares one
/// injected implementation instead of the resolver knowing reconciler types.
#[async_trait]
pub trait FederationConfigLister: Send + Sync {
    /// List FederationConfigs in all namespaces carrying the label
    async fn list_federation_configs(
        &self,
        label: &LabelMatch,
    ) -> Result<Vec<FederationConfig>, StoreError>;
}

/// CRUD over the federation kinds and the mesh networking objects
#[async_trait]
pub trait MeshStore: FederationConfigLister {
    async fn get_federation_config(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<FederationConfig>, StoreError>;

    async fn get_service_exposure(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceExposure>, StoreError>;

    async fn get_service_binding(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceBinding>, StoreError>;

    /// Replace the finalizer list of an intent. `meta.resource_version` is
    /// sent as a precondition.
    async fn patch_finalizers(
        &self,
        kind: IntentKind,
        meta: &ObjectMeta,
        finalizers: Vec<String>,
    ) -> Result<(), StoreError>;

    async fn patch_federation_config_status(
        &self,
        config: &FederationConfig,
        status: &FederationConfigStatus,
    ) -> Result<(), StoreError>;

    async fn patch_service_exposure_status(
        &self,
        exposure: &ServiceExposure,
        status: &ServiceExposureStatus,
    ) -> Result<(), StoreError>;

    async fn patch_service_binding_status(
        &self,
        binding: &ServiceBinding,
        status: &ServiceBindingStatus,
    ) -> Result<(), StoreError>;

    async fn create_namespace(&self, namespace: &Namespace) -> Result<(), StoreError>;

    async fn delete_namespace(&self, name: &str) -> Result<(), StoreError>;

    async fn create_service(&self, service: &Service) -> Result<(), StoreError>;

    async fn get_service(&self, namespace: &str, name: &str)
        -> Result<Option<Service>, StoreError>;

    /// Server-side apply; creates or converges the service
    async fn apply_service(&self, service: &Service) -> Result<(), StoreError>;

    /// Services in `namespace` carrying the label
    async fn list_services(
        &self,
        namespace: &str,
        label: &LabelMatch,
    ) -> Result<Vec<Service>, StoreError>;

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    async fn create_gateway(&self, gateway: &Gateway) -> Result<(), StoreError>;

    async fn get_gateway(&self, namespace: &str, name: &str)
        -> Result<Option<Gateway>, StoreError>;

    async fn apply_gateway(&self, gateway: &Gateway) -> Result<(), StoreError>;

    async fn delete_gateway(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    async fn create_virtual_service(&self, virtual_service: &VirtualService)
        -> Result<(), StoreError>;

    async fn get_virtual_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualService>, StoreError>;

    async fn apply_virtual_service(&self, virtual_service: &VirtualService)
        -> Result<(), StoreError>;

    async fn delete_virtual_service(&self, namespace: &str, name: &str)
        -> Result<(), StoreError>;
}
