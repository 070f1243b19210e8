//! # Kubernetes-backed Store
//!
//! [`MeshStore`] over a `kube::Client`.

use super::{FederationConfigLister, IntentKind, LabelMatch, MeshStore, StoreError};
use crate::constants::FIELD_MANAGER;
use crate::crd::{
    FederationConfig, FederationConfigStatus, Gateway, ServiceBinding, ServiceBindingStatus,
    ServiceExposure, ServiceExposureStatus, VirtualService,
};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

/// Which call produced an API error. A 409 means `AlreadyExists` for a
/// create and an optimistic-concurrency `Conflict` for a patch.
#[derive(Debug, Clone, Copy)]
enum Verb {
    Get,
    List,
    Create,
    Patch,
    Delete,
}

fn classify(err: kube::Error, verb: Verb, what: String) -> StoreError {
    match err {
        kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound(what),
        kube::Error::Api(api_err) if api_err.code == 409 => match verb {
            Verb::Create => StoreError::AlreadyExists(what),
            _ => StoreError::Conflict(what),
        },
        other => StoreError::Api(format!("{verb:?} {what}: {other}")),
    }
}

fn describe(kind: &str, namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{kind} {ns}/{name}"),
        None => format!("{kind} {name}"),
    }
}

/// `MeshStore` backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get_namespaced<K>(&self, kind: &str, namespace: &str, name: &str) -> Result<Option<K>, StoreError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map_err(|e| classify(e, Verb::Get, describe(kind, Some(namespace), name)))
    }

    async fn create_namespaced<K>(&self, kind: &str, obj: &K) -> Result<(), StoreError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
    {
        let namespace = obj.meta().namespace.as_deref().unwrap_or("default");
        let name = obj.meta().name.clone().unwrap_or_default();
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), obj)
            .await
            .map_err(|e| classify(e, Verb::Create, describe(kind, Some(namespace), &name)))?;
        debug!("Created {}", describe(kind, Some(namespace), &name));
        Ok(())
    }

    async fn delete_namespaced<K>(&self, kind: &str, namespace: &str, name: &str) -> Result<(), StoreError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::background())
            .await
            .map_err(|e| classify(e, Verb::Delete, describe(kind, Some(namespace), name)))?;
        Ok(())
    }

    /// Server-side apply owned by the controller's field manager. Conflicting
    /// owners are overridden.
    async fn apply_namespaced<K>(&self, kind: &str, obj: &K) -> Result<(), StoreError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
    {
        let namespace = obj.meta().namespace.as_deref().unwrap_or("default");
        let name = obj.meta().name.clone().unwrap_or_default();
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(&name, &params, &Patch::Apply(obj))
            .await
            .map_err(|e| classify(e, Verb::Patch, describe(kind, Some(namespace), &name)))?;
        debug!("Applied {}", describe(kind, Some(namespace), &name));
        Ok(())
    }

    /// JSON merge patch against the main resource or its status subresource.
    /// `resourceVersion` is embedded so the API server rejects stale writes.
    async fn merge_patch<K>(
        &self,
        kind: &str,
        meta: &ObjectMeta,
        body: serde_json::Value,
        status: bool,
    ) -> Result<(), StoreError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        let namespace = meta.namespace.as_deref().unwrap_or("default");
        let name = meta.name.as_deref().unwrap_or_default();
        let what = describe(kind, Some(namespace), name);

        let mut patch = body;
        if let Some(rv) = meta.resource_version.as_deref() {
            patch["metadata"]["resourceVersion"] = serde_json::Value::String(rv.to_string());
        }

        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let params = PatchParams::apply(FIELD_MANAGER);
        let result = if status {
            api.patch_status(name, &params, &Patch::Merge(&patch)).await
        } else {
            api.patch(name, &params, &Patch::Merge(&patch)).await
        };
        result.map_err(|e| classify(e, Verb::Patch, what))?;
        Ok(())
    }

    async fn patch_status<K, S>(&self, kind: &str, obj: &K, status: &S) -> Result<(), StoreError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
        S: Serialize + Sync,
    {
        let body = serde_json::json!({ "status": status });
        self.merge_patch::<K>(kind, obj.meta(), body, true).await
    }
}

#[async_trait]
impl FederationConfigLister for KubeStore {
    async fn list_federation_configs(
        &self,
        label: &LabelMatch,
    ) -> Result<Vec<FederationConfig>, StoreError> {
        let api: Api<FederationConfig> = Api::all(self.client.clone());
        let params = ListParams::default().labels(&label.to_string());
        let list = api
            .list(&params)
            .await
            .map_err(|e| classify(e, Verb::List, format!("FederationConfig list ({label})")))?;
        Ok(list.items)
    }
}

#[async_trait]
impl MeshStore for KubeStore {
    async fn get_federation_config(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<FederationConfig>, StoreError> {
        self.get_namespaced("FederationConfig", namespace, name).await
    }

    async fn get_service_exposure(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceExposure>, StoreError> {
        self.get_namespaced("ServiceExposure", namespace, name).await
    }

    async fn get_service_binding(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceBinding>, StoreError> {
        self.get_namespaced("ServiceBinding", namespace, name).await
    }

    async fn patch_finalizers(
        &self,
        kind: IntentKind,
        meta: &ObjectMeta,
        finalizers: Vec<String>,
    ) -> Result<(), StoreError> {
        let body = serde_json::json!({ "metadata": { "finalizers": finalizers } });
        match kind {
            IntentKind::FederationConfig => {
                self.merge_patch::<FederationConfig>(kind.as_str(), meta, body, false)
                    .await
            }
            IntentKind::ServiceExposure => {
                self.merge_patch::<ServiceExposure>(kind.as_str(), meta, body, false)
                    .await
            }
            IntentKind::ServiceBinding => {
                self.merge_patch::<ServiceBinding>(kind.as_str(), meta, body, false)
                    .await
            }
        }
    }

    async fn patch_federation_config_status(
        &self,
        config: &FederationConfig,
        status: &FederationConfigStatus,
    ) -> Result<(), StoreError> {
        self.patch_status("FederationConfig", config, status).await
    }

    async fn patch_service_exposure_status(
        &self,
        exposure: &ServiceExposure,
        status: &ServiceExposureStatus,
    ) -> Result<(), StoreError> {
        self.patch_status("ServiceExposure", exposure, status).await
    }

    async fn patch_service_binding_status(
        &self,
        binding: &ServiceBinding,
        status: &ServiceBindingStatus,
    ) -> Result<(), StoreError> {
        self.patch_status("ServiceBinding", binding, status).await
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<(), StoreError> {
        let name = namespace.metadata.name.clone().unwrap_or_default();
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.create(&PostParams::default(), namespace)
            .await
            .map_err(|e| classify(e, Verb::Create, describe("Namespace", None, &name)))?;
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), StoreError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.delete(name, &DeleteParams::background())
            .await
            .map_err(|e| classify(e, Verb::Delete, describe("Namespace", None, name)))?;
        Ok(())
    }

    async fn create_service(&self, service: &Service) -> Result<(), StoreError> {
        self.create_namespaced("Service", service).await
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Service>, StoreError> {
        self.get_namespaced("Service", namespace, name).await
    }

    async fn apply_service(&self, service: &Service) -> Result<(), StoreError> {
        self.apply_namespaced("Service", service).await
    }

    async fn list_services(
        &self,
        namespace: &str,
        label: &LabelMatch,
    ) -> Result<Vec<Service>, StoreError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(&label.to_string());
        let list = api.list(&params).await.map_err(|e| {
            classify(e, Verb::List, format!("Service list in {namespace} ({label})"))
        })?;
        Ok(list.items)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.delete_namespaced::<Service>("Service", namespace, name).await
    }

    async fn create_gateway(&self, gateway: &Gateway) -> Result<(), StoreError> {
        self.create_namespaced("Gateway", gateway).await
    }

    async fn get_gateway(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Gateway>, StoreError> {
        self.get_namespaced("Gateway", namespace, name).await
    }

    async fn apply_gateway(&self, gateway: &Gateway) -> Result<(), StoreError> {
        self.apply_namespaced("Gateway", gateway).await
    }

    async fn delete_gateway(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.delete_namespaced::<Gateway>("Gateway", namespace, name).await
    }

    async fn create_virtual_service(
        &self,
        virtual_service: &VirtualService,
    ) -> Result<(), StoreError> {
        self.create_namespaced("VirtualService", virtual_service).await
    }

    async fn get_virtual_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualService>, StoreError> {
        self.get_namespaced("VirtualService", namespace, name).await
    }

    async fn apply_virtual_service(
        &self,
        virtual_service: &VirtualService,
    ) -> Result<(), StoreError> {
        self.apply_namespaced("VirtualService", virtual_service).await
    }

    async fn delete_virtual_service(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.delete_namespaced::<VirtualService>("VirtualService", namespace, name)
            .await
    }
}
