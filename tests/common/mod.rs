//! Common test utilities
//!
//! [`FakeStore`] is an in-memory [`MeshStore`] with the API server semantics
//! the controller relies on (AlreadyExists, NotFound, finalizer-gated
//! deletion, namespace cascade) plus switches for injecting failures.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    LoadBalancerIngress, LoadBalancerStatus, Namespace, Service, ServiceStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::ResourceExt;
use mesh_federation_controller::config::ControllerConfig;
use mesh_federation_controller::controller::reconciler::Reconciler;
use mesh_federation_controller::crd::{
    FederationConfig, FederationConfigSpec, FederationConfigStatus, Gateway, ServiceBinding,
    ServiceBindingSpec, ServiceBindingStatus, ServiceExposure, ServiceExposureSpec,
    ServiceExposureStatus, VirtualService,
};
use mesh_federation_controller::store::{
    FederationConfigLister, IntentKind, LabelMatch, MeshStore, StoreError,
};
use mesh_federation_controller::style::{StyleKind, UnprovisionedCertificates};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn meta_key(meta: &ObjectMeta) -> Key {
    key(
        meta.namespace.as_deref().unwrap_or_default(),
        meta.name.as_deref().unwrap_or_default(),
    )
}

/// Failure switches
#[derive(Debug, Default, Clone)]
pub struct Failures {
    pub create_virtual_service: bool,
    pub create_service: bool,
    pub delete_namespace: bool,
    pub list_configs: bool,
    /// Status patches answer with a stale-resourceVersion conflict
    pub status_conflict: bool,
}

#[derive(Debug, Default)]
pub struct State {
    pub configs: BTreeMap<Key, FederationConfig>,
    pub exposures: BTreeMap<Key, ServiceExposure>,
    pub bindings: BTreeMap<Key, ServiceBinding>,
    pub namespaces: BTreeMap<String, Namespace>,
    pub services: BTreeMap<Key, Service>,
    pub gateways: BTreeMap<Key, Gateway>,
    pub virtual_services: BTreeMap<Key, VirtualService>,
    pub failures: Failures,
    pub status_patches: usize,
    pub creates: usize,
    pub applies: usize,
}

#[derive(Debug, Default)]
pub struct FakeStore {
    state: Mutex<State>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn fail(&self, set: impl FnOnce(&mut Failures)) {
        set(&mut self.state().failures);
    }

    pub fn insert_config(&self, config: FederationConfig) {
        let k = meta_key(&config.metadata);
        self.state().configs.insert(k, config);
    }

    pub fn insert_exposure(&self, exposure: ServiceExposure) {
        let k = meta_key(&exposure.metadata);
        self.state().exposures.insert(k, exposure);
    }

    pub fn insert_binding(&self, binding: ServiceBinding) {
        let k = meta_key(&binding.metadata);
        self.state().bindings.insert(k, binding);
    }

    pub fn exposure(&self, namespace: &str, name: &str) -> Option<ServiceExposure> {
        self.state().exposures.get(&key(namespace, name)).cloned()
    }

    pub fn binding(&self, namespace: &str, name: &str) -> Option<ServiceBinding> {
        self.state().bindings.get(&key(namespace, name)).cloned()
    }

    pub fn config(&self, namespace: &str, name: &str) -> Option<FederationConfig> {
        self.state().configs.get(&key(namespace, name)).cloned()
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.state().namespaces.contains_key(name)
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.state().services.get(&key(namespace, name)).cloned()
    }

    pub fn gateway(&self, namespace: &str, name: &str) -> Option<Gateway> {
        self.state().gateways.get(&key(namespace, name)).cloned()
    }

    pub fn virtual_service(&self, namespace: &str, name: &str) -> Option<VirtualService> {
        self.state()
            .virtual_services
            .get(&key(namespace, name))
            .cloned()
    }

    /// Give a service a load-balancer address, as a cloud provider would
    pub fn assign_load_balancer(&self, namespace: &str, name: &str, ip: &str) {
        let mut state = self.state();
        let service = state
            .services
            .get_mut(&key(namespace, name))
            .expect("service to assign an address to");
        service.status = Some(ServiceStatus {
            load_balancer: Some(LoadBalancerStatus {
                ingress: Some(vec![LoadBalancerIngress {
                    ip: Some(ip.to_string()),
                    ..Default::default()
                }]),
            }),
            ..Default::default()
        });
    }

    /// Mark an intent as deleted; it disappears once its finalizers are gone
    pub fn mark_deleting(&self, kind: IntentKind, namespace: &str, name: &str) {
        let mut state = self.state();
        let k = key(namespace, name);
        let meta = match kind {
            IntentKind::FederationConfig => state.configs.get_mut(&k).map(|o| &mut o.metadata),
            IntentKind::ServiceExposure => state.exposures.get_mut(&k).map(|o| &mut o.metadata),
            IntentKind::ServiceBinding => state.bindings.get_mut(&k).map(|o| &mut o.metadata),
        }
        .expect("object to delete");
        meta.deletion_timestamp = Some(deletion_time());
    }
}

fn deletion_time() -> Time {
    serde_json::from_value(serde_json::json!("2026-01-01T00:00:00Z")).unwrap()
}

fn set_finalizers(meta: &mut ObjectMeta, finalizers: Vec<String>) -> bool {
    meta.finalizers = if finalizers.is_empty() {
        None
    } else {
        Some(finalizers)
    };
    // Released by its last finalizer
    meta.deletion_timestamp.is_some() && meta.finalizers.is_none()
}

#[async_trait]
impl FederationConfigLister for FakeStore {
    async fn list_federation_configs(
        &self,
        label: &LabelMatch,
    ) -> Result<Vec<FederationConfig>, StoreError> {
        let state = self.state();
        if state.failures.list_configs {
            return Err(StoreError::Api("list failed".to_string()));
        }
        Ok(state
            .configs
            .values()
            .filter(|c| label.matches(c.metadata.labels.as_ref()))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MeshStore for FakeStore {
    async fn get_federation_config(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<FederationConfig>, StoreError> {
        Ok(self.config(namespace, name))
    }

    async fn get_service_exposure(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceExposure>, StoreError> {
        Ok(self.exposure(namespace, name))
    }

    async fn get_service_binding(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceBinding>, StoreError> {
        Ok(self.binding(namespace, name))
    }

    async fn patch_finalizers(
        &self,
        kind: IntentKind,
        meta: &ObjectMeta,
        finalizers: Vec<String>,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        let k = meta_key(meta);
        let missing = || StoreError::NotFound(format!("{kind} {}/{}", k.0, k.1));
        match kind {
            IntentKind::FederationConfig => {
                let obj = state.configs.get_mut(&k).ok_or_else(missing)?;
                if set_finalizers(&mut obj.metadata, finalizers) {
                    state.configs.remove(&k);
                }
            }
            IntentKind::ServiceExposure => {
                let obj = state.exposures.get_mut(&k).ok_or_else(missing)?;
                if set_finalizers(&mut obj.metadata, finalizers) {
                    state.exposures.remove(&k);
                }
            }
            IntentKind::ServiceBinding => {
                let obj = state.bindings.get_mut(&k).ok_or_else(missing)?;
                if set_finalizers(&mut obj.metadata, finalizers) {
                    state.bindings.remove(&k);
                }
            }
        }
        Ok(())
    }

    async fn patch_federation_config_status(
        &self,
        config: &FederationConfig,
        status: &FederationConfigStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.failures.status_conflict {
            return Err(StoreError::Conflict(config.name_any()));
        }
        let obj = state
            .configs
            .get_mut(&meta_key(&config.metadata))
            .ok_or_else(|| StoreError::NotFound(config.name_any()))?;
        obj.status = Some(status.clone());
        state.status_patches += 1;
        Ok(())
    }

    async fn patch_service_exposure_status(
        &self,
        exposure: &ServiceExposure,
        status: &ServiceExposureStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.failures.status_conflict {
            return Err(StoreError::Conflict(exposure.name_any()));
        }
        let obj = state
            .exposures
            .get_mut(&meta_key(&exposure.metadata))
            .ok_or_else(|| StoreError::NotFound(exposure.name_any()))?;
        obj.status = Some(status.clone());
        state.status_patches += 1;
        Ok(())
    }

    async fn patch_service_binding_status(
        &self,
        binding: &ServiceBinding,
        status: &ServiceBindingStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.failures.status_conflict {
            return Err(StoreError::Conflict(binding.name_any()));
        }
        let obj = state
            .bindings
            .get_mut(&meta_key(&binding.metadata))
            .ok_or_else(|| StoreError::NotFound(binding.name_any()))?;
        obj.status = Some(status.clone());
        state.status_patches += 1;
        Ok(())
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<(), StoreError> {
        let mut state = self.state();
        let name = namespace.name_any();
        if state.namespaces.contains_key(&name) {
            return Err(StoreError::AlreadyExists(format!("Namespace {name}")));
        }
        state.namespaces.insert(name, namespace.clone());
        state.creates += 1;
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.failures.delete_namespace {
            return Err(StoreError::Api(format!("delete Namespace {name} failed")));
        }
        if state.namespaces.remove(name).is_none() {
            return Err(StoreError::NotFound(format!("Namespace {name}")));
        }
        state.services.retain(|(ns, _), _| ns != name);
        state.gateways.retain(|(ns, _), _| ns != name);
        state.virtual_services.retain(|(ns, _), _| ns != name);
        Ok(())
    }

    async fn create_service(&self, service: &Service) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.failures.create_service {
            return Err(StoreError::Api("create Service failed".to_string()));
        }
        let k = meta_key(&service.metadata);
        if state.services.contains_key(&k) {
            return Err(StoreError::AlreadyExists(format!("Service {}/{}", k.0, k.1)));
        }
        state.services.insert(k, service.clone());
        state.creates += 1;
        Ok(())
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, StoreError> {
        Ok(self.service(namespace, name))
    }

    async fn apply_service(&self, service: &Service) -> Result<(), StoreError> {
        let mut state = self.state();
        let k = meta_key(&service.metadata);
        // Status belongs to the API server, not to the applied manifest
        let status = state.services.get(&k).and_then(|s| s.status.clone());
        let mut applied = service.clone();
        applied.status = status;
        state.services.insert(k, applied);
        state.applies += 1;
        Ok(())
    }

    async fn list_services(
        &self,
        namespace: &str,
        label: &LabelMatch,
    ) -> Result<Vec<Service>, StoreError> {
        Ok(self
            .state()
            .services
            .iter()
            .filter(|((ns, _), svc)| ns == namespace && label.matches(svc.metadata.labels.as_ref()))
            .map(|(_, svc)| svc.clone())
            .collect())
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.state()
            .services
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("Service {namespace}/{name}")))
    }

    async fn get_gateway(&self, namespace: &str, name: &str) -> Result<Option<Gateway>, StoreError> {
        Ok(self.gateway(namespace, name))
    }

    async fn apply_gateway(&self, gateway: &Gateway) -> Result<(), StoreError> {
        let mut state = self.state();
        state.gateways.insert(meta_key(&gateway.metadata), gateway.clone());
        state.applies += 1;
        Ok(())
    }

    async fn get_virtual_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VirtualService>, StoreError> {
        Ok(self.virtual_service(namespace, name))
    }

    async fn apply_virtual_service(&self, virtual_service: &VirtualService) -> Result<(), StoreError> {
        let mut state = self.state();
        state
            .virtual_services
            .insert(meta_key(&virtual_service.metadata), virtual_service.clone());
        state.applies += 1;
        Ok(())
    }

    async fn create_gateway(&self, gateway: &Gateway) -> Result<(), StoreError> {
        let mut state = self.state();
        let k = meta_key(&gateway.metadata);
        if state.gateways.contains_key(&k) {
            return Err(StoreError::AlreadyExists(format!("Gateway {}/{}", k.0, k.1)));
        }
        state.gateways.insert(k, gateway.clone());
        state.creates += 1;
        Ok(())
    }

    async fn delete_gateway(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.state()
            .gateways
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("Gateway {namespace}/{name}")))
    }

    async fn create_virtual_service(&self, virtual_service: &VirtualService) -> Result<(), StoreError> {
        let mut state = self.state();
        if state.failures.create_virtual_service {
            return Err(StoreError::Api("create VirtualService failed".to_string()));
        }
        let k = meta_key(&virtual_service.metadata);
        if state.virtual_services.contains_key(&k) {
            return Err(StoreError::AlreadyExists(format!(
                "VirtualService {}/{}",
                k.0, k.1
            )));
        }
        state.virtual_services.insert(k, virtual_service.clone());
        state.creates += 1;
        Ok(())
    }

    async fn delete_virtual_service(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.state()
            .virtual_services
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("VirtualService {namespace}/{name}")))
    }
}

/// FederationConfig `east` in `mesh-system`, labelled `team=east`
pub fn east_config() -> FederationConfig {
    let mut config = FederationConfig::new(
        "east",
        FederationConfigSpec {
            mode: None,
            use_egress_gateway: true,
            ingress_gateway_selector: BTreeMap::from([("app".to_string(), "ingressgw".to_string())]),
            ingress_gateway_port: 443,
            egress_gateway_selector: BTreeMap::from([("app".to_string(), "egressgw".to_string())]),
            egress_gateway_port: 443,
            tls_context_selector: BTreeMap::new(),
        },
    );
    config.metadata.namespace = Some("mesh-system".to_string());
    config.metadata.uid = Some("uid-east".to_string());
    config.metadata.generation = Some(1);
    config.metadata.labels = Some(BTreeMap::from([("team".to_string(), "east".to_string())]));
    config
}

/// ServiceExposure `orders` in `shop`, port 8080 subset v1, selecting `team=east`
pub fn orders_exposure() -> ServiceExposure {
    let mut exposure = ServiceExposure::new(
        "orders",
        ServiceExposureSpec {
            name: "orders".to_string(),
            subset: "v1".to_string(),
            port: 8080,
            federation_config_selector: "team=east".to_string(),
        },
    );
    exposure.metadata.namespace = Some("shop".to_string());
    exposure.metadata.uid = Some("uid-orders".to_string());
    exposure.metadata.generation = Some(1);
    exposure
}

/// ServiceBinding `orders` in `checkout`, bound to the remote `shop/orders`
pub fn orders_binding() -> ServiceBinding {
    let mut binding = ServiceBinding::new(
        "orders",
        ServiceBindingSpec {
            name: "orders".to_string(),
            namespace: Some("shop".to_string()),
            port: Some(8080),
            alias: None,
            federation_config_selector: "team=east".to_string(),
        },
    );
    binding.metadata.namespace = Some("checkout".to_string());
    binding.metadata.uid = Some("uid-binding".to_string());
    binding.metadata.generation = Some(1);
    binding
}

/// Reconciler over `store` with the boundary-protection style
pub fn reconciler(store: &Arc<FakeStore>) -> Arc<Reconciler> {
    let mesh_store: Arc<dyn MeshStore> = store.clone();
    let style = StyleKind::BoundaryProtection.build(mesh_store.clone(), Arc::new(UnprovisionedCertificates));
    Arc::new(Reconciler::new(mesh_store, style, ControllerConfig::default()))
}
