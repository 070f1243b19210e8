//! # Boundary Protection
//!
//! Routes all cross-cluster traffic through dedicated gateway infrastructure.
//!
//! Per FederationConfig `<cfg>`:
//! - namespace `federation-<cfg>`
//! - egress Service `federation-<cfg>-egress-<port>` over the egress gateway pods
//! - LoadBalancer ingress Service `federation-<cfg>-ingress-<port>` exposing the
//!   ingress port plus 15444->15443 (mutual TLS) and 31400/31401 (TCP passthrough)
//!
//! Per ServiceExposure: an Istio Gateway terminating mutual TLS on the egress
//! gateway, and a VirtualService routing `<namespace>/<service>` to the
//! exposed service. Both carry a controller owner reference to the exposure.
//!
//! Existing objects are compared against the desired ones and re-applied when
//! a FederationConfig edit changed them. Services of the config that are no
//! longer desired (an egress or ingress port change) are deleted.

use super::naming::{
    canonical_host, egress_service_name, federation_namespace_name, ingress_service_name,
    route_name, route_prefix,
};
use super::{CertificateSource, FederationStyle, StyleError};
use crate::constants::{
    CROSS_CLUSTER_TLS_PORT, CROSS_CLUSTER_TLS_TARGET_PORT, FEDERATION_CONFIG_LABEL,
    GATEWAY_CA_CERTIFICATES, GATEWAY_PORT_NAME, GATEWAY_PRIVATE_KEY, GATEWAY_SERVER_CERTIFICATE,
    MANAGED_BY, MANAGED_BY_LABEL, TCP_PASSTHROUGH_PORT_1, TCP_PASSTHROUGH_PORT_2,
};
use crate::crd::{
    Destination, FederationConfig, Gateway, GatewaySpec, HttpMatchRequest, HttpRewrite,
    HttpRoute, HttpRouteDestination, PortSelector, Server, ServerPort, ServerTlsSettings,
    ServiceBinding, ServiceExposure, StringMatch, VirtualService, VirtualServiceSpec,
};
use crate::observability::metrics;
use crate::store::{created_or_existing, deleted_or_absent, LabelMatch, MeshStore, StoreError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const STYLE_NAME: &str = "boundary-protection";

/// Boundary-protection federation style
pub struct BoundaryProtection {
    store: Arc<dyn MeshStore>,
    certificates: Arc<dyn CertificateSource>,
}

impl std::fmt::Debug for BoundaryProtection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundaryProtection").finish_non_exhaustive()
    }
}

impl BoundaryProtection {
    #[must_use]
    pub fn new(store: Arc<dyn MeshStore>, certificates: Arc<dyn CertificateSource>) -> Self {
        Self {
            store,
            certificates,
        }
    }

    async fn effect_config_inner(&self, config: &FederationConfig) -> Result<(), StyleError> {
        let namespace = build_namespace(config);
        let ns_name = namespace.metadata.name.clone().unwrap_or_default();
        if created_or_existing(self.store.create_namespace(&namespace).await)? {
            info!("Created namespace {} to hold ingress/egress services", ns_name);
        } else {
            debug!("Namespace {} already exists", ns_name);
        }

        self.certificates.provision(config, &ns_name).await?;

        let egress = build_egress_service(config)?;
        let ingress = build_ingress_service(config)?;
        for service in [&egress, &ingress] {
            let ensured = self.ensure_service(service).await?;
            log_ensured("service", &ns_name, &service.name_any(), ensured);
        }

        self.prune_services(config, &ns_name, &[egress.name_any(), ingress.name_any()])
            .await
    }

    /// Delete managed services of the config that are no longer desired,
    /// e.g. the egress service of a previous port
    async fn prune_services(
        &self,
        config: &FederationConfig,
        ns_name: &str,
        keep: &[String],
    ) -> Result<(), StyleError> {
        let label = LabelMatch::new(FEDERATION_CONFIG_LABEL, config.name_any());
        for service in self.store.list_services(ns_name, &label).await? {
            let name = service.name_any();
            if keep.contains(&name) {
                continue;
            }
            if deleted_or_absent(self.store.delete_service(ns_name, &name).await)? {
                info!("Deleted stale service {}/{}", ns_name, name);
            }
        }
        Ok(())
    }

    async fn ensure_service(&self, desired: &Service) -> Result<Ensured, StoreError> {
        if created_or_existing(self.store.create_service(desired).await)? {
            return Ok(Ensured::Created);
        }
        let namespace = desired.namespace().unwrap_or_default();
        match self.store.get_service(&namespace, &desired.name_any()).await? {
            Some(live) if !service_drifted(&live, desired) => Ok(Ensured::Unchanged),
            _ => {
                self.store.apply_service(desired).await?;
                Ok(Ensured::Updated)
            }
        }
    }

    async fn ensure_gateway(&self, desired: &Gateway) -> Result<Ensured, StoreError> {
        if created_or_existing(self.store.create_gateway(desired).await)? {
            return Ok(Ensured::Created);
        }
        let namespace = desired.namespace().unwrap_or_default();
        match self.store.get_gateway(&namespace, &desired.name_any()).await? {
            Some(live) if live.spec == desired.spec => Ok(Ensured::Unchanged),
            _ => {
                self.store.apply_gateway(desired).await?;
                Ok(Ensured::Updated)
            }
        }
    }

    async fn ensure_virtual_service(&self, desired: &VirtualService) -> Result<Ensured, StoreError> {
        if created_or_existing(self.store.create_virtual_service(desired).await)? {
            return Ok(Ensured::Created);
        }
        let namespace = desired.namespace().unwrap_or_default();
        match self
            .store
            .get_virtual_service(&namespace, &desired.name_any())
            .await?
        {
            Some(live) if live.spec == desired.spec => Ok(Ensured::Unchanged),
            _ => {
                self.store.apply_virtual_service(desired).await?;
                Ok(Ensured::Updated)
            }
        }
    }

    async fn effect_exposure_inner(
        &self,
        exposure: &ServiceExposure,
        config: &FederationConfig,
    ) -> Result<Vec<String>, StyleError> {
        // Endpoints come from the ingress service, which cannot exist without a valid port
        service_port("ingressGatewayPort", config.spec.ingress_gateway_port)?;
        let gateway = build_gateway(exposure, config)?;
        let virtual_service = build_virtual_service(exposure, config)?;
        let namespace = exposure.namespace().unwrap_or_default();
        let name = exposure.name_any();

        let ensured = self.ensure_gateway(&gateway).await?;
        log_ensured("gateway", &namespace, &name, ensured);

        match self.ensure_virtual_service(&virtual_service).await {
            Ok(ensured) => log_ensured("virtual service", &namespace, &name, ensured),
            Err(e) => {
                warn!(
                    "Failed to converge virtual service {}/{}, rolling back gateway: {}",
                    namespace, name, e
                );
                metrics::increment_rollbacks();
                if let Err(rollback_err) =
                    deleted_or_absent(self.store.delete_gateway(&namespace, &name).await)
                {
                    error!(
                        "Rollback of gateway {}/{} failed: {}",
                        namespace, name, rollback_err
                    );
                }
                return Err(e.into());
            }
        }

        self.ingress_endpoints(config).await
    }

    /// `<address>:<ingressPort>` for every load-balancer address of the
    /// config's ingress service
    async fn ingress_endpoints(&self, config: &FederationConfig) -> Result<Vec<String>, StyleError> {
        let cfg_name = config.name_any();
        let port = config.spec.ingress_gateway_port;
        let service = self
            .store
            .get_service(
                &federation_namespace_name(&cfg_name),
                &ingress_service_name(&cfg_name, port),
            )
            .await?;

        let Some(service) = service else {
            debug!("Ingress service for {} not found yet", cfg_name);
            return Ok(Vec::new());
        };

        Ok(load_balancer_endpoints(&service, port))
    }
}

#[async_trait]
impl FederationStyle for BoundaryProtection {
    fn name(&self) -> &'static str {
        STYLE_NAME
    }

    async fn effect_config(&self, config: &FederationConfig) -> Result<(), StyleError> {
        let result = self.effect_config_inner(config).await;
        metrics::increment_style_operations(STYLE_NAME, "effect_config", outcome(&result));
        result
    }

    async fn remove_config(&self, config: &FederationConfig) -> Result<(), StyleError> {
        let ns_name = federation_namespace_name(&config.name_any());
        let result = match deleted_or_absent(self.store.delete_namespace(&ns_name).await) {
            Ok(true) => {
                info!("Deleted namespace {}", ns_name);
                Ok(())
            }
            Ok(false) => {
                debug!("Namespace {} already gone", ns_name);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to delete namespace {}: {}", ns_name, e);
                Err(e.into())
            }
        };
        metrics::increment_style_operations(STYLE_NAME, "remove_config", outcome(&result));
        result
    }

    async fn effect_exposure(
        &self,
        exposure: &ServiceExposure,
        config: &FederationConfig,
    ) -> Result<Vec<String>, StyleError> {
        let result = self.effect_exposure_inner(exposure, config).await;
        metrics::increment_style_operations(STYLE_NAME, "effect_exposure", outcome(&result));
        result
    }

    async fn remove_exposure(
        &self,
        exposure: &ServiceExposure,
        _config: &FederationConfig,
    ) -> Result<(), StyleError> {
        let namespace = exposure.namespace().unwrap_or_default();
        let name = exposure.name_any();

        let vs = deleted_or_absent(self.store.delete_virtual_service(&namespace, &name).await);
        let gw = deleted_or_absent(self.store.delete_gateway(&namespace, &name).await);
        let result = match (vs, gw) {
            (Ok(_), Ok(_)) => {
                info!("Removed gateway and virtual service {}/{}", namespace, name);
                Ok(())
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(
                    "Failed to remove exposure objects {}/{}: {}",
                    namespace, name, e
                );
                Err(e.into())
            }
        };
        metrics::increment_style_operations(STYLE_NAME, "remove_exposure", outcome(&result));
        result
    }

    async fn effect_binding(
        &self,
        binding: &ServiceBinding,
        _config: &FederationConfig,
    ) -> Result<(), StyleError> {
        debug!(
            "No networking effect for binding {}/{} in boundary protection",
            binding.namespace().unwrap_or_default(),
            binding.name_any()
        );
        metrics::increment_style_operations(STYLE_NAME, "effect_binding", "success");
        Ok(())
    }

    async fn remove_binding(
        &self,
        binding: &ServiceBinding,
        _config: &FederationConfig,
    ) -> Result<(), StyleError> {
        debug!(
            "No networking effect to remove for binding {}/{}",
            binding.namespace().unwrap_or_default(),
            binding.name_any()
        );
        metrics::increment_style_operations(STYLE_NAME, "remove_binding", "success");
        Ok(())
    }
}

/// What ensuring a derived object did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ensured {
    Created,
    Updated,
    Unchanged,
}

fn log_ensured(what: &str, namespace: &str, name: &str, ensured: Ensured) {
    match ensured {
        Ensured::Created => info!("Created {} {}/{}", what, namespace, name),
        Ensured::Updated => info!("Updated drifted {} {}/{}", what, namespace, name),
        Ensured::Unchanged => debug!("{} {}/{} up to date", what, namespace, name),
    }
}

/// Compares the fields this style owns. Server-assigned fields (cluster IP,
/// node ports, a defaulted type) are ignored.
fn service_drifted(live: &Service, desired: &Service) -> bool {
    let live_spec = live.spec.clone().unwrap_or_default();
    let desired_spec = desired.spec.clone().unwrap_or_default();

    let ports = |spec: ServiceSpec| -> Vec<(Option<String>, i32, Option<IntOrString>)> {
        spec.ports
            .unwrap_or_default()
            .into_iter()
            .map(|p| (p.name, p.port, p.target_port))
            .collect()
    };

    (desired_spec.type_.is_some() && live_spec.type_ != desired_spec.type_)
        || live_spec.selector != desired_spec.selector
        || ports(live_spec) != ports(desired_spec)
}

fn outcome<T>(result: &Result<T, StyleError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) if e.is_permanent() => "rejected",
        Err(_) => "error",
    }
}

fn managed_labels(config_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string()),
        (FEDERATION_CONFIG_LABEL.to_string(), config_name.to_string()),
    ])
}

fn service_port(field: &str, port: u32) -> Result<i32, StyleError> {
    match i32::try_from(port) {
        Ok(p) if (1..=65535).contains(&p) => Ok(p),
        _ => Err(StyleError::InvalidSpec(format!(
            "{field} must be between 1 and 65535, got {port}"
        ))),
    }
}

fn tcp_port(name: &str, port: i32, target_port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(IntOrString::Int(target_port)),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

pub(crate) fn build_namespace(config: &FederationConfig) -> Namespace {
    let cfg_name = config.name_any();
    Namespace {
        metadata: ObjectMeta {
            name: Some(federation_namespace_name(&cfg_name)),
            labels: Some(managed_labels(&cfg_name)),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub(crate) fn build_egress_service(config: &FederationConfig) -> Result<Service, StyleError> {
    let cfg_name = config.name_any();
    let port = config.spec.effective_egress_port();
    let number = service_port("egressGatewayPort", port)?;

    Ok(Service {
        metadata: ObjectMeta {
            name: Some(egress_service_name(&cfg_name, port)),
            namespace: Some(federation_namespace_name(&cfg_name)),
            labels: Some(managed_labels(&cfg_name)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(vec![tcp_port("http", number, number)]),
            selector: Some(config.spec.egress_gateway_selector.clone()),
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub(crate) fn build_ingress_service(config: &FederationConfig) -> Result<Service, StyleError> {
    let cfg_name = config.name_any();
    let port = config.spec.ingress_gateway_port;
    let number = service_port("ingressGatewayPort", port)?;

    Ok(Service {
        metadata: ObjectMeta {
            name: Some(ingress_service_name(&cfg_name, port)),
            namespace: Some(federation_namespace_name(&cfg_name)),
            labels: Some(managed_labels(&cfg_name)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("LoadBalancer".to_string()),
            ports: Some(vec![
                tcp_port("https-for-cross-cluster-communication", number, number),
                tcp_port(
                    "tls-for-cross-cluster-communication",
                    CROSS_CLUSTER_TLS_PORT,
                    CROSS_CLUSTER_TLS_TARGET_PORT,
                ),
                tcp_port("tcp-1", TCP_PASSTHROUGH_PORT_1, TCP_PASSTHROUGH_PORT_1),
                tcp_port("tcp-2", TCP_PASSTHROUGH_PORT_2, TCP_PASSTHROUGH_PORT_2),
            ]),
            selector: Some(config.spec.ingress_gateway_selector.clone()),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Metadata shared by the Gateway and VirtualService of an exposure
fn exposure_object_meta(exposure: &ServiceExposure, config_name: &str) -> Result<ObjectMeta, StyleError> {
    let namespace = exposure.namespace().ok_or_else(|| {
        StyleError::InvalidSpec(format!("ServiceExposure {} has no namespace", exposure.name_any()))
    })?;

    Ok(ObjectMeta {
        name: Some(exposure.name_any()),
        namespace: Some(namespace),
        labels: Some(managed_labels(config_name)),
        owner_references: exposure.controller_owner_ref(&()).map(|owner| vec![owner]),
        ..Default::default()
    })
}

/// Exposed service name, falling back to the exposure's own name
fn target_service(exposure: &ServiceExposure) -> String {
    let name = exposure.spec.name.trim();
    if name.is_empty() {
        exposure.name_any()
    } else {
        name.to_string()
    }
}

pub(crate) fn build_gateway(
    exposure: &ServiceExposure,
    config: &FederationConfig,
) -> Result<Gateway, StyleError> {
    if !config.spec.use_egress_gateway {
        return Err(StyleError::DependencyUnsupported(format!(
            "boundary protection requires useEgressGateway on FederationConfig {}",
            config.name_any()
        )));
    }
    if config.spec.egress_gateway_selector.is_empty() {
        return Err(StyleError::DependencyUnsupported(format!(
            "FederationConfig {} has no egressGatewaySelector; attaching to an existing gateway is not supported",
            config.name_any()
        )));
    }

    let port = config.spec.effective_egress_port();
    service_port("egressGatewayPort", port)?;

    let mut gateway = Gateway::new(
        &exposure.name_any(),
        GatewaySpec {
            selector: config.spec.egress_gateway_selector.clone(),
            servers: vec![Server {
                port: ServerPort {
                    number: port,
                    name: GATEWAY_PORT_NAME.to_string(),
                    protocol: "HTTPS".to_string(),
                },
                hosts: vec!["*".to_string()],
                tls: Some(ServerTlsSettings {
                    mode: "MUTUAL".to_string(),
                    server_certificate: Some(GATEWAY_SERVER_CERTIFICATE.to_string()),
                    private_key: Some(GATEWAY_PRIVATE_KEY.to_string()),
                    ca_certificates: Some(GATEWAY_CA_CERTIFICATES.to_string()),
                }),
            }],
        },
    );
    gateway.metadata = exposure_object_meta(exposure, &config.name_any())?;
    Ok(gateway)
}

pub(crate) fn build_virtual_service(
    exposure: &ServiceExposure,
    config: &FederationConfig,
) -> Result<VirtualService, StyleError> {
    let name = exposure.name_any();
    let namespace = exposure.namespace().unwrap_or_default();
    let service = target_service(exposure);
    let host = canonical_host(&service, &namespace);
    service_port("port", exposure.spec.port)?;

    let subset = Some(exposure.spec.subset.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let mut virtual_service = VirtualService::new(
        &name,
        VirtualServiceSpec {
            hosts: vec!["*".to_string()],
            gateways: vec![name.clone()],
            http: vec![HttpRoute {
                name: Some(route_name(&service)),
                matches: vec![HttpMatchRequest {
                    uri: Some(StringMatch::Prefix(route_prefix(&namespace, &service))),
                }],
                rewrite: Some(HttpRewrite {
                    uri: Some("/".to_string()),
                    authority: Some(host.clone()),
                }),
                route: vec![HttpRouteDestination {
                    destination: Destination {
                        host,
                        subset,
                        port: Some(PortSelector {
                            number: exposure.spec.port,
                        }),
                    },
                }],
            }],
        },
    );
    virtual_service.metadata = exposure_object_meta(exposure, &config.name_any())?;
    Ok(virtual_service)
}

pub(crate) fn load_balancer_endpoints(service: &Service, port: u32) -> Vec<String> {
    service
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|ingress| {
            ingress
                .iter()
                .filter_map(|i| i.ip.as_deref().or(i.hostname.as_deref()))
                .filter(|addr| !addr.is_empty())
                .map(|addr| format!("{addr}:{port}"))
                .collect()
        })
        .unwrap_or_default()
}
