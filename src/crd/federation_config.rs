//! # FederationConfig
//!
//! One federation domain's networking policy.

use crate::constants::DEFAULT_GATEWAY_PORT;
use crate::crd::{Condition, FederationPhase};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// FederationConfig Custom Resource Definition
///
/// Describes how this cluster participates in a federation domain: which
/// gateway workloads front cross-cluster traffic and on which ports.
/// Intents select a FederationConfig through its labels.
///
/// # Example
///
/// ```yaml
/// apiVersion: federation.mesh.io/v1
/// kind: FederationConfig
/// metadata:
///   name: east
///   namespace: mesh-system
///   labels:
///     team: east
/// spec:
///   useEgressGateway: true
///   egressGatewaySelector:
///     app: egressgw
///   egressGatewayPort: 443
///   ingressGatewaySelector:
///     app: ingressgw
///   ingressGatewayPort: 443
/// ```
#[derive(kube::CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "FederationConfig",
    group = "federation.mesh.io",
    version = "v1",
    namespaced,
    status = "FederationConfigStatus",
    shortname = "fedcfg",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Namespace", "type":"string", "jsonPath":".status.namespace"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct FederationConfigSpec {
    /// Informational federation mode (e.g. "boundary"). The active style is
    /// chosen at deployment time, not per resource.
    #[serde(default)]
    pub mode: Option<String>,
    /// Route exposed traffic through a dedicated egress gateway
    #[serde(default)]
    pub use_egress_gateway: bool,
    /// Pod labels of the ingress gateway workload
    #[serde(default)]
    pub ingress_gateway_selector: BTreeMap<String, String>,
    /// Port the ingress gateway accepts cross-cluster traffic on
    #[serde(default)]
    pub ingress_gateway_port: u32,
    /// Pod labels of the egress gateway workload
    #[serde(default)]
    pub egress_gateway_selector: BTreeMap<String, String>,
    /// Port the egress gateway terminates mutual TLS on (0 means 443)
    #[serde(default)]
    pub egress_gateway_port: u32,
    /// Labels of the Secret holding TLS material for the gateways
    #[serde(default)]
    pub tls_context_selector: BTreeMap<String, String>,
}

impl FederationConfigSpec {
    /// Egress port with the protocol default applied
    #[must_use]
    pub fn effective_egress_port(&self) -> u32 {
        if self.egress_gateway_port == 0 {
            DEFAULT_GATEWAY_PORT
        } else {
            self.egress_gateway_port
        }
    }
}

/// Status of the FederationConfig resource
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FederationConfigStatus {
    /// Current phase
    #[serde(default)]
    pub phase: FederationPhase,
    /// Human-readable description of the phase
    #[serde(default)]
    pub message: Option<String>,
    /// Dedicated namespace holding this domain's gateway services
    #[serde(default)]
    pub namespace: Option<String>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Observed generation
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Last reconciliation time
    #[serde(default)]
    pub last_reconcile_time: Option<String>,
}
