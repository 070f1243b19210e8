//! # ServiceExposure
//!
//! Intent to make a local workload reachable from other clusters.

use crate::crd::{Condition, FederationPhase};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ServiceExposure Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: federation.mesh.io/v1
/// kind: ServiceExposure
/// metadata:
///   name: orders
///   namespace: shop
/// spec:
///   name: orders
///   subset: v1
///   port: 8080
///   federationConfigSelector: team=east
/// ```
#[derive(kube::CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "ServiceExposure",
    group = "federation.mesh.io",
    version = "v1",
    namespaced,
    status = "ServiceExposureStatus",
    shortname = "svcexp",
    printcolumn = r#"{"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}, {"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Endpoints", "type":"string", "jsonPath":".status.endpoints"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceExposureSpec {
    /// Name of the local service to expose
    pub name: String,
    /// Mesh subset (DestinationRule subset) receiving the traffic
    #[serde(default)]
    pub subset: String,
    /// Service port receiving the traffic
    pub port: u32,
    /// `key=value` label selector of the FederationConfig to use.
    /// Empty selects the deployment default.
    #[serde(default)]
    pub federation_config_selector: String,
}

/// Status of the ServiceExposure resource
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceExposureStatus {
    /// True once the gateway and route exist and an external address is known
    #[serde(default)]
    pub ready: bool,
    /// Externally reachable endpoints (`address:port`)
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub phase: FederationPhase,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
    #[serde(default)]
    pub last_reconcile_time: Option<String>,
}
