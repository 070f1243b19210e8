//! # ServiceBinding
//!
//! Intent to consume a service exposed by a remote federation domain.

use crate::crd::{Condition, FederationPhase};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ServiceBinding Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: federation.mesh.io/v1
/// kind: ServiceBinding
/// metadata:
///   name: orders
///   namespace: checkout
/// spec:
///   name: orders
///   namespace: shop
///   port: 8080
///   federationConfigSelector: team=west
/// ```
#[derive(kube::CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "ServiceBinding",
    group = "federation.mesh.io",
    version = "v1",
    namespaced,
    status = "ServiceBindingStatus",
    shortname = "svcbind",
    printcolumn = r#"{"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}, {"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingSpec {
    /// Name of the remote exposed service
    pub name: String,
    /// Namespace of the remote exposed service
    #[serde(default)]
    pub namespace: Option<String>,
    /// Port of the remote exposed service
    #[serde(default)]
    pub port: Option<u32>,
    /// Local alias under which the remote service should be reachable
    #[serde(default)]
    pub alias: Option<String>,
    /// `key=value` label selector of the FederationConfig to use.
    /// Empty selects the deployment default.
    #[serde(default)]
    pub federation_config_selector: String,
}

/// Status of the ServiceBinding resource
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingStatus {
    #[serde(default)]
    pub ready: bool,
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
