//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! Defaults in the first block can be overridden via environment variables
//! (see [`crate::config::ControllerConfig`]). The boundary-protection port
//! numbers further down are protocol-level constants and are never configurable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default requeue interval after an optimistic-concurrency conflict (seconds)
pub const DEFAULT_CONFLICT_REQUEUE_SECS: u64 = 1;

/// Default requeue interval while waiting for the ingress address (seconds)
pub const DEFAULT_PENDING_REQUEUE_SECS: u64 = 30;

/// Fibonacci backoff lower bound for failed reconciliations (minutes)
pub const DEFAULT_BACKOFF_MIN_MINUTES: u64 = 1;

/// Fibonacci backoff upper bound for failed reconciliations (minutes)
pub const DEFAULT_BACKOFF_MAX_MINUTES: u64 = 10;

/// Federation style used when none is configured
pub const DEFAULT_FEDERATION_STYLE: &str = "boundary-protection";

/// Label selector naming the deployment default FederationConfig.
/// Used when an intent carries an empty selector.
pub const DEFAULT_CONFIG_SELECTOR: &str = "federation.mesh.io/default=true";

/// API group of the federation custom resources
pub const FEDERATION_API_GROUP: &str = "federation.mesh.io";

/// Finalizer placed on every federation intent the controller manages
pub const FEDERATION_FINALIZER: &str = "federation.mesh.io/cleanup";

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "mesh-federation-controller";

/// `app.kubernetes.io/managed-by` value stamped on derived objects
pub const MANAGED_BY: &str = "mesh-federation-controller";

/// Prefix of every derived federation namespace and service
pub const FEDERATION_PREFIX: &str = "federation";

/// Cluster-local DNS suffix of in-mesh service hostnames
pub const CLUSTER_DOMAIN_SUFFIX: &str = "svc.cluster.local";

/// Egress gateway port used when a FederationConfig leaves it at 0
pub const DEFAULT_GATEWAY_PORT: u32 = 443;

/// Cross-cluster mutual TLS port exposed on the ingress service
pub const CROSS_CLUSTER_TLS_PORT: i32 = 15444;

/// Gateway container port the mutual TLS port forwards to
pub const CROSS_CLUSTER_TLS_TARGET_PORT: i32 = 15443;

/// First fixed TCP passthrough port
pub const TCP_PASSTHROUGH_PORT_1: i32 = 31400;

/// Second fixed TCP passthrough port
pub const TCP_PASSTHROUGH_PORT_2: i32 = 31401;

/// Certificate paths mounted into the gateway proxy
pub const GATEWAY_SERVER_CERTIFICATE: &str = "/etc/istio/certs/tls.crt";
pub const GATEWAY_PRIVATE_KEY: &str = "/etc/istio/certs/tls.key";
pub const GATEWAY_CA_CERTIFICATES: &str = "/etc/istio/certs/ca.crt";

/// Label key marking objects created by this controller
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Label key naming the FederationConfig a derived object belongs to
pub const FEDERATION_CONFIG_LABEL: &str = "federation.mesh.io/config";

/// Istio Gateway server port name used for exposures
pub const GATEWAY_PORT_NAME: &str = "https-meshfed-port";
