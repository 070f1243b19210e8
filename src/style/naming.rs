//! # Derived Object Naming
//!
//! Names of derived objects are pure functions of their owner so Effect
//! operations stay idempotent and Remove can find them without an index.

use crate::constants::{CLUSTER_DOMAIN_SUFFIX, FEDERATION_PREFIX};

/// `federation-<config>`
#[must_use]
pub fn federation_namespace_name(config_name: &str) -> String {
    format!("{FEDERATION_PREFIX}-{config_name}")
}

/// `federation-<config>-egress-<port>`
#[must_use]
pub fn egress_service_name(config_name: &str, port: u32) -> String {
    format!("{FEDERATION_PREFIX}-{config_name}-egress-{port}")
}

/// `federation-<config>-ingress-<port>`
#[must_use]
pub fn ingress_service_name(config_name: &str, port: u32) -> String {
    format!("{FEDERATION_PREFIX}-{config_name}-ingress-{port}")
}

/// In-mesh hostname of a service
#[must_use]
pub fn canonical_host(service: &str, namespace: &str) -> String {
    format!("{service}.{namespace}.{CLUSTER_DOMAIN_SUFFIX}")
}

/// URI prefix remote clusters address an exposed service by
#[must_use]
pub fn route_prefix(namespace: &str, service: &str) -> String {
    format!("{namespace}/{service}")
}

#[must_use]
pub fn route_name(service: &str) -> String {
    format!("route-{service}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_federation_names() {
        assert_eq!(federation_namespace_name("east"), "federation-east");
        assert_eq!(egress_service_name("east", 443), "federation-east-egress-443");
        assert_eq!(ingress_service_name("east", 15443), "federation-east-ingress-15443");
    }

    #[test]
    fn test_route_names() {
        assert_eq!(canonical_host("orders", "shop"), "orders.shop.svc.cluster.local");
        assert_eq!(route_prefix("shop", "orders"), "shop/orders");
        assert_eq!(route_name("orders"), "route-orders");
    }
}
