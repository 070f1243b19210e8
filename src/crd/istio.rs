//! # Istio Networking Types
//!
//! Minimal typed views of `networking.istio.io/v1alpha3` Gateway and
//! VirtualService, restricted to the fields the federation styles write.
//! Unknown fields written by other controllers are not round-tripped, so
//! these types are only used for create/delete, never for updates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Istio Gateway
#[derive(kube::CustomResource, Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[kube(
    kind = "Gateway",
    group = "networking.istio.io",
    version = "v1alpha3",
    namespaced,
    schema = "disabled"
)]
pub struct GatewaySpec {
    /// Labels of the gateway proxy pods this configuration applies to
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
    #[serde(default)]
    pub servers: Vec<Server>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Server {
    pub port: ServerPort,
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<ServerTlsSettings>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ServerPort {
    pub number: u32,
    pub name: String,
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTlsSettings {
    /// SIMPLE, MUTUAL, PASSTHROUGH, ...
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_certificates: Option<String>,
}

/// Istio VirtualService
#[derive(kube::CustomResource, Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[kube(
    kind = "VirtualService",
    group = "networking.istio.io",
    version = "v1alpha3",
    namespaced,
    schema = "disabled"
)]
pub struct VirtualServiceSpec {
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub gateways: Vec<String>,
    #[serde(default)]
    pub http: Vec<HttpRoute>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct HttpRoute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "match")]
    pub matches: Vec<HttpMatchRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<HttpRewrite>,
    #[serde(default)]
    pub route: Vec<HttpRouteDestination>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct HttpMatchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<StringMatch>,
}

/// Istio string match; only one variant is set at a time
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StringMatch {
    Exact(String),
    Prefix(String),
    Regex(String),
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct HttpRewrite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct HttpRouteDestination {
    pub destination: Destination,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Destination {
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<PortSelector>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct PortSelector {
    pub number: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_match_serializes_as_single_key_object() {
        let json = serde_json::to_value(StringMatch::Prefix("shop/orders".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"prefix": "shop/orders"}));
    }

    #[test]
    fn test_http_route_uses_istio_field_names() {
        let route = HttpRoute {
            name: Some("route-orders".to_string()),
            matches: vec![HttpMatchRequest {
                uri: Some(StringMatch::Prefix("shop/orders".to_string())),
            }],
            rewrite: None,
            route: vec![HttpRouteDestination {
                destination: Destination {
                    host: "orders.shop.svc.cluster.local".to_string(),
                    subset: Some("v1".to_string()),
                    port: Some(PortSelector { number: 8080 }),
                },
            }],
        };

        let json = serde_json::to_value(&route).unwrap();
        assert_eq!(json["match"][0]["uri"]["prefix"], "shop/orders");
        assert_eq!(json["route"][0]["destination"]["port"]["number"], 8080);
        assert!(json.get("rewrite").is_none());
    }

    #[test]
    fn test_tls_settings_use_camel_case() {
        let tls = ServerTlsSettings {
            mode: "MUTUAL".to_string(),
            server_certificate: Some("/certs/tls.crt".to_string()),
            private_key: None,
            ca_certificates: None,
        };
        let json = serde_json::to_value(&tls).unwrap();
        assert_eq!(json["serverCertificate"], "/certs/tls.crt");
        assert!(json.get("privateKey").is_none());
    }
}
