//! # Custom Resource Definitions
//!
//! CRD types for the Mesh Federation Controller.
//!
//! ## Module Structure
//!
//! - `federation_config.rs` - `FederationConfig`, the federation domain policy
//! - `service_exposure.rs` - `ServiceExposure`, publish a local service
//! - `service_binding.rs` - `ServiceBinding`, consume a remote service
//! - `status.rs` - Phase and condition types shared by all three statuses
//! - `istio.rs` - Istio networking kinds synthesized as derived objects
//!
//! The three federation kinds are served under
//! [`FEDERATION_API_GROUP`](crate::constants::FEDERATION_API_GROUP) `v1`.

mod federation_config;
mod istio;
mod service_binding;
mod service_exposure;
mod status;

pub use federation_config::{FederationConfig, FederationConfigSpec, FederationConfigStatus};
pub use istio::{
    Destination, Gateway, GatewaySpec, HttpMatchRequest, HttpRewrite, HttpRoute,
    HttpRouteDestination, PortSelector, Server, ServerPort, ServerTlsSettings, StringMatch,
    VirtualService, VirtualServiceSpec,
};
pub use service_binding::{ServiceBinding, ServiceBindingSpec, ServiceBindingStatus};
pub use service_exposure::{ServiceExposure, ServiceExposureSpec, ServiceExposureStatus};
pub use status::{Condition, FederationPhase};

/// Intents that pick their FederationConfig through a label selector
pub trait FederationIntent {
    fn federation_config_selector(&self) -> &str;
}

impl FederationIntent for ServiceExposure {
    fn federation_config_selector(&self) -> &str {
        &self.spec.federation_config_selector
    }
}

impl FederationIntent for ServiceBinding {
    fn federation_config_selector(&self) -> &str {
        &self.spec.federation_config_selector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FEDERATION_API_GROUP;
    use kube::Resource;

    #[test]
    fn test_federation_kinds_share_the_api_group() {
        assert_eq!(FederationConfig::group(&()), FEDERATION_API_GROUP);
        assert_eq!(ServiceExposure::group(&()), FEDERATION_API_GROUP);
        assert_eq!(ServiceBinding::group(&()), FEDERATION_API_GROUP);
        assert_eq!(
            FederationConfig::api_version(&()),
            format!("{FEDERATION_API_GROUP}/v1")
        );
    }
}
