//! # CRD Generator
//!
//! Prints the FederationConfig, ServiceExposure and ServiceBinding
//! CustomResourceDefinitions as a multi-document YAML stream.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/federation.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::core::CustomResourceExt;
use mesh_federation_controller::crd::{FederationConfig, ServiceBinding, ServiceExposure};

fn main() {
    let crds = [
        FederationConfig::crd(),
        ServiceExposure::crd(),
        ServiceBinding::crd(),
    ];

    for crd in &crds {
        match serde_yaml::to_string(crd) {
            Ok(yaml) => {
                println!("---");
                print!("{yaml}");
            }
            Err(e) => {
                eprintln!("Failed to serialize CRD to YAML: {e}");
                std::process::exit(1);
            }
        }
    }
}
