//! # Mesh Federation Controller
//!
//! A Kubernetes controller that reconciles multi-cluster service mesh
//! federation intents into Istio networking objects.
//!
//! ## Overview
//!
//! - **FederationConfig** - one federation domain: gateway selectors, ports
//!   and whether traffic leaves through an egress gateway
//! - **ServiceExposure** - publish a local service to other clusters
//! - **ServiceBinding** - consume a service another cluster exposes
//!
//! How an intent becomes networking objects is decided by the federation
//! style chosen at start-up (`--federation-style`, currently only
//! `boundary-protection`).

use anyhow::Result;
use clap::Parser;
use mesh_federation_controller::config::ControllerConfig;
use mesh_federation_controller::runtime;
use mesh_federation_controller::style::StyleKind;

/// Mesh Federation Controller
#[derive(Parser, Debug)]
#[command(name = "mesh-federation-controller", version, long_about = None)]
struct Args {
    /// Federation style used to realize intents
    #[arg(long, env = "FEDERATION_STYLE")]
    federation_style: Option<StyleKind>,

    /// Port for /metrics, /healthz and /readyz
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ControllerConfig::from_env()?;
    if let Some(style) = args.federation_style {
        config.federation_style = style;
    }
    if let Some(port) = args.metrics_port {
        config.metrics_port = port;
    }

    runtime::run(config).await
}
