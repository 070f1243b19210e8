//! # Runtime
//!
//! Process-level wiring around the reconcilers.
//!
//! - `initialization`: logging, metrics, probe server, client and context
//! - `error_policy`: requeue decisions for failed reconciles
//! - `watch_loop`: the kube-runtime controllers

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

use crate::config::ControllerConfig;
use anyhow::Result;

/// Initialize and run until shutdown
pub async fn run(config: ControllerConfig) -> Result<()> {
    let init = initialization::initialize(config).await?;
    watch_loop::run_watch_loop(init.client, init.reconciler, init.server_state).await
}
