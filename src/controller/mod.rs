//! # Controller
//!
//! Core controller modules for the Mesh Federation Controller.
//!
//! - `backoff`: Fibonacci backoff for retries
//! - `reconciler`: reconcile functions for the three federation kinds
//! - `resolver`: FederationConfig selection by label selector
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod reconciler;
pub mod resolver;
pub mod server;
