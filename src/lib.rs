//! Mesh Federation Controller Library
//!
//! Reconciles multi-cluster service mesh federation intents
//! (`FederationConfig`, `ServiceExposure`, `ServiceBinding`) into namespaces,
//! services and Istio networking objects through a pluggable federation style.
//!
//! ## Quick Start
//!
//! ```rust
//! use mesh_federation_controller::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod store;
pub mod style;
