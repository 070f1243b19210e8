//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use mesh_federation_controller::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Store and style seams
pub use crate::store::{
    FederationConfigLister, IntentKind, IntentResource, KubeStore, LabelMatch, MeshStore,
    StoreError,
};
pub use crate::style::{
    BoundaryProtection, CertificateSource, FederationStyle, StyleError, StyleKind,
    UnprovisionedCertificates,
};

// Reconciler types
pub use crate::controller::reconciler::{
    reconcile_federation_config, reconcile_service_binding, reconcile_service_exposure,
    Reconciler, ReconcilerError,
};
pub use crate::controller::resolver::{resolve, ResolveError};

pub use crate::config::ControllerConfig;
