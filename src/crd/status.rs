//! # Status Types
//!
//! Phase and condition types shared by the federation resource statuses.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse lifecycle phase reported on every federation resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
pub enum FederationPhase {
    /// Reconciliation has not finished yet (or is waiting on an external allocation)
    #[default]
    Pending,
    /// The desired networking state is in place
    Ready,
    /// The last reconciliation failed; see `message`
    Failed,
}

impl FederationPhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FederationPhase::Pending => "Pending",
            FederationPhase::Ready => "Ready",
            FederationPhase::Failed => "Failed",
        }
    }

    /// Reason recorded on the `Ready` condition for this phase
    #[must_use]
    pub fn condition_reason(&self) -> &'static str {
        match self {
            FederationPhase::Pending => "ReconciliationInProgress",
            FederationPhase::Ready => "ReconciliationSucceeded",
            FederationPhase::Failed => "ReconciliationFailed",
        }
    }
}

impl fmt::Display for FederationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition represents a status condition for the resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing condition
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    /// Build the `Ready` condition matching a phase
    #[must_use]
    pub fn ready(phase: FederationPhase, message: Option<&str>) -> Self {
        Self {
            r#type: "Ready".to_string(),
            status: if phase == FederationPhase::Ready {
                "True".to_string()
            } else {
                "False".to_string()
            },
            last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
            reason: Some(phase.condition_reason().to_string()),
            message: message.map(str::to_string),
        }
    }
}
