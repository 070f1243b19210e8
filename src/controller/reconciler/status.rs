//! # Status
//!
//! Builds the status written back to federation resources. Each reconcile
//! derives a fresh status from the previous one and patches only when
//! something other than timestamps changed, so status writes do not feed
//! back into the watch as endless updates.

use crate::crd::{
    Condition, FederationConfigStatus, FederationPhase, ServiceBindingStatus,
    ServiceExposureStatus,
};

/// Status types that carry reconcile timestamps
pub trait ReconcileStatus: Clone + PartialEq {
    /// Copy with every timestamp cleared, for change detection
    fn without_timestamps(&self) -> Self;
}

fn strip_condition_times(conditions: &mut [Condition]) {
    for condition in conditions {
        condition.last_transition_time = None;
    }
}

impl ReconcileStatus for FederationConfigStatus {
    fn without_timestamps(&self) -> Self {
        let mut status = self.clone();
        status.last_reconcile_time = None;
        strip_condition_times(&mut status.conditions);
        status
    }
}

impl ReconcileStatus for ServiceExposureStatus {
    fn without_timestamps(&self) -> Self {
        let mut status = self.clone();
        status.last_reconcile_time = None;
        strip_condition_times(&mut status.conditions);
        status
    }
}

impl ReconcileStatus for ServiceBindingStatus {
    fn without_timestamps(&self) -> Self {
        let mut status = self.clone();
        status.last_reconcile_time = None;
        strip_condition_times(&mut status.conditions);
        status
    }
}

/// True when `next` must be written
#[must_use]
pub fn status_changed<S: ReconcileStatus>(previous: Option<&S>, next: &S) -> bool {
    match previous {
        None => true,
        Some(previous) => previous.without_timestamps() != next.without_timestamps(),
    }
}

/// Ready condition for `phase`, keeping the previous transition time when the
/// condition status did not flip
#[must_use]
pub fn ready_conditions(
    previous: &[Condition],
    phase: FederationPhase,
    message: Option<&str>,
) -> Vec<Condition> {
    let mut condition = Condition::ready(phase, message);
    if let Some(prev) = previous.iter().find(|c| c.r#type == condition.r#type) {
        if prev.status == condition.status && prev.last_transition_time.is_some() {
            condition.last_transition_time = prev.last_transition_time.clone();
        }
    }
    vec![condition]
}

fn now() -> Option<String> {
    Some(chrono::Utc::now().to_rfc3339())
}

#[must_use]
pub fn config_status(
    previous: Option<&FederationConfigStatus>,
    generation: Option<i64>,
    phase: FederationPhase,
    namespace: Option<String>,
    message: Option<String>,
) -> FederationConfigStatus {
    let previous_conditions = previous.map(|s| s.conditions.as_slice()).unwrap_or_default();
    FederationConfigStatus {
        phase,
        conditions: ready_conditions(previous_conditions, phase, message.as_deref()),
        message,
        namespace,
        observed_generation: generation,
        last_reconcile_time: now(),
    }
}

#[must_use]
pub fn exposure_status(
    previous: Option<&ServiceExposureStatus>,
    generation: Option<i64>,
    phase: FederationPhase,
    endpoints: Vec<String>,
    message: Option<String>,
) -> ServiceExposureStatus {
    let previous_conditions = previous.map(|s| s.conditions.as_slice()).unwrap_or_default();
    ServiceExposureStatus {
        ready: phase == FederationPhase::Ready,
        endpoints,
        phase,
        conditions: ready_conditions(previous_conditions, phase, message.as_deref()),
        message,
        observed_generation: generation,
        last_reconcile_time: now(),
    }
}

#[must_use]
pub fn binding_status(
    previous: Option<&ServiceBindingStatus>,
    generation: Option<i64>,
    phase: FederationPhase,
    message: Option<String>,
) -> ServiceBindingStatus {
    let previous_conditions = previous.map(|s| s.conditions.as_slice()).unwrap_or_default();
    ServiceBindingStatus {
        ready: phase == FederationPhase::Ready,
        phase,
        conditions: ready_conditions(previous_conditions, phase, message.as_deref()),
        message,
        observed_generation: generation,
        last_reconcile_time: now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_status_is_always_written() {
        let next = exposure_status(None, Some(1), FederationPhase::Pending, vec![], None);
        assert!(status_changed(None, &next));
        assert!(!next.ready);
    }

    #[test]
    fn test_timestamps_alone_do_not_count_as_change() {
        let mut previous = exposure_status(
            None,
            Some(2),
            FederationPhase::Ready,
            vec!["203.0.113.7:443".into()],
            Some("exposed".into()),
        );
        previous.last_reconcile_time = Some("2020-01-01T00:00:00+00:00".into());
        previous.conditions[0].last_transition_time = Some("2020-01-01T00:00:00+00:00".into());

        let next = exposure_status(
            Some(&previous),
            Some(2),
            FederationPhase::Ready,
            vec!["203.0.113.7:443".into()],
            Some("exposed".into()),
        );
        assert!(!status_changed(Some(&previous), &next));
    }

    #[test]
    fn test_endpoint_or_generation_change_is_written() {
        let previous = exposure_status(None, Some(2), FederationPhase::Ready, vec!["a:443".into()], None);

        let moved = exposure_status(Some(&previous), Some(2), FederationPhase::Ready, vec!["b:443".into()], None);
        assert!(status_changed(Some(&previous), &moved));

        let bumped = exposure_status(Some(&previous), Some(3), FederationPhase::Ready, vec!["a:443".into()], None);
        assert!(status_changed(Some(&previous), &bumped));
    }

    #[test]
    fn test_ready_condition_keeps_transition_time_until_it_flips() {
        let mut previous = ready_conditions(&[], FederationPhase::Ready, None);
        previous[0].last_transition_time = Some("2020-01-01T00:00:00+00:00".into());

        let same = ready_conditions(&previous, FederationPhase::Ready, Some("still ready"));
        assert_eq!(
            same[0].last_transition_time.as_deref(),
            Some("2020-01-01T00:00:00+00:00")
        );

        let flipped = ready_conditions(&previous, FederationPhase::Failed, Some("broken"));
        assert_ne!(
            flipped[0].last_transition_time.as_deref(),
            Some("2020-01-01T00:00:00+00:00")
        );
        assert_eq!(flipped[0].status, "False");
    }

    #[test]
    fn test_binding_and_config_status() {
        let binding = binding_status(None, Some(4), FederationPhase::Ready, None);
        assert!(binding.ready);
        assert_eq!(binding.observed_generation, Some(4));

        let config = config_status(
            None,
            Some(1),
            FederationPhase::Failed,
            None,
            Some("invalid federation spec: ingressGatewayPort 0".into()),
        );
        assert_eq!(config.phase, FederationPhase::Failed);
        assert_eq!(config.conditions[0].reason.as_deref(), Some("ReconciliationFailed"));
    }
}
