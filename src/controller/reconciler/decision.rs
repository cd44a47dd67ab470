//! # Decision Path
//!
//! Reconciliation for strategies whose decision runs inside the controller.
//!
//! The target's scale is resolved fresh on every pass. Bounds are enforced
//! before the strategy is consulted, in this order:
//!
//! 1. a target at 0 replicas with `minReplicas != 0` stays at 0 (a workload
//!    deliberately scaled to zero is never woken up)
//! 2. above `maxReplicas` goes to `maxReplicas`
//! 3. below `minReplicas` goes to `minReplicas`
//! 4. otherwise the strategy decides, and its answer is clamped to the bounds

use crate::controller::events::{actions, reasons};
use crate::controller::reconciler::status::{
    condition_reasons, condition_types, persist_if_changed, set_condition,
};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::controller::scale::{apply_scale_handle, resolve_scale_handle};
use crate::crd::{ConditionStatus, PodAutoscaler, PodAutoscalerStatus};
use crate::metrics::total_value;
use crate::observability;
use crate::scaler::ScaleResult;
use chrono::{DateTime, Utc};
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use tracing::{debug, info, warn};

/// Replica count chosen for one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaDecision {
    pub desired: i32,
    /// Whether the target must be patched
    pub rescale: bool,
    /// Why the replica count changes, if it does
    pub reason: Option<String>,
}

impl ReplicaDecision {
    fn new(current: i32, desired: i32, reason: Option<String>) -> Self {
        let rescale = desired != current;
        Self {
            desired,
            rescale,
            reason: if rescale { reason } else { None },
        }
    }
}

/// Apply the bound rules that are decided without the strategy
///
/// Returns `None` when the strategy has to be consulted.
#[must_use]
pub fn bounded_decision(current: i32, min: i32, max: i32) -> Option<ReplicaDecision> {
    if current == 0 && min != 0 {
        return Some(ReplicaDecision::new(current, 0, None));
    }
    if current > max {
        return Some(ReplicaDecision::new(
            current,
            max,
            Some("Current number of replicas above Spec.MaxReplicas".to_string()),
        ));
    }
    if current < min {
        return Some(ReplicaDecision::new(
            current,
            min,
            Some("Current number of replicas below Spec.MinReplicas".to_string()),
        ));
    }
    None
}

/// Turn a strategy result into a bounded decision
///
/// Returns `None` for an invalid result.
#[must_use]
pub fn strategy_decision(
    current: i32,
    min: i32,
    max: i32,
    metric: &str,
    result: ScaleResult,
) -> Option<ReplicaDecision> {
    if !result.scale_valid {
        return None;
    }
    let desired = result.desired_pod_count.max(0).clamp(min.min(max), max);
    let reason = match desired.cmp(&current) {
        std::cmp::Ordering::Greater => Some(format!("{metric} above target")),
        std::cmp::Ordering::Less => Some("All metrics below target".to_string()),
        std::cmp::Ordering::Equal => None,
    };
    Some(ReplicaDecision::new(current, desired, reason))
}

/// Total of the target metric over the target's pods
async fn observe_metric(ctx: &Reconciler, pa: &PodAutoscaler, namespace: &str) -> Option<f64> {
    let spec = &pa.spec;
    match ctx
        .metrics_client
        .get_object_metric(
            &spec.target_metric,
            namespace,
            &spec.scale_target_ref.name,
            spec.effective_metrics_port(),
        )
        .await
    {
        Ok((info, _)) => total_value(&info),
        Err(e) => {
            debug!(error = %e, metric = %spec.target_metric, "no metric value available");
            None
        }
    }
}

/// Persist status changes made before an error and hand the error back
async fn fail_with(
    ctx: &Reconciler,
    pa: &PodAutoscaler,
    old_status: &PodAutoscalerStatus,
    status: &PodAutoscalerStatus,
    error: ReconcilerError,
) -> Result<Action, ReconcilerError> {
    if let Err(e) = persist_if_changed(ctx.store.as_ref(), pa, old_status, status).await {
        warn!(error = %e, "failed to record failure in status");
    }
    Err(error)
}

/// Reconcile a PodAutoscaler whose strategy is evaluated by this controller
pub async fn reconcile_decision(
    ctx: &Reconciler,
    pa: &PodAutoscaler,
    now: DateTime<Utc>,
) -> Result<Action, ReconcilerError> {
    let namespace = pa.namespace().unwrap_or_default();
    let target = &pa.spec.scale_target_ref;
    let object_ref = pa.object_ref(&());
    let old_status = pa.status.clone().unwrap_or_default();
    let mut status = old_status.clone();

    let handle = match resolve_scale_handle(
        ctx.scale_client.as_ref(),
        &target.kind,
        &target.api_version,
        &namespace,
        &target.name,
    )
    .await
    {
        Ok(handle) => handle,
        Err(e) => {
            let message = format!("the controller was unable to get the target's current scale: {e}");
            ctx.events
                .publish(
                    &object_ref,
                    EventType::Warning,
                    reasons::FAILED_GET_SCALE,
                    actions::GET_SCALE,
                    Some(e.to_string()),
                )
                .await;
            set_condition(
                &mut status.conditions,
                condition_types::ABLE_TO_SCALE,
                ConditionStatus::False,
                condition_reasons::FAILED_GET_SCALE,
                message,
                now,
            );
            return fail_with(ctx, pa, &old_status, &status, ReconcilerError::Resolution(e)).await;
        }
    };

    set_condition(
        &mut status.conditions,
        condition_types::ABLE_TO_SCALE,
        ConditionStatus::True,
        condition_reasons::SUCCEEDED_GET_SCALE,
        "the controller was able to get the target's current scale",
        now,
    );

    let current = handle.spec_replicas;
    let min = pa.spec.effective_min_replicas();
    let max = pa.spec.max_replicas;

    let decision = if let Some(decision) = bounded_decision(current, min, max) {
        decision
    } else {
        let result = match observe_metric(ctx, pa, &namespace).await {
            Some(observed) => ctx.scalers.scale(pa, current, observed, now),
            None => ScaleResult::invalid(),
        };
        let Some(decision) = strategy_decision(current, min, max, &pa.spec.target_metric, result)
        else {
            let message = format!(
                "the controller was unable to compute the replica count for {}",
                pa.spec.target_metric
            );
            status.actual_scale = current;
            set_condition(
                &mut status.conditions,
                condition_types::ABLE_TO_SCALE,
                ConditionStatus::False,
                condition_reasons::FAILED_COMPUTE_METRICS_REPLICAS,
                message.clone(),
                now,
            );
            ctx.events
                .publish(
                    &object_ref,
                    EventType::Warning,
                    reasons::FAILED_COMPUTE_METRICS_REPLICAS,
                    actions::COMPUTE_REPLICAS,
                    Some(message.clone()),
                )
                .await;
            return fail_with(ctx, pa, &old_status, &status, ReconcilerError::Decision(message))
                .await;
        };
        decision
    };

    status.actual_scale = current;

    if decision.rescale {
        let reason = decision.reason.clone().unwrap_or_default();
        if let Err(e) = apply_scale_handle(ctx.scale_client.as_ref(), &handle, decision.desired).await {
            ctx.events
                .publish(
                    &object_ref,
                    EventType::Warning,
                    reasons::FAILED_RESCALE,
                    actions::RESCALE,
                    Some(format!(
                        "New size: {}; reason: {reason}; error: {e}",
                        decision.desired
                    )),
                )
                .await;
            set_condition(
                &mut status.conditions,
                condition_types::ABLE_TO_SCALE,
                ConditionStatus::False,
                condition_reasons::FAILED_UPDATE_SCALE,
                format!("the controller was unable to update the target scale: {e}"),
                now,
            );
            return fail_with(ctx, pa, &old_status, &status, ReconcilerError::Apply(e)).await;
        }

        ctx.events
            .publish(
                &object_ref,
                EventType::Normal,
                reasons::SUCCESSFUL_RESCALE,
                actions::RESCALE,
                Some(format!(
                    "Old size: {current}; new size: {}; reason: {reason}",
                    decision.desired
                )),
            )
            .await;
        // Set on the success branch only; a failed apply leaves False above.
        set_condition(
            &mut status.conditions,
            condition_types::ABLE_TO_SCALE,
            ConditionStatus::True,
            condition_reasons::SUCCEEDED_RESCALE,
            format!("the controller was able to update the target scale to {}", decision.desired),
            now,
        );
        status.last_scale_time = Some(now.to_rfc3339());
        observability::metrics::increment_rescales(if decision.desired > current {
            "up"
        } else {
            "down"
        });
        info!(
            current_replicas = current,
            desired_replicas = decision.desired,
            reason = %reason,
            target = %handle.resource,
            "successfully rescaled"
        );
    }

    status.desired_scale = decision.desired;

    if let Err(e) = persist_if_changed(ctx.store.as_ref(), pa, &old_status, &status).await {
        ctx.events
            .publish(
                &object_ref,
                EventType::Warning,
                reasons::FAILED_UPDATE_STATUS,
                actions::UPDATE_STATUS,
                Some(e.to_string()),
            )
            .await;
        return Err(ReconcilerError::Status(e));
    }

    observability::metrics::increment_requeues_total("decision-resync");
    Ok(Action::requeue(ctx.config.decision_resync()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_replicas_stay_at_zero() {
        let decision = bounded_decision(0, 1, 10).unwrap();
        assert_eq!(decision.desired, 0);
        assert!(!decision.rescale);
    }

    #[test]
    fn test_zero_min_consults_strategy() {
        assert_eq!(bounded_decision(0, 0, 10), None);
    }

    #[test]
    fn test_above_max_goes_to_max() {
        let decision = bounded_decision(12, 1, 10).unwrap();
        assert_eq!(decision.desired, 10);
        assert!(decision.rescale);
    }

    #[test]
    fn test_below_min_goes_to_min() {
        let decision = bounded_decision(1, 3, 10).unwrap();
        assert_eq!(decision.desired, 3);
        assert!(decision.rescale);
    }

    #[test]
    fn test_in_bounds_consults_strategy() {
        assert_eq!(bounded_decision(5, 1, 10), None);
    }

    #[test]
    fn test_invalid_result_yields_no_decision() {
        assert_eq!(strategy_decision(3, 1, 10, "tps", ScaleResult::invalid()), None);
    }

    #[test]
    fn test_reason_tagging() {
        let up = strategy_decision(3, 1, 10, "tps", ScaleResult::valid(5)).unwrap();
        assert_eq!(up.reason.as_deref(), Some("tps above target"));

        let down = strategy_decision(3, 1, 10, "tps", ScaleResult::valid(2)).unwrap();
        assert_eq!(down.reason.as_deref(), Some("All metrics below target"));

        let same = strategy_decision(3, 1, 10, "tps", ScaleResult::valid(3)).unwrap();
        assert_eq!(same.reason, None);
        assert!(!same.rescale);
    }

    #[test]
    fn test_strategy_answer_is_clamped() {
        assert_eq!(
            strategy_decision(5, 2, 10, "tps", ScaleResult::valid(50)).unwrap().desired,
            10
        );
        assert_eq!(
            strategy_decision(5, 2, 10, "tps", ScaleResult::valid(-4)).unwrap().desired,
            2
        );
        assert_eq!(
            strategy_decision(5, 0, 10, "tps", ScaleResult::valid(-4)).unwrap().desired,
            0
        );
    }

    #[test]
    fn test_desired_always_within_bounds() {
        for min in 0..4 {
            for max in min..8 {
                for current in 0..12 {
                    for proposed in -2..15 {
                        let desired = bounded_decision(current, min, max)
                            .or_else(|| {
                                strategy_decision(current, min, max, "m", ScaleResult::valid(proposed))
                            })
                            .unwrap()
                            .desired;
                        if current == 0 && min != 0 {
                            assert_eq!(desired, 0);
                        } else {
                            assert!(
                                (min..=max).contains(&desired),
                                "current={current} min={min} max={max} proposed={proposed} desired={desired}"
                            );
                        }
                    }
                }
            }
        }
    }
}
