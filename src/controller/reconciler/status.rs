//! # Status Management
//!
//! Condition upserts and change-gated status persistence.
//!
//! Conditions are mutated freely on an in-memory copy of the status; the
//! write to the API server only happens when the result differs from the
//! snapshot taken before the reconcile started.

use crate::controller::reconciler::store::{AutoscalerStore, StoreError};
use crate::crd::{Condition, ConditionStatus, PodAutoscaler, PodAutoscalerStatus};
use crate::observability;
use chrono::{DateTime, Utc};
use kube::ResourceExt;
use tracing::debug;

/// Condition types
pub mod condition_types {
    /// Whether the controller can read and update the target's scale
    pub const ABLE_TO_SCALE: &str = "AbleToScale";
}

/// Condition reasons
pub mod condition_reasons {
    pub const SUCCEEDED_GET_SCALE: &str = "SucceededGetScale";
    pub const FAILED_GET_SCALE: &str = "FailedGetScale";
    pub const FAILED_COMPUTE_METRICS_REPLICAS: &str = "FailedComputeMetricsReplicas";
    pub const SUCCEEDED_RESCALE: &str = "SucceededRescale";
    pub const FAILED_UPDATE_SCALE: &str = "FailedUpdateScale";
}

/// Upsert a condition by type
///
/// An existing entry is overwritten in place, keeping its position; a new type
/// is appended. `lastTransitionTime` only moves when `status` changes.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: ConditionStatus,
    reason: &str,
    message: impl Into<String>,
    now: DateTime<Utc>,
) {
    let message = Some(message.into());
    let reason = Some(reason.to_string());

    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        if existing.status != status || existing.last_transition_time.is_none() {
            existing.last_transition_time = Some(now.to_rfc3339());
        }
        existing.status = status;
        existing.reason = reason;
        existing.message = message;
        return;
    }

    conditions.push(Condition {
        r#type: condition_type.to_string(),
        status,
        last_transition_time: Some(now.to_rfc3339()),
        reason,
        message,
    });
}

/// Persist `new_status` only if it differs from `old_status`
///
/// Returns whether a write happened.
pub async fn persist_if_changed(
    store: &dyn AutoscalerStore,
    pa: &PodAutoscaler,
    old_status: &PodAutoscalerStatus,
    new_status: &PodAutoscalerStatus,
) -> Result<bool, StoreError> {
    if old_status == new_status {
        debug!(resource.name = %pa.name_any(), "status unchanged, skipping write");
        observability::metrics::increment_status_writes_skipped();
        return Ok(false);
    }

    store.persist_status(pa, new_status).await?;
    observability::metrics::increment_status_writes();
    debug!(
        resource.name = %pa.name_any(),
        actual_scale = new_status.actual_scale,
        desired_scale = new_status.desired_scale,
        "status updated"
    );
    Ok(true)
}
