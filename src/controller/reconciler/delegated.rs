//! # Delegated Path
//!
//! `HPA` PodAutoscalers are served by a mirrored `HorizontalPodAutoscaler`
//! owned by the PodAutoscaler. The built-in HPA controller makes the
//! decision; this controller keeps the mirror in sync with the spec and
//! copies the mirror's observations back into the PodAutoscaler status.

use crate::controller::events::{actions, reasons};
use crate::controller::reconciler::status::{condition_types, persist_if_changed, set_condition};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::{ConditionStatus, PodAutoscaler, PodAutoscalerStatus};
use chrono::{DateTime, Utc};
use k8s_openapi::api::autoscaling::v2::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec,
    HorizontalPodAutoscalerStatus, MetricIdentifier, MetricSpec, MetricTarget, PodsMetricSource,
    ResourceMetricSource,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Label put on every mirror HPA
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Metric spec for the mirror HPA
///
/// `cpu` and `memory` become resource utilization targets; anything else is
/// treated as a per-pod custom metric with an average value target.
#[must_use]
pub fn metric_spec(target_metric: &str, target_value: f64) -> MetricSpec {
    #[allow(clippy::cast_possible_truncation, reason = "utilization is a percentage")]
    let utilization = target_value.round() as i32;
    match target_metric {
        "cpu" | "memory" => MetricSpec {
            type_: "Resource".to_string(),
            resource: Some(ResourceMetricSource {
                name: target_metric.to_string(),
                target: MetricTarget {
                    type_: "Utilization".to_string(),
                    average_utilization: Some(utilization),
                    ..MetricTarget::default()
                },
            }),
            ..MetricSpec::default()
        },
        _ => MetricSpec {
            type_: "Pods".to_string(),
            pods: Some(PodsMetricSource {
                metric: MetricIdentifier {
                    name: target_metric.to_string(),
                    selector: None,
                },
                target: MetricTarget {
                    type_: "AverageValue".to_string(),
                    average_value: Some(quantity(target_value)),
                    ..MetricTarget::default()
                },
            }),
            ..MetricSpec::default()
        },
    }
}

/// Render a target value as a Kubernetes quantity, using milli-units for fractions
#[allow(clippy::cast_possible_truncation, reason = "targets are far below i64 range")]
fn quantity(value: f64) -> Quantity {
    if value.fract() == 0.0 {
        Quantity(format!("{}", value as i64))
    } else {
        Quantity(format!("{}m", (value * 1000.0).round() as i64))
    }
}

/// Build the mirror HPA for a PodAutoscaler
#[must_use]
pub fn make_hpa(pa: &PodAutoscaler, field_manager: &str) -> HorizontalPodAutoscaler {
    let target = &pa.spec.scale_target_ref;
    HorizontalPodAutoscaler {
        metadata: ObjectMeta {
            name: Some(pa.name_any()),
            namespace: pa.namespace(),
            labels: Some(BTreeMap::from([(
                MANAGED_BY_LABEL.to_string(),
                field_manager.to_string(),
            )])),
            owner_references: pa.controller_owner_ref(&()).map(|owner| vec![owner]),
            ..ObjectMeta::default()
        },
        spec: Some(HorizontalPodAutoscalerSpec {
            scale_target_ref: CrossVersionObjectReference {
                api_version: Some(target.api_version.clone()),
                kind: target.kind.clone(),
                name: target.name.clone(),
            },
            min_replicas: Some(pa.spec.effective_min_replicas()),
            max_replicas: pa.spec.max_replicas,
            metrics: Some(vec![metric_spec(&pa.spec.target_metric, pa.spec.target_value)]),
            behavior: None,
        }),
        status: None,
    }
}

/// Copy the mirror's observations into the PodAutoscaler status
pub fn mirror_status(
    status: &mut PodAutoscalerStatus,
    hpa_status: &HorizontalPodAutoscalerStatus,
    now: DateTime<Utc>,
) {
    status.actual_scale = hpa_status.current_replicas.unwrap_or_default();
    status.desired_scale = hpa_status.desired_replicas;
    if let Some(time) = &hpa_status.last_scale_time {
        status.last_scale_time = Some(time.0.to_rfc3339());
    }

    let able_to_scale = hpa_status
        .conditions
        .iter()
        .flatten()
        .find(|c| c.type_ == condition_types::ABLE_TO_SCALE);
    if let Some(condition) = able_to_scale {
        set_condition(
            &mut status.conditions,
            condition_types::ABLE_TO_SCALE,
            ConditionStatus::from_k8s(&condition.status),
            condition.reason.as_deref().unwrap_or_default(),
            condition.message.clone().unwrap_or_default(),
            now,
        );
    }
}

/// Reconcile a PodAutoscaler that delegates to an HPA
pub async fn reconcile_hpa(
    ctx: &Reconciler,
    pa: &PodAutoscaler,
    now: DateTime<Utc>,
) -> Result<Action, ReconcilerError> {
    let hpa = make_hpa(pa, &ctx.config.field_manager);

    let applied = match ctx.store.apply_hpa(&hpa).await {
        Ok(applied) => applied,
        Err(e) => {
            ctx.events
                .publish(
                    &pa.object_ref(&()),
                    EventType::Warning,
                    reasons::FAILED_APPLY_HPA,
                    actions::APPLY_HPA,
                    Some(e.to_string()),
                )
                .await;
            return Err(ReconcilerError::Kube(e));
        }
    };
    debug!(hpa = %applied.name_any(), "mirror HPA applied");

    let old_status = pa.status.clone().unwrap_or_default();
    let mut status = old_status.clone();
    if let Some(hpa_status) = &applied.status {
        mirror_status(&mut status, hpa_status, now);
    }

    if let Err(e) = persist_if_changed(ctx.store.as_ref(), pa, &old_status, &status).await {
        warn!(error = %e, "failed to mirror HPA status");
        return Err(ReconcilerError::Status(e));
    }

    // Mirror status changes arrive through the owned-HPA watch
    Ok(Action::await_change())
}
