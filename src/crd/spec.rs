//! # PodAutoscaler Spec
//!
//! Main CRD specification types and default values.

use crate::constants::{DEFAULT_METRICS_CONTAINER_PORT, DEFAULT_MIN_REPLICAS};
use serde::{Deserialize, Serialize};

/// PodAutoscaler Custom Resource Definition
///
/// Declares which workload to scale, the replica bounds, and which strategy
/// decides the replica count. The target may be any resource kind that
/// serves the `scale` subresource.
///
/// # Example
///
/// ```yaml
/// apiVersion: autoscaling.aibrix.ai/v1alpha1
/// kind: PodAutoscaler
/// metadata:
///   name: llama-70b
///   namespace: default
/// spec:
///   scaleTargetRef:
///     apiVersion: apps/v1
///     kind: Deployment
///     name: llama-70b
///   minReplicas: 1
///   maxReplicas: 10
///   targetMetric: avg_generation_throughput_toks_per_s
///   targetValue: 40
///   scalingStrategy: KPA
/// ```
#[derive(kube::CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "PodAutoscaler",
    group = "autoscaling.aibrix.ai",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::PodAutoscalerStatus",
    shortname = "pa",
    printcolumn = r#"{"name":"Strategy", "type":"string", "jsonPath":".spec.scalingStrategy"}, {"name":"Min", "type":"integer", "jsonPath":".spec.minReplicas"}, {"name":"Max", "type":"integer", "jsonPath":".spec.maxReplicas"}, {"name":"Actual", "type":"integer", "jsonPath":".status.actualScale"}, {"name":"Desired", "type":"integer", "jsonPath":".status.desiredScale"}, {"name":"AbleToScale", "type":"string", "jsonPath":".status.conditions[?(@.type==\"AbleToScale\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PodAutoscalerSpec {
    /// Workload whose replica count is driven by this autoscaler
    pub scale_target_ref: ScaleTargetRef,
    /// Lower replica bound. Defaults to 1 when omitted.
    /// A value of 0 allows the controller to wake a workload that was scaled to zero.
    #[serde(default)]
    pub min_replicas: Option<i32>,
    /// Upper replica bound. Must be >= the effective minReplicas.
    pub max_replicas: i32,
    /// Metric the strategy scales on (e.g. "cpu", "avg_generation_throughput_toks_per_s")
    pub target_metric: String,
    /// Per-replica target value for `targetMetric`
    pub target_value: f64,
    /// Container port the target metric is exposed on
    #[serde(default)]
    pub metrics_port: Option<i32>,
    /// Strategy that decides the replica count: HPA, KPA or APA
    /// Kept as a string so that an unknown value fails the reconcile rather than the watch
    pub scaling_strategy: String,
}

/// Reference to the scaled workload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScaleTargetRef {
    /// Kind of the target (e.g. "Deployment", "StatefulSet", or a custom kind)
    pub kind: String,
    /// API group/version of the target (e.g. "apps/v1")
    pub api_version: String,
    /// Name of the target in the autoscaler's namespace
    pub name: String,
}

impl PodAutoscalerSpec {
    /// minReplicas with the default applied
    #[must_use]
    pub fn effective_min_replicas(&self) -> i32 {
        self.min_replicas.unwrap_or(DEFAULT_MIN_REPLICAS)
    }

    /// metricsPort with the default applied
    #[must_use]
    pub fn effective_metrics_port(&self) -> i32 {
        self.metrics_port.unwrap_or(DEFAULT_METRICS_CONTAINER_PORT)
    }
}
