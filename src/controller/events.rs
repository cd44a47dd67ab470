//! # Events
//!
//! Kubernetes Event recording for PodAutoscaler reconciliation.
//!
//! Events are fire-and-forget: failures are logged as warnings and never
//! propagate into the reconcile result.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Publishes Kubernetes Events on behalf of the reconciler
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event on the given object
    ///
    /// * `reason` - machine-readable reason (see [`reasons`])
    /// * `action` - what the controller was doing (see [`actions`])
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Production publisher wrapping `kube::runtime::events::Recorder`
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    #[must_use]
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

impl std::fmt::Debug for KubeEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventPublisher").finish_non_exhaustive()
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(reason, action, error = %e, "Failed to publish Kubernetes event");
        }
    }
}

/// Event reasons, shown under REASON in `kubectl get events`
pub mod reasons {
    pub const SUCCESSFUL_RESCALE: &str = "SuccessfulRescale";
    pub const FAILED_RESCALE: &str = "FailedRescale";
    pub const FAILED_GET_SCALE: &str = "FailedGetScale";
    pub const FAILED_COMPUTE_METRICS_REPLICAS: &str = "FailedComputeMetricsReplicas";
    pub const FAILED_UPDATE_STATUS: &str = "FailedUpdateStatus";
    pub const FAILED_APPLY_HPA: &str = "FailedApplyHPA";
}

/// Event actions, shown under ACTION in `kubectl get events`
pub mod actions {
    pub const RESCALE: &str = "Rescale";
    pub const GET_SCALE: &str = "GetScale";
    pub const COMPUTE_REPLICAS: &str = "ComputeReplicas";
    pub const UPDATE_STATUS: &str = "UpdateStatus";
    pub const APPLY_HPA: &str = "ApplyHPA";
}
