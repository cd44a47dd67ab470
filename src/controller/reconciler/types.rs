//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::constants::CONTROLLER_NAME;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::events::{EventPublisher, KubeEventPublisher};
use crate::controller::reconciler::store::{AutoscalerStore, KubeAutoscalerStore, StoreError};
use crate::controller::scale::{KubeScaleClient, ScaleClient, ScaleError};
use crate::metrics::MetricsClient;
use crate::scaler::{ScalerRegistry, ScalingStrategy, UnknownStrategyError};
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// No working resource mapping, or the target does not exist
    #[error("failed to resolve scale target: {0}")]
    Resolution(#[source] ScaleError),

    /// The strategy could not decide right now
    #[error("failed to compute desired replicas: {0}")]
    Decision(String),

    /// The scale patch was rejected or conflicted
    #[error("failed to rescale target: {0}")]
    Apply(#[source] ScaleError),

    #[error(transparent)]
    UnknownStrategy(#[from] UnknownStrategyError),

    #[error("scaling strategy {0} is not implemented")]
    UnimplementedStrategy(ScalingStrategy),

    #[error("reconcile did not finish within {0:?}")]
    Timeout(Duration),

    /// Loading the PodAutoscaler or applying the HPA mirror failed
    #[error("Kubernetes API request failed: {0}")]
    Kube(#[source] StoreError),

    #[error("failed to persist PodAutoscaler status: {0}")]
    Status(#[source] StoreError),
}

impl ReconcilerError {
    /// Short label used for metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcilerError::Resolution(_) => "resolution",
            ReconcilerError::Decision(_) => "decision",
            ReconcilerError::Apply(_) => "apply",
            ReconcilerError::UnknownStrategy(_) => "unknown_strategy",
            ReconcilerError::UnimplementedStrategy(_) => "unimplemented_strategy",
            ReconcilerError::Timeout(_) => "timeout",
            ReconcilerError::Kube(_) => "kube",
            ReconcilerError::Status(_) => "status",
        }
    }

    /// Whether retrying can succeed before the PodAutoscaler is edited
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcilerError::Resolution(e) | ReconcilerError::Apply(e) => e.is_retryable(),
            ReconcilerError::UnknownStrategy(_) | ReconcilerError::UnimplementedStrategy(_) => {
                false
            }
            ReconcilerError::Decision(_)
            | ReconcilerError::Timeout(_)
            | ReconcilerError::Kube(_)
            | ReconcilerError::Status(_) => true,
        }
    }
}

/// Backoff state for a specific resource
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            backoff: FibonacciBackoff::new(
                Duration::from_secs(config.backoff_min_secs),
                Duration::from_secs(config.backoff_max_secs),
            ),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared reconciler context
///
/// Every collaborator sits behind a trait object so the engine can be driven
/// without a cluster.
pub struct Reconciler {
    pub config: ControllerConfig,
    pub store: Arc<dyn AutoscalerStore>,
    pub scale_client: Arc<dyn ScaleClient>,
    pub metrics_client: Arc<dyn MetricsClient>,
    pub events: Arc<dyn EventPublisher>,
    /// Windowed scalers, one per PodAutoscaler
    pub scalers: ScalerRegistry,
    /// Backoff state per resource (namespace/name), owned by the error policy
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("scalers", &self.scalers)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Reconciler backed by the Kubernetes API
    #[must_use]
    pub fn new(
        client: Client,
        config: ControllerConfig,
        metrics_client: Arc<dyn MetricsClient>,
    ) -> Self {
        let store = Arc::new(KubeAutoscalerStore::new(
            client.clone(),
            config.field_manager.clone(),
        ));
        let scale_client = Arc::new(KubeScaleClient::new(
            client.clone(),
            config.field_manager.clone(),
        ));
        let events = Arc::new(KubeEventPublisher::new(client, CONTROLLER_NAME));
        Self::from_parts(config, store, scale_client, metrics_client, events)
    }

    /// Reconciler from explicit collaborators, with windowed scalers tuned by `config`
    #[must_use]
    pub fn from_parts(
        config: ControllerConfig,
        store: Arc<dyn AutoscalerStore>,
        scale_client: Arc<dyn ScaleClient>,
        metrics_client: Arc<dyn MetricsClient>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        let scalers = ScalerRegistry::windowed(&config);
        Self {
            config,
            store,
            scale_client,
            metrics_client,
            events,
            scalers,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the scaler registry (custom strategies, tests)
    #[must_use]
    pub fn with_scalers(mut self, scalers: ScalerRegistry) -> Self {
        self.scalers = scalers;
        self
    }
}
