//! Common test utilities for reconciler tests
//!
//! In-memory stand-ins for every cluster-facing seam of the reconciler, plus
//! builders for PodAutoscalers and reconciler contexts.

#![allow(dead_code, reason = "not every test binary uses every helper")]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::autoscaling::v2::{HorizontalPodAutoscaler, HorizontalPodAutoscalerStatus};
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::EventType;
use kube::ResourceExt;
use podautoscaler_controller::config::ControllerConfig;
use podautoscaler_controller::controller::events::EventPublisher;
use podautoscaler_controller::controller::reconciler::{
    AutoscalerStore, Reconciler, StoreError,
};
use podautoscaler_controller::controller::scale::{ResourceMapping, ScaleClient, ScaleError};
use podautoscaler_controller::crd::{
    PodAutoscaler, PodAutoscalerSpec, PodAutoscalerStatus, ScaleTargetRef,
};
use podautoscaler_controller::metrics::{MetricsClient, MetricsError, PodMetric, PodMetricsInfo};
use podautoscaler_controller::scaler::{ScaleResult, Scaler, ScalerRegistry};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const NAMESPACE: &str = "serving";
pub const NAME: &str = "llama";
pub const TARGET: &str = "llama-deploy";

/// PodAutoscaler with the given strategy and bounds, as loaded from the API
pub fn autoscaler(strategy: &str, min: Option<i32>, max: i32) -> PodAutoscaler {
    let mut pa = PodAutoscaler::new(
        NAME,
        PodAutoscalerSpec {
            scale_target_ref: ScaleTargetRef {
                kind: "Deployment".into(),
                api_version: "apps/v1".into(),
                name: TARGET.into(),
            },
            min_replicas: min,
            max_replicas: max,
            target_metric: "avg_generation_throughput_toks_per_s".into(),
            target_value: 40.0,
            metrics_port: None,
            scaling_strategy: strategy.into(),
        },
    );
    pa.metadata.namespace = Some(NAMESPACE.into());
    pa.metadata.uid = Some("3f1c9a7e-5d1b-4c2e-9a63-0c5e2b8d4f10".into());
    pa.metadata.resource_version = Some("100".into());
    pa.metadata.generation = Some(1);
    pa
}

pub fn deployments_v1() -> ResourceMapping {
    ResourceMapping::new("apps", "v1", "Deployment", "deployments")
}

/// Stored PodAutoscalers and HPA mirrors
#[derive(Debug, Default)]
pub struct FakeStore {
    pub autoscaler: Mutex<Option<PodAutoscaler>>,
    pub status_writes: AtomicUsize,
    pub fail_status_writes: AtomicBool,
    pub applied_hpas: Mutex<Vec<HorizontalPodAutoscaler>>,
    /// Status the "cluster" reports back for applied HPAs
    pub hpa_status: Mutex<Option<HorizontalPodAutoscalerStatus>>,
    pub fail_hpa_apply: AtomicBool,
}

impl FakeStore {
    pub fn with(pa: PodAutoscaler) -> Self {
        Self {
            autoscaler: Mutex::new(Some(pa)),
            ..Self::default()
        }
    }

    pub fn current(&self) -> Option<PodAutoscaler> {
        self.autoscaler.lock().unwrap().clone()
    }

    pub fn status(&self) -> PodAutoscalerStatus {
        self.current()
            .and_then(|pa| pa.status)
            .unwrap_or_default()
    }

    pub fn writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AutoscalerStore for FakeStore {
    async fn get_autoscaler(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PodAutoscaler>, StoreError> {
        Ok(self
            .current()
            .filter(|pa| pa.namespace().as_deref() == Some(namespace) && pa.name_any() == name))
    }

    async fn persist_status(
        &self,
        pa: &PodAutoscaler,
        status: &PodAutoscalerStatus,
    ) -> Result<(), StoreError> {
        if self.fail_status_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Conflict(pa.name_any()));
        }
        let mut stored = self.autoscaler.lock().unwrap();
        if let Some(stored) = stored.as_mut() {
            stored.status = Some(status.clone());
        }
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn apply_hpa(
        &self,
        hpa: &HorizontalPodAutoscaler,
    ) -> Result<HorizontalPodAutoscaler, StoreError> {
        if self.fail_hpa_apply.load(Ordering::SeqCst) {
            return Err(StoreError::Other("admission webhook denied the request".into()));
        }
        self.applied_hpas.lock().unwrap().push(hpa.clone());
        let mut stored = hpa.clone();
        stored.status = self.hpa_status.lock().unwrap().clone();
        Ok(stored)
    }
}

/// Scale subresources served per candidate mapping
#[derive(Debug)]
pub struct FakeScaleClient {
    pub candidates: Mutex<Result<Vec<ResourceMapping>, ScaleError>>,
    /// Result of reading the scale through each mapping
    pub scales: Mutex<Vec<(ResourceMapping, Result<i32, ScaleError>)>>,
    pub patch_error: Mutex<Option<ScaleError>>,
    pub patches: Mutex<Vec<(ResourceMapping, i32)>>,
    pub get_calls: AtomicUsize,
}

impl FakeScaleClient {
    /// A single Deployment mapping at `replicas`
    pub fn deployment(replicas: i32) -> Self {
        Self::with_candidates(vec![(deployments_v1(), Ok(replicas))])
    }

    pub fn with_candidates(scales: Vec<(ResourceMapping, Result<i32, ScaleError>)>) -> Self {
        Self {
            candidates: Mutex::new(Ok(scales.iter().map(|(m, _)| m.clone()).collect())),
            scales: Mutex::new(scales),
            patch_error: Mutex::new(None),
            patches: Mutex::new(Vec::new()),
            get_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_patches_with(&self, error: ScaleError) {
        *self.patch_error.lock().unwrap() = Some(error);
    }

    pub fn patches(&self) -> Vec<(ResourceMapping, i32)> {
        self.patches.lock().unwrap().clone()
    }

    pub fn replicas(&self) -> Option<i32> {
        self.scales
            .lock()
            .unwrap()
            .iter()
            .find_map(|(_, r)| r.as_ref().ok().copied())
    }
}

#[async_trait]
impl ScaleClient for FakeScaleClient {
    async fn resolve_candidates(
        &self,
        kind: &str,
        _group: &str,
        _version: &str,
    ) -> Result<Vec<ResourceMapping>, ScaleError> {
        let candidates = self.candidates.lock().unwrap().clone()?;
        Ok(candidates.into_iter().filter(|m| m.kind == kind).collect())
    }

    async fn get_scale(
        &self,
        mapping: &ResourceMapping,
        _namespace: &str,
        _name: &str,
    ) -> Result<i32, ScaleError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.scales
            .lock()
            .unwrap()
            .iter()
            .find(|(m, _)| m == mapping)
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| Err(ScaleError::UnrecognizedResource(mapping.to_string())))
    }

    async fn patch_scale(
        &self,
        mapping: &ResourceMapping,
        _namespace: &str,
        _name: &str,
        replicas: i32,
    ) -> Result<(), ScaleError> {
        if let Some(error) = self.patch_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.patches.lock().unwrap().push((mapping.clone(), replicas));
        for (m, result) in self.scales.lock().unwrap().iter_mut() {
            if m == mapping {
                *result = Ok(replicas);
            }
        }
        Ok(())
    }
}

/// One observed value for every scale target
#[derive(Debug)]
pub struct FixedMetricsClient {
    pub value: Mutex<Option<f64>>,
}

impl FixedMetricsClient {
    pub fn reporting(value: f64) -> Self {
        Self {
            value: Mutex::new(Some(value)),
        }
    }

    pub fn silent() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }
}

#[async_trait]
impl MetricsClient for FixedMetricsClient {
    async fn get_pod_container_metric(
        &self,
        metric_name: &str,
        namespace: &str,
        pod_name: &str,
        container_port: i32,
    ) -> Result<(PodMetricsInfo, DateTime<Utc>), MetricsError> {
        self.get_object_metric(metric_name, namespace, pod_name, container_port)
            .await
    }

    async fn get_object_metric(
        &self,
        metric_name: &str,
        _namespace: &str,
        object_name: &str,
        container_port: i32,
    ) -> Result<(PodMetricsInfo, DateTime<Utc>), MetricsError> {
        let Some(value) = *self.value.lock().unwrap() else {
            return Err(MetricsError::NoSamples {
                metric: metric_name.to_string(),
                target: object_name.to_string(),
            });
        };
        let now = Utc::now();
        let sample = PodMetric {
            timestamp: now,
            window: Duration::from_secs(60),
            value: (value * 1000.0) as i64,
            metric_name: metric_name.to_string(),
            container_port,
            scale_object_name: object_name.to_string(),
        };
        Ok((PodMetricsInfo::from([(format!("{object_name}-0"), sample)]), now))
    }
}

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub type_: EventType,
    pub reason: String,
    pub action: String,
    pub note: Option<String>,
}

#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    pub events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventPublisher {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        self.events.lock().unwrap().push(RecordedEvent {
            type_,
            reason: reason.to_string(),
            action: action.to_string(),
            note,
        });
    }
}

/// Scaler answering a fixed result, recording every call
#[derive(Debug)]
pub struct FixedScaler {
    result: Arc<Mutex<ScaleResult>>,
    calls: Arc<Mutex<Vec<(i32, f64)>>>,
}

impl Scaler for FixedScaler {
    fn scale(&mut self, current_replicas: i32, observed_value: f64, _now: DateTime<Utc>) -> ScaleResult {
        self.calls.lock().unwrap().push((current_replicas, observed_value));
        *self.result.lock().unwrap()
    }
}

/// Handle on the scalers built by a [`fixed_registry`]
#[derive(Debug, Clone)]
pub struct ScalerRecorder {
    pub result: Arc<Mutex<ScaleResult>>,
    pub calls: Arc<Mutex<Vec<(i32, f64)>>>,
}

impl ScalerRecorder {
    pub fn calls(&self) -> Vec<(i32, f64)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn answer(&self, result: ScaleResult) {
        *self.result.lock().unwrap() = result;
    }
}

pub fn fixed_registry(result: ScaleResult) -> (ScalerRegistry, ScalerRecorder) {
    let recorder = ScalerRecorder {
        result: Arc::new(Mutex::new(result)),
        calls: Arc::new(Mutex::new(Vec::new())),
    };
    let shared = recorder.clone();
    let registry = ScalerRegistry::new(Arc::new(move |_: &PodAutoscaler| {
        Box::new(FixedScaler {
            result: Arc::clone(&shared.result),
            calls: Arc::clone(&shared.calls),
        }) as Box<dyn Scaler>
    }));
    (registry, recorder)
}

/// Everything a reconciler test needs to drive and inspect one pass
pub struct Harness {
    pub store: Arc<FakeStore>,
    pub scale: Arc<FakeScaleClient>,
    pub metrics: Arc<FixedMetricsClient>,
    pub events: Arc<RecordingEventPublisher>,
    pub scaler: ScalerRecorder,
    pub ctx: Arc<Reconciler>,
}

impl Harness {
    pub fn new(pa: PodAutoscaler, scale: FakeScaleClient, result: ScaleResult) -> Self {
        Self::with_metrics(pa, scale, FixedMetricsClient::reporting(55.0), result)
    }

    pub fn with_metrics(
        pa: PodAutoscaler,
        scale: FakeScaleClient,
        metrics: FixedMetricsClient,
        result: ScaleResult,
    ) -> Self {
        let store = Arc::new(FakeStore::with(pa));
        let scale = Arc::new(scale);
        let metrics = Arc::new(metrics);
        let events = Arc::new(RecordingEventPublisher::default());
        let (registry, scaler) = fixed_registry(result);
        let ctx = Arc::new(
            Reconciler::from_parts(
                ControllerConfig::default(),
                Arc::clone(&store) as Arc<dyn AutoscalerStore>,
                Arc::clone(&scale) as Arc<dyn ScaleClient>,
                Arc::clone(&metrics) as Arc<dyn MetricsClient>,
                Arc::clone(&events) as Arc<dyn EventPublisher>,
            )
            .with_scalers(registry),
        );
        Self {
            store,
            scale,
            metrics,
            events,
            scaler,
            ctx,
        }
    }
}
