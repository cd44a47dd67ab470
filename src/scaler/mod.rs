//! # Scaling Strategies
//!
//! Strategies decide *what* replica count is wanted; the reconciler decides
//! *how* it is applied.
//!
//! - `HPA` delegates the decision to a mirrored `HorizontalPodAutoscaler`
//! - `KPA` runs the [`windowed::WindowedScaler`] inside the controller
//! - `APA` is recognized but not implemented; reconciling it fails fast
//!
//! Decision strategies implement [`Scaler`]. Windowed strategies keep sample
//! history, so the [`ScalerRegistry`] holds one instance per PodAutoscaler and
//! rebuilds it when the spec generation changes. Instances idle for longer than
//! the registry's TTL are evicted, which also covers deleted PodAutoscalers
//! that are never reconciled again.

pub mod windowed;

use crate::config::ControllerConfig;
use crate::crd::PodAutoscaler;
use chrono::{DateTime, Utc};
use kube::ResourceExt;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use windowed::{WindowedScaler, WindowedScalerConfig};

/// Strategy named by `spec.scalingStrategy`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalingStrategy {
    /// Delegated to a native HorizontalPodAutoscaler
    Hpa,
    /// Windowed decision made by this controller
    Kpa,
    /// Lightweight proportional decision
    Apa,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown scaling strategy {0:?}, expected one of HPA, KPA, APA")]
pub struct UnknownStrategyError(pub String);

impl FromStr for ScalingStrategy {
    type Err = UnknownStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HPA" => Ok(ScalingStrategy::Hpa),
            "KPA" => Ok(ScalingStrategy::Kpa),
            "APA" => Ok(ScalingStrategy::Apa),
            other => Err(UnknownStrategyError(other.to_string())),
        }
    }
}

impl fmt::Display for ScalingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScalingStrategy::Hpa => "HPA",
            ScalingStrategy::Kpa => "KPA",
            ScalingStrategy::Apa => "APA",
        })
    }
}

/// Outcome of one strategy evaluation
///
/// When `scale_valid` is false no decision could be made and
/// `desired_pod_count` must be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleResult {
    pub desired_pod_count: i32,
    pub scale_valid: bool,
}

impl ScaleResult {
    #[must_use]
    pub fn valid(desired_pod_count: i32) -> Self {
        Self {
            desired_pod_count,
            scale_valid: true,
        }
    }

    #[must_use]
    pub fn invalid() -> Self {
        Self {
            desired_pod_count: 0,
            scale_valid: false,
        }
    }
}

/// Decision function of a strategy
pub trait Scaler: Send + fmt::Debug {
    /// Desired replicas given the current replica count and the observed metric value
    fn scale(&mut self, current_replicas: i32, observed_value: f64, now: DateTime<Utc>)
        -> ScaleResult;
}

/// Builds a scaler for a PodAutoscaler
pub type ScalerFactory = Arc<dyn Fn(&PodAutoscaler) -> Box<dyn Scaler> + Send + Sync>;

struct Entry {
    generation: Option<i64>,
    last_used: DateTime<Utc>,
    scaler: Box<dyn Scaler>,
}

/// Per-PodAutoscaler scaler instances
///
/// Each key owns its scaler exclusively. Instances are never shared between
/// keys and are dropped when the PodAutoscaler is deleted.
pub struct ScalerRegistry {
    factory: ScalerFactory,
    idle_ttl: Option<chrono::Duration>,
    scalers: Mutex<HashMap<String, Entry>>,
}

impl ScalerRegistry {
    #[must_use]
    pub fn new(factory: ScalerFactory) -> Self {
        Self {
            factory,
            idle_ttl: None,
            scalers: Mutex::new(HashMap::new()),
        }
    }

    /// Evict scalers not consulted for longer than `ttl`
    #[must_use]
    pub fn with_idle_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.idle_ttl = chrono::Duration::from_std(ttl).ok();
        self
    }

    /// Registry producing [`WindowedScaler`]s tuned by the controller config
    ///
    /// After two stable windows without a call, every sample of a windowed
    /// scaler has expired, so idle instances are evicted at that point.
    #[must_use]
    pub fn windowed(config: &ControllerConfig) -> Self {
        let base = WindowedScalerConfig::from_controller_config(config);
        Self::new(Arc::new(move |pa: &PodAutoscaler| {
            Box::new(WindowedScaler::new(base.with_target(pa.spec.target_value)))
                as Box<dyn Scaler>
        }))
        .with_idle_ttl(config.stable_window().saturating_mul(2))
    }

    /// Evaluate the scaler of `pa`, creating it on first use
    pub fn scale(
        &self,
        pa: &PodAutoscaler,
        current_replicas: i32,
        observed_value: f64,
        now: DateTime<Utc>,
    ) -> ScaleResult {
        let key = registry_key(pa);
        let generation = pa.metadata.generation;
        let mut scalers = self.scalers.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(ttl) = self.idle_ttl {
            scalers.retain(|_, entry| now - entry.last_used <= ttl);
        }

        let entry = scalers.entry(key).or_insert_with(|| Entry {
            generation,
            last_used: now,
            scaler: (self.factory)(pa),
        });
        if entry.generation != generation {
            entry.generation = generation;
            entry.scaler = (self.factory)(pa);
        }
        entry.last_used = now;
        entry.scaler.scale(current_replicas, observed_value, now)
    }

    /// Drop the scaler of a deleted PodAutoscaler
    pub fn forget(&self, namespace: &str, name: &str) {
        let mut scalers = self.scalers.lock().unwrap_or_else(PoisonError::into_inner);
        scalers.remove(&format!("{namespace}/{name}"));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scalers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ScalerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalerRegistry")
            .field("scalers", &self.len())
            .finish_non_exhaustive()
    }
}

fn registry_key(pa: &PodAutoscaler) -> String {
    format!("{}/{}", pa.namespace().unwrap_or_default(), pa.name_any())
}
