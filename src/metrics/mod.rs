//! # Pod Metrics
//!
//! Metric samples consumed by the decision strategies.
//!
//! Scraping and storage of metrics are performed elsewhere; producers push
//! samples into a [`MetricsClient`] implementation and the reconciler reads
//! them back per scale target. [`InMemoryMetricsClient`] is the bundled
//! implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;

/// One sample for one pod
#[derive(Debug, Clone, PartialEq)]
pub struct PodMetric {
    /// When the sample was taken
    pub timestamp: DateTime<Utc>,
    /// Window the sample was aggregated over
    pub window: Duration,
    /// Value in milli-units
    pub value: i64,
    pub metric_name: String,
    pub container_port: i32,
    /// Name of the scale target the pod belongs to
    pub scale_object_name: String,
}

/// Samples keyed by pod name
pub type PodMetricsInfo = HashMap<String, PodMetric>;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("no samples for metric {metric:?} on {target}")]
    NoSamples { metric: String, target: String },

    #[error("metrics store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MetricsClient: Send + Sync {
    /// Samples of `metric_name` for a single pod
    ///
    /// Returns the samples and the oldest sample timestamp.
    async fn get_pod_container_metric(
        &self,
        metric_name: &str,
        namespace: &str,
        pod_name: &str,
        container_port: i32,
    ) -> Result<(PodMetricsInfo, DateTime<Utc>), MetricsError>;

    /// Samples of `metric_name` for every pod of a scale target
    ///
    /// Returns the samples and the oldest sample timestamp.
    async fn get_object_metric(
        &self,
        metric_name: &str,
        namespace: &str,
        object_name: &str,
        container_port: i32,
    ) -> Result<(PodMetricsInfo, DateTime<Utc>), MetricsError>;
}

/// Sum of the pod values converted from milli-units
///
/// The windowed strategy divides this by its per-replica target, so the load
/// carried by every pod has to be included.
#[must_use]
pub fn total_value(info: &PodMetricsInfo) -> Option<f64> {
    if info.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss, reason = "milli-unit samples fit in f64 mantissa")]
    Some(info.values().map(|m| m.value as f64 / 1000.0).sum())
}

type ObjectKey = (String, String);

/// Latest sample per (pod, metric) for each scale target
#[derive(Debug, Default)]
pub struct InMemoryMetricsClient {
    samples: RwLock<HashMap<ObjectKey, HashMap<(String, String), PodMetric>>>,
}

impl InMemoryMetricsClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample, replacing the previous sample for the same pod and metric
    pub fn record(
        &self,
        namespace: &str,
        pod_name: &str,
        metric: PodMetric,
    ) -> Result<(), MetricsError> {
        let mut samples = self
            .samples
            .write()
            .map_err(|e| MetricsError::Unavailable(e.to_string()))?;
        samples
            .entry((namespace.to_string(), metric.scale_object_name.clone()))
            .or_default()
            .insert((pod_name.to_string(), metric.metric_name.clone()), metric);
        Ok(())
    }

    /// Drop every sample of a scale target
    pub fn forget_object(&self, namespace: &str, object_name: &str) -> Result<(), MetricsError> {
        let mut samples = self
            .samples
            .write()
            .map_err(|e| MetricsError::Unavailable(e.to_string()))?;
        samples.remove(&(namespace.to_string(), object_name.to_string()));
        Ok(())
    }

    fn collect<'a>(
        pods: impl Iterator<Item = (&'a (String, String), &'a PodMetric)>,
        metric_name: &str,
        pod_filter: Option<&str>,
        container_port: i32,
    ) -> PodMetricsInfo {
        pods.filter(|((pod, name), metric)| {
            name == metric_name
                && metric.container_port == container_port
                && pod_filter.is_none_or(|wanted| wanted == pod)
        })
        .map(|((pod, _), metric)| (pod.clone(), metric.clone()))
        .collect()
    }
}

fn oldest(info: &PodMetricsInfo) -> Option<DateTime<Utc>> {
    info.values().map(|m| m.timestamp).min()
}

#[async_trait]
impl MetricsClient for InMemoryMetricsClient {
    async fn get_pod_container_metric(
        &self,
        metric_name: &str,
        namespace: &str,
        pod_name: &str,
        container_port: i32,
    ) -> Result<(PodMetricsInfo, DateTime<Utc>), MetricsError> {
        let samples = self
            .samples
            .read()
            .map_err(|e| MetricsError::Unavailable(e.to_string()))?;
        let info: PodMetricsInfo = samples
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .flat_map(|(_, pods)| {
                Self::collect(pods.iter(), metric_name, Some(pod_name), container_port)
            })
            .collect();
        let timestamp = oldest(&info).ok_or_else(|| MetricsError::NoSamples {
            metric: metric_name.to_string(),
            target: format!("pod {namespace}/{pod_name}"),
        })?;
        Ok((info, timestamp))
    }

    async fn get_object_metric(
        &self,
        metric_name: &str,
        namespace: &str,
        object_name: &str,
        container_port: i32,
    ) -> Result<(PodMetricsInfo, DateTime<Utc>), MetricsError> {
        let samples = self
            .samples
            .read()
            .map_err(|e| MetricsError::Unavailable(e.to_string()))?;
        let info = samples
            .get(&(namespace.to_string(), object_name.to_string()))
            .map(|pods| Self::collect(pods.iter(), metric_name, None, container_port))
            .unwrap_or_default();
        let timestamp = oldest(&info).ok_or_else(|| MetricsError::NoSamples {
            metric: metric_name.to_string(),
            target: format!("{namespace}/{object_name}"),
        })?;
        Ok((info, timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(object: &str, metric: &str, value: i64, second: u32) -> PodMetric {
        PodMetric {
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, second).unwrap(),
            window: Duration::from_secs(30),
            value,
            metric_name: metric.to_string(),
            container_port: 8000,
            scale_object_name: object.to_string(),
        }
    }

    #[tokio::test]
    async fn test_object_metric_sums_pods() {
        let client = InMemoryMetricsClient::new();
        client.record("default", "llama-0", sample("llama", "tps", 30_000, 5)).unwrap();
        client.record("default", "llama-1", sample("llama", "tps", 50_000, 2)).unwrap();
        client.record("default", "other-0", sample("other", "tps", 90_000, 1)).unwrap();

        let (info, oldest) = client
            .get_object_metric("tps", "default", "llama", 8000)
            .await
            .unwrap();

        assert_eq!(info.len(), 2);
        assert_eq!(oldest, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 2).unwrap());
        assert_eq!(total_value(&info), Some(80.0));
    }

    #[tokio::test]
    async fn test_newer_sample_replaces_older() {
        let client = InMemoryMetricsClient::new();
        client.record("default", "llama-0", sample("llama", "tps", 10_000, 1)).unwrap();
        client.record("default", "llama-0", sample("llama", "tps", 20_000, 2)).unwrap();

        let (info, _) = client
            .get_pod_container_metric("tps", "default", "llama-0", 8000)
            .await
            .unwrap();
        assert_eq!(total_value(&info), Some(20.0));
    }

    #[tokio::test]
    async fn test_missing_samples_is_an_error() {
        let client = InMemoryMetricsClient::new();
        client.record("default", "llama-0", sample("llama", "tps", 10_000, 1)).unwrap();

        let wrong_port = client.get_object_metric("tps", "default", "llama", 9090).await;
        assert!(matches!(wrong_port, Err(MetricsError::NoSamples { .. })));

        client.forget_object("default", "llama").unwrap();
        let forgotten = client.get_object_metric("tps", "default", "llama", 8000).await;
        assert!(matches!(forgotten, Err(MetricsError::NoSamples { .. })));
    }

    #[test]
    fn test_total_of_nothing_is_none() {
        assert_eq!(total_value(&PodMetricsInfo::new()), None);
    }
}
