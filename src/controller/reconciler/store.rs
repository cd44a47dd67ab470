//! # Autoscaler Store
//!
//! Reads and writes of PodAutoscalers and their HPA mirrors.

use crate::crd::{PodAutoscaler, PodAutoscalerStatus};
use async_trait::async_trait;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, ResourceExt};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic concurrency check failed; a newer version exists
    #[error("conflict writing {0}: object was modified concurrently")]
    Conflict(String),

    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait AutoscalerStore: Send + Sync {
    /// Load a PodAutoscaler, `None` when it no longer exists
    async fn get_autoscaler(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PodAutoscaler>, StoreError>;

    /// Replace the status block of `pa`
    ///
    /// The write is conditional on the resourceVersion `pa` was loaded at.
    async fn persist_status(
        &self,
        pa: &PodAutoscaler,
        status: &PodAutoscalerStatus,
    ) -> Result<(), StoreError>;

    /// Create or update an HPA mirror, returning the stored object
    async fn apply_hpa(
        &self,
        hpa: &HorizontalPodAutoscaler,
    ) -> Result<HorizontalPodAutoscaler, StoreError>;
}

pub struct KubeAutoscalerStore {
    client: Client,
    field_manager: String,
}

impl KubeAutoscalerStore {
    #[must_use]
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }
}

impl std::fmt::Debug for KubeAutoscalerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeAutoscalerStore")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

fn conflict_aware(error: kube::Error, what: String) -> StoreError {
    match error {
        kube::Error::Api(api_err) if api_err.code == 409 => StoreError::Conflict(what),
        other => StoreError::Kube(other),
    }
}

#[async_trait]
impl AutoscalerStore for KubeAutoscalerStore {
    async fn get_autoscaler(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<PodAutoscaler>, StoreError> {
        let api: Api<PodAutoscaler> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn persist_status(
        &self,
        pa: &PodAutoscaler,
        status: &PodAutoscalerStatus,
    ) -> Result<(), StoreError> {
        let namespace = pa
            .namespace()
            .ok_or_else(|| StoreError::Other(format!("PodAutoscaler {} has no namespace", pa.name_any())))?;
        let api: Api<PodAutoscaler> = Api::namespaced(self.client.clone(), &namespace);
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": pa.resource_version() },
            "status": status,
        });
        api.patch_status(&pa.name_any(), &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|e| conflict_aware(e, format!("PodAutoscaler {namespace}/{}", pa.name_any())))?;
        Ok(())
    }

    async fn apply_hpa(
        &self,
        hpa: &HorizontalPodAutoscaler,
    ) -> Result<HorizontalPodAutoscaler, StoreError> {
        let namespace = hpa
            .namespace()
            .ok_or_else(|| StoreError::Other(format!("HPA {} has no namespace", hpa.name_any())))?;
        let api: Api<HorizontalPodAutoscaler> = Api::namespaced(self.client.clone(), &namespace);
        let applied = api
            .patch(
                &hpa.name_any(),
                &PatchParams::apply(&self.field_manager).force(),
                &Patch::Apply(hpa),
            )
            .await
            .map_err(|e| conflict_aware(e, format!("HorizontalPodAutoscaler {namespace}/{}", hpa.name_any())))?;
        Ok(applied)
    }
}
