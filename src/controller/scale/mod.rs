//! # Scale Target Resolution
//!
//! Maps a `scaleTargetRef` onto a concrete, mutable scale handle without
//! knowing the target kind in advance. Any resource that serves the `scale`
//! subresource can be driven.
//!
//! A kind may be served by several group versions, so discovery yields an
//! ordered list of [`ResourceMapping`] candidates. [`fetch_scale_handle`]
//! walks them in order and keeps the first working one; when every candidate
//! fails, the first candidate's error is reported since later failures are
//! usually a consequence of the same root cause.

mod cluster;

pub use cluster::KubeScaleClient;

use async_trait::async_trait;
use kube::core::{ApiResource, GroupVersionKind};
use thiserror::Error;
use tracing::debug;

/// Errors from scale handle resolution and mutation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScaleError {
    #[error("invalid apiVersion {0:?}")]
    InvalidApiVersion(String),

    #[error("discovery failed for group {group:?}: {message}")]
    Discovery { group: String, message: String },

    #[error("unrecognized resource {0}: no API mapping serves it")]
    UnrecognizedResource(String),

    #[error("{resource} {namespace}/{name} not found")]
    NotFound {
        resource: String,
        namespace: String,
        name: String,
    },

    #[error("conflict updating scale of {resource} {namespace}/{name}: {message}")]
    Conflict {
        resource: String,
        namespace: String,
        name: String,
        message: String,
    },

    #[error("scale request for {resource} {namespace}/{name} failed: {message}")]
    Api {
        resource: String,
        namespace: String,
        name: String,
        message: String,
    },
}

impl ScaleError {
    /// Whether retrying against the same cluster state can succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ScaleError::InvalidApiVersion(_))
    }
}

/// Discovery metadata for one concrete API location of a kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMapping {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
}

impl ResourceMapping {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        plural: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            plural: plural.into(),
        }
    }

    /// `group/version`, or just `version` for the core group
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    #[must_use]
    pub fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk_with_plural(
            &GroupVersionKind::gvk(&self.group, &self.version, &self.kind),
            &self.plural,
        )
    }
}

impl std::fmt::Display for ResourceMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.plural)
        } else {
            write!(f, "{}.{}/{}", self.plural, self.group, self.version)
        }
    }
}

/// Freshly fetched scale state of a target. Never cached across reconciles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleHandle {
    /// The candidate that served the scale subresource
    pub resource: ResourceMapping,
    pub namespace: String,
    pub name: String,
    /// `spec.replicas` of the scale subresource
    pub spec_replicas: i32,
}

/// Cluster access needed by the resolver
#[async_trait]
pub trait ScaleClient: Send + Sync {
    /// Candidate mappings for `kind` in `group`, most preferred first.
    /// `version` is the version requested by the reference and sorts first when served.
    async fn resolve_candidates(
        &self,
        kind: &str,
        group: &str,
        version: &str,
    ) -> Result<Vec<ResourceMapping>, ScaleError>;

    /// Read `spec.replicas` of the scale subresource
    async fn get_scale(
        &self,
        mapping: &ResourceMapping,
        namespace: &str,
        name: &str,
    ) -> Result<i32, ScaleError>;

    /// Server-side apply `spec.replicas` on the scale subresource
    async fn patch_scale(
        &self,
        mapping: &ResourceMapping,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ScaleError>;
}

/// Split an apiVersion into `(group, version)`
///
/// `apps/v1` gives `("apps", "v1")`, the core `v1` gives `("", "v1")`.
pub fn parse_api_version(api_version: &str) -> Result<(String, String), ScaleError> {
    let invalid = || ScaleError::InvalidApiVersion(api_version.to_string());
    let mut parts = api_version.split('/');
    let (group, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(version), None, None) => ("", version),
        (Some(group), Some(version), None) if !group.is_empty() => (group, version),
        _ => return Err(invalid()),
    };
    if version.is_empty() {
        return Err(invalid());
    }
    Ok((group.to_string(), version.to_string()))
}

/// Candidate mappings for a target reference
pub async fn resolve_candidates(
    client: &dyn ScaleClient,
    kind: &str,
    api_version: &str,
) -> Result<Vec<ResourceMapping>, ScaleError> {
    let (group, version) = parse_api_version(api_version)?;
    client.resolve_candidates(kind, &group, &version).await
}

/// Fetch the scale handle from the first candidate that serves it
///
/// Candidates are tried strictly in order. If all fail, the error of the
/// first candidate is returned. An empty list is reported as
/// [`ScaleError::UnrecognizedResource`].
pub async fn fetch_scale_handle(
    client: &dyn ScaleClient,
    candidates: &[ResourceMapping],
    namespace: &str,
    name: &str,
) -> Result<ScaleHandle, ScaleError> {
    let mut first_error = None;

    for mapping in candidates {
        match client.get_scale(mapping, namespace, name).await {
            Ok(spec_replicas) => {
                return Ok(ScaleHandle {
                    resource: mapping.clone(),
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    spec_replicas,
                });
            }
            Err(e) => {
                debug!(resource = %mapping, error = %e, "scale candidate failed");
                first_error.get_or_insert(e);
            }
        }
    }

    Err(first_error
        .unwrap_or_else(|| ScaleError::UnrecognizedResource(format!("{namespace}/{name}"))))
}

/// Resolve a target reference all the way to a scale handle
pub async fn resolve_scale_handle(
    client: &dyn ScaleClient,
    kind: &str,
    api_version: &str,
    namespace: &str,
    name: &str,
) -> Result<ScaleHandle, ScaleError> {
    let candidates = resolve_candidates(client, kind, api_version).await?;
    if candidates.is_empty() {
        return Err(ScaleError::UnrecognizedResource(format!(
            "{kind} {api_version}"
        )));
    }
    fetch_scale_handle(client, &candidates, namespace, name).await
}

/// Apply a new replica count through the mapping that served the handle
///
/// No retry; the caller decides whether to requeue.
pub async fn apply_scale_handle(
    client: &dyn ScaleClient,
    handle: &ScaleHandle,
    replicas: i32,
) -> Result<(), ScaleError> {
    client
        .patch_scale(&handle.resource, &handle.namespace, &handle.name, replicas)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_version() {
        assert_eq!(
            parse_api_version("apps/v1").unwrap(),
            ("apps".to_string(), "v1".to_string())
        );
        assert_eq!(
            parse_api_version("v1").unwrap(),
            (String::new(), "v1".to_string())
        );
        assert_eq!(
            parse_api_version("orchestration.aibrix.ai/v1alpha1").unwrap(),
            ("orchestration.aibrix.ai".to_string(), "v1alpha1".to_string())
        );
    }

    #[test]
    fn test_parse_api_version_rejects_malformed() {
        for bad in ["", "apps/", "/v1", "a/b/c"] {
            assert_eq!(
                parse_api_version(bad),
                Err(ScaleError::InvalidApiVersion(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_mapping_api_version_and_resource() {
        let apps = ResourceMapping::new("apps", "v1", "Deployment", "deployments");
        assert_eq!(apps.api_version(), "apps/v1");
        assert_eq!(apps.api_resource().plural, "deployments");
        assert_eq!(apps.to_string(), "deployments.apps/v1");

        let core = ResourceMapping::new("", "v1", "ReplicationController", "replicationcontrollers");
        assert_eq!(core.api_version(), "v1");
        assert_eq!(core.to_string(), "v1/replicationcontrollers");
    }

    #[test]
    fn test_invalid_api_version_is_not_retryable() {
        assert!(!ScaleError::InvalidApiVersion("x/y/z".into()).is_retryable());
        assert!(ScaleError::NotFound {
            resource: "deployments.apps/v1".into(),
            namespace: "default".into(),
            name: "llama".into(),
        }
        .is_retryable());
    }
}
