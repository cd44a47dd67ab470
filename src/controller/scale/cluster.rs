//! Kubernetes-backed [`ScaleClient`] using API discovery and the `scale` subresource.

use super::{ResourceMapping, ScaleClient, ScaleError};
use async_trait::async_trait;
use k8s_openapi::api::autoscaling::v1::Scale;
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::discovery::Discovery;
use kube::{Client, Resource};
use tracing::debug;

pub struct KubeScaleClient {
    client: Client,
    field_manager: String,
}

impl KubeScaleClient {
    #[must_use]
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn api(&self, mapping: &ResourceMapping, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &mapping.api_resource())
    }
}

impl std::fmt::Debug for KubeScaleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeScaleClient")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

/// Order versions: requested first, then preferred, then the rest as served
fn ordered_versions<'a>(
    requested: &'a str,
    preferred: Option<&'a str>,
    served: impl Iterator<Item = &'a str>,
) -> Vec<&'a str> {
    let served: Vec<&str> = served.collect();
    let mut ordered = Vec::with_capacity(served.len());
    for version in std::iter::once(requested)
        .chain(preferred)
        .chain(served.iter().copied())
    {
        if served.contains(&version) && !ordered.contains(&version) {
            ordered.push(version);
        }
    }
    ordered
}

fn classify(
    error: kube::Error,
    mapping: &ResourceMapping,
    namespace: &str,
    name: &str,
) -> ScaleError {
    let resource = mapping.to_string();
    let namespace = namespace.to_string();
    let name = name.to_string();
    match error {
        kube::Error::Api(status) if status.code == 404 => ScaleError::NotFound {
            resource,
            namespace,
            name,
        },
        kube::Error::Api(status) if status.code == 409 => ScaleError::Conflict {
            resource,
            namespace,
            name,
            message: status.message,
        },
        other => ScaleError::Api {
            resource,
            namespace,
            name,
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl ScaleClient for KubeScaleClient {
    async fn resolve_candidates(
        &self,
        kind: &str,
        group: &str,
        version: &str,
    ) -> Result<Vec<ResourceMapping>, ScaleError> {
        let discovery = Discovery::new(self.client.clone())
            .filter(&[group])
            .run()
            .await
            .map_err(|e| ScaleError::Discovery {
                group: group.to_string(),
                message: e.to_string(),
            })?;

        let Some(api_group) = discovery.get(group) else {
            debug!(group, "API group not served");
            return Ok(Vec::new());
        };

        let versions = ordered_versions(version, api_group.preferred_version(), api_group.versions());
        let candidates: Vec<ResourceMapping> = versions
            .into_iter()
            .flat_map(|v| api_group.versioned_resources(v))
            .filter(|(ar, _)| ar.kind == kind)
            .map(|(ar, _)| ResourceMapping::new(ar.group, ar.version, ar.kind, ar.plural))
            .collect();

        debug!(kind, group, count = candidates.len(), "resolved scale candidates");
        Ok(candidates)
    }

    async fn get_scale(
        &self,
        mapping: &ResourceMapping,
        namespace: &str,
        name: &str,
    ) -> Result<i32, ScaleError> {
        let scale = self
            .api(mapping, namespace)
            .get_scale(name)
            .await
            .map_err(|e| classify(e, mapping, namespace, name))?;
        Ok(scale.spec.and_then(|spec| spec.replicas).unwrap_or(0))
    }

    async fn patch_scale(
        &self,
        mapping: &ResourceMapping,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ScaleError> {
        let patch = serde_json::json!({
            "apiVersion": Scale::api_version(&()),
            "kind": Scale::kind(&()),
            "spec": { "replicas": replicas }
        });
        self.api(mapping, namespace)
            .patch_scale(
                name,
                &PatchParams::apply(&self.field_manager).force(),
                &Patch::Apply(patch),
            )
            .await
            .map_err(|e| classify(e, mapping, namespace, name))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_version_sorts_first() {
        let served = ["v1", "v1beta1", "v2"];
        assert_eq!(
            ordered_versions("v1beta1", Some("v2"), served.iter().copied()),
            vec!["v1beta1", "v2", "v1"]
        );
    }

    #[test]
    fn test_unserved_requested_version_is_skipped() {
        let served = ["v1", "v2"];
        assert_eq!(
            ordered_versions("v9", Some("v2"), served.iter().copied()),
            vec!["v2", "v1"]
        );
    }

    #[test]
    fn test_no_duplicates_when_requested_is_preferred() {
        let served = ["v1"];
        assert_eq!(
            ordered_versions("v1", Some("v1"), served.iter().copied()),
            vec!["v1"]
        );
    }
}
