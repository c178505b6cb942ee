//! Kubernetes-backed stores.
//!
//! Objects are read with `get_opt`. Finalizer writes are merge patches and
//! status writes are server-side apply patches; both carry the object's
//! `resourceVersion`, so a stale write is rejected with 409.

use super::{ArtifactOwner, ArtifactStore, ObjectKey, ObjectStore, StoreError};
use crate::constants::{MANAGED_BY_LABEL, MANAGED_BY_VALUE};
use crate::crd::ManagedResource;
use anyhow::anyhow;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::core::ObjectMeta;
use kube::{Client, Resource, ResourceExt};
use serde_json::json;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use tracing::debug;

/// Field manager for server-side apply
const FIELD_MANAGER: &str = "cloud-connectors-controller";

/// Label linking a derived ConfigMap to its owner's kind
const ARTIFACT_KIND_LABEL: &str = "connectors.cloud.yandex.com/kind";

/// Label linking a derived ConfigMap to its owner's name
const ARTIFACT_OWNER_LABEL: &str = "connectors.cloud.yandex.com/owner";

fn store_error(err: kube::Error, subject: &str) -> StoreError {
    match err {
        kube::Error::Api(api_err) => StoreError::from_status(api_err.code, subject, &api_err.message),
        other => StoreError::Transient(anyhow!("{subject}: {other}")),
    }
}

/// [`ObjectStore`] over the Kubernetes API for one custom resource kind
pub struct KubeObjectStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> std::fmt::Debug for KubeObjectStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeObjectStore").finish_non_exhaustive()
    }
}

impl<K: ManagedResource> KubeObjectStore<K> {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }

    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn key_of(object: &K) -> Result<ObjectKey, StoreError> {
        let namespace = object
            .namespace()
            .ok_or_else(|| StoreError::Fatal(anyhow!("{} has no namespace", object.name_any())))?;
        Ok(ObjectKey::new(namespace, object.name_any()))
    }

    fn resource_version(object: &K, key: &ObjectKey) -> Result<String, StoreError> {
        object
            .resource_version()
            .ok_or_else(|| StoreError::Fatal(anyhow!("{key} has no resourceVersion")))
    }
}

#[async_trait]
impl<K: ManagedResource> ObjectStore<K> for KubeObjectStore<K> {
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        self.api(&key.namespace)
            .get_opt(&key.name)
            .await
            .map_err(|e| store_error(e, &key.to_string()))
    }

    async fn update(&self, object: &K) -> Result<K, StoreError> {
        let key = Self::key_of(object)?;
        let patch = json!({
            "metadata": {
                "resourceVersion": Self::resource_version(object, &key)?,
                "finalizers": object.finalizers(),
            }
        });
        self.api(&key.namespace)
            .patch(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| store_error(e, &key.to_string()))
    }

    async fn update_status(&self, object: &K) -> Result<K, StoreError> {
        let key = Self::key_of(object)?;
        let status = serde_json::to_value(object)
            .map_err(|e| StoreError::Fatal(anyhow!("failed to serialize {key}: {e}")))?
            .get("status")
            .cloned()
            .unwrap_or_else(|| json!({}));
        // Apply replaces every status field this manager owns, so labels
        // dropped remotely disappear from the status as well
        let patch = json!({
            "apiVersion": K::api_version(&()),
            "kind": K::kind(&()),
            "metadata": {
                "name": key.name,
                "resourceVersion": Self::resource_version(object, &key)?,
            },
            "status": status,
        });
        self.api(&key.namespace)
            .patch_status(
                &key.name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&patch),
            )
            .await
            .map_err(|e| store_error(e, &key.to_string()))
    }
}

/// [`ArtifactStore`] keeping each artifact in a ConfigMap next to its owner
#[derive(Clone)]
pub struct ConfigMapArtifactStore {
    client: Client,
}

impl std::fmt::Debug for ConfigMapArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigMapArtifactStore").finish_non_exhaustive()
    }
}

impl ConfigMapArtifactStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, owner: &ArtifactOwner) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &owner.namespace)
    }

    fn subject(owner: &ArtifactOwner) -> String {
        format!("configmap {}/{}", owner.namespace, owner.artifact_name())
    }
}

pub(crate) fn artifact_config_map(owner: &ArtifactOwner, data: BTreeMap<String, String>) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(owner.artifact_name()),
            namespace: Some(owner.namespace.clone()),
            labels: Some(BTreeMap::from([
                (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
                (ARTIFACT_KIND_LABEL.to_string(), owner.kind.to_string()),
                (ARTIFACT_OWNER_LABEL.to_string(), owner.name.clone()),
            ])),
            ..ObjectMeta::default()
        },
        data: Some(data),
        ..ConfigMap::default()
    }
}

#[async_trait]
impl ArtifactStore for ConfigMapArtifactStore {
    async fn exists(&self, owner: &ArtifactOwner) -> Result<bool, StoreError> {
        self.api(owner)
            .get_opt(&owner.artifact_name())
            .await
            .map(|cm| cm.is_some())
            .map_err(|e| store_error(e, &Self::subject(owner)))
    }

    async fn put(
        &self,
        owner: &ArtifactOwner,
        data: BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        let config_map = artifact_config_map(owner, data);
        match self.api(owner).create(&PostParams::default(), &config_map).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => {
                debug!(artifact = %owner.artifact_name(), "Artifact already exists, leaving it untouched");
                Ok(())
            }
            Err(e) => Err(store_error(e, &Self::subject(owner))),
        }
    }

    async fn remove(&self, owner: &ArtifactOwner) -> Result<(), StoreError> {
        match self
            .api(owner)
            .delete(&owner.artifact_name(), &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!(artifact = %owner.artifact_name(), "Artifact already absent");
                Ok(())
            }
            Err(e) => Err(store_error(e, &Self::subject(owner))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_config_map_shape() {
        let owner = ArtifactOwner {
            name: "orders".to_string(),
            namespace: "shop".to_string(),
            kind: "ymq",
        };
        let cm = artifact_config_map(
            &owner,
            BTreeMap::from([("url".to_string(), "https://mq.example/orders".to_string())]),
        );
        assert_eq!(cm.metadata.name.as_deref(), Some("orders-ymq"));
        assert_eq!(cm.metadata.namespace.as_deref(), Some("shop"));
        let labels = cm.metadata.labels.expect("labels");
        assert_eq!(labels.get(MANAGED_BY_LABEL).map(String::as_str), Some(MANAGED_BY_VALUE));
        assert_eq!(labels.get(ARTIFACT_KIND_LABEL).map(String::as_str), Some("ymq"));
        assert_eq!(
            cm.data.and_then(|d| d.get("url").cloned()).as_deref(),
            Some("https://mq.example/orders")
        );
    }
}
