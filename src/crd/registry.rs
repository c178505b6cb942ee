//! `YandexContainerRegistry` custom resource.

use super::validation::validate_registry_name;
use super::{ConnectorStatus, ManagedResource};
use crate::provider::CredentialsRef;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Yandex Container Registry
///
/// # Example
///
/// ```yaml
/// apiVersion: connectors.cloud.yandex.com/v1
/// kind: YandexContainerRegistry
/// metadata:
///   name: images
///   namespace: default
/// spec:
///   name: team-images
///   folderId: b1g2h3j4k5l6m7n8p9q0
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[kube(
    kind = "YandexContainerRegistry",
    group = "connectors.cloud.yandex.com",
    version = "v1",
    namespaced,
    status = "ConnectorStatus",
    shortname = "ycr",
    printcolumn = r#"{"name":"Remote ID", "type":"string", "jsonPath":".status.remoteId"}"#,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct YandexContainerRegistrySpec {
    /// Registry name in the cloud
    pub name: String,
    /// Folder the registry belongs to
    pub folder_id: String,
}

impl ManagedResource for YandexContainerRegistry {
    type Params = YandexContainerRegistrySpec;

    const KIND_TAG: &'static str = "ycr";
    const FINALIZER: &'static str = "ycr.connectors.cloud.yandex.com/finalizer";

    fn params(&self) -> &Self::Params {
        &self.spec
    }

    fn desired_name(&self) -> &str {
        &self.spec.name
    }

    fn remote_identity(&self) -> String {
        format!("{}/{}", self.spec.folder_id, self.spec.name)
    }

    fn rebind(&mut self, identity: &str) {
        match identity.split_once('/') {
            Some((folder_id, name)) => {
                self.spec.folder_id = folder_id.to_string();
                self.spec.name = name.to_string();
            }
            None => self.spec.name = identity.to_string(),
        }
    }

    // Registry API calls authenticate as the node's service account
    fn credentials_ref(&self) -> CredentialsRef {
        CredentialsRef::InstanceServiceAccount
    }

    fn validate(&self) -> Result<(), String> {
        validate_registry_name(&self.spec.name)?;
        if self.spec.folder_id.trim().is_empty() {
            return Err("folderId must not be empty".to_string());
        }
        Ok(())
    }

    fn connector_status(&self) -> Option<&ConnectorStatus> {
        self.status.as_ref()
    }

    fn connector_status_mut(&mut self) -> &mut ConnectorStatus {
        self.status.get_or_insert_with(ConnectorStatus::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(name: &str, folder: &str) -> YandexContainerRegistry {
        YandexContainerRegistry::new(
            "images",
            YandexContainerRegistrySpec {
                name: name.to_string(),
                folder_id: folder.to_string(),
            },
        )
    }

    #[test]
    fn test_validate_requires_folder() {
        assert!(registry("team-images", "b1g").validate().is_ok());
        assert!(registry("team-images", " ").validate().is_err());
        assert!(registry("Team", "b1g").validate().is_err());
    }

    #[test]
    fn test_spec_deserializes_from_camel_case() {
        let spec: YandexContainerRegistrySpec =
            serde_json::from_str(r#"{"name":"team-images","folderId":"b1g"}"#)
                .expect("deserialize");
        assert_eq!(spec.folder_id, "b1g");
    }

    #[test]
    fn test_folder_change_breaks_binding() {
        let mut object = registry("team-images", "b1g");
        assert!(object.verify_binding().is_ok());

        let status = object.connector_status_mut();
        status.remote_id = "crp123".to_string();
        status.remote_identity = "b1g/team-images".to_string();
        assert!(object.verify_binding().is_ok());

        object.spec.folder_id = "b1gother".to_string();
        let err = object.verify_binding().expect_err("folder moved");
        assert!(err.contains("b1g/team-images"));

        let identity = object.bound_identity().map(str::to_string).expect("bound");
        object.rebind(&identity);
        assert_eq!(object.spec.folder_id, "b1g");
        assert_eq!(object.spec.name, "team-images");
    }
}
