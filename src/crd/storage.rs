//! `YandexObjectStorage` custom resource.

use super::validation::{validate_bucket_acl, validate_bucket_name};
use super::{ConnectorStatus, ManagedResource};
use crate::provider::CredentialsRef;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Yandex Object Storage bucket
///
/// # Example
///
/// ```yaml
/// apiVersion: connectors.cloud.yandex.com/v1
/// kind: YandexObjectStorage
/// metadata:
///   name: assets
///   namespace: shop
/// spec:
///   name: shop-assets
///   acl: private
///   saKeyName: yos-access-key
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[kube(
    kind = "YandexObjectStorage",
    group = "connectors.cloud.yandex.com",
    version = "v1",
    namespaced,
    status = "ConnectorStatus",
    shortname = "yos",
    printcolumn = r#"{"name":"Bucket", "type":"string", "jsonPath":".spec.name"}"#,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct YandexObjectStorageSpec {
    /// Bucket name (globally unique)
    pub name: String,
    /// Canned ACL applied at creation
    #[serde(default)]
    pub acl: Option<String>,
    /// Secret holding the static access key (`key` and `secret`)
    pub sa_key_name: String,
}

impl ManagedResource for YandexObjectStorage {
    type Params = YandexObjectStorageSpec;

    const KIND_TAG: &'static str = "yos";
    const FINALIZER: &'static str = "yos.connectors.cloud.yandex.com/finalizer";

    fn params(&self) -> &Self::Params {
        &self.spec
    }

    fn desired_name(&self) -> &str {
        &self.spec.name
    }

    fn rebind(&mut self, identity: &str) {
        self.spec.name = identity.to_string();
    }

    fn credentials_ref(&self) -> CredentialsRef {
        CredentialsRef::StaticKeySecret {
            name: self.spec.sa_key_name.clone(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        validate_bucket_name(&self.spec.name)?;
        if let Some(acl) = &self.spec.acl {
            validate_bucket_acl(acl)?;
        }
        if self.spec.sa_key_name.trim().is_empty() {
            return Err("saKeyName must not be empty".to_string());
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
