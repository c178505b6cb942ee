//! # Object Storage Adapter
//!
//! Yandex Object Storage speaks the S3 wire protocol; buckets are managed
//! through `aws-sdk-s3` with path-style addressing against the storage
//! endpoint. Buckets have no separate identifier, so the bucket name is used.

use super::common::{classify_sdk_error, static_sdk_credentials, EndpointConfig, OperationTracker};
use super::{CloudResourceAdapter, Credentials, ProviderError, RemoteResourceDescriptor};
use crate::config::ControllerConfig;
use crate::crd::YandexObjectStorageSpec;
use async_trait::async_trait;
use aws_sdk_s3::types::{Bucket, BucketCannedAcl};
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, info_span, Instrument};

const KIND: &str = "yos";

/// S3-compatible adapter for Yandex Object Storage
#[derive(Debug, Clone)]
pub struct ObjectStorageAdapter {
    endpoint: EndpointConfig,
}

impl ObjectStorageAdapter {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            endpoint: EndpointConfig {
                endpoint: config.object_storage_endpoint.clone(),
                region: config.cloud_region.clone(),
            },
        }
    }

    fn client(&self, credentials: &Credentials) -> Result<S3Client, ProviderError> {
        let (key_id, secret) = credentials.static_key()?;
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(self.endpoint.region.clone()))
            .endpoint_url(&self.endpoint.endpoint)
            .force_path_style(true)
            .credentials_provider(static_sdk_credentials(key_id, secret))
            .build();
        Ok(S3Client::from_conf(config))
    }
}

fn descriptor(bucket: &Bucket) -> Option<RemoteResourceDescriptor> {
    let name = bucket.name()?.to_string();
    let created_at = bucket
        .creation_date()
        .and_then(|date| DateTime::<Utc>::from_timestamp(date.secs(), date.subsec_nanos()));
    Some(RemoteResourceDescriptor {
        id: name.clone(),
        name,
        created_at,
        labels: BTreeMap::new(),
        attributes: BTreeMap::new(),
    })
}

#[async_trait]
impl CloudResourceAdapter for ObjectStorageAdapter {
    type Params = YandexObjectStorageSpec;

    async fn list(
        &self,
        credentials: &Credentials,
        _params: &Self::Params,
    ) -> Result<Vec<RemoteResourceDescriptor>, ProviderError> {
        let tracker = OperationTracker::start(KIND, "list");
        let result = async {
            let client = self.client(credentials)?;
            let output = client
                .list_buckets()
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e, "buckets", "list"))?;
            let buckets: Vec<_> = output.buckets().iter().filter_map(descriptor).collect();
            debug!(count = buckets.len(), "Listed buckets");
            Ok::<_, ProviderError>(buckets)
        }
        .instrument(info_span!("yos.list"))
        .await;
        tracker.finish(result)
    }

    async fn create(
        &self,
        credentials: &Credentials,
        name: &str,
        params: &Self::Params,
    ) -> Result<(), ProviderError> {
        let tracker = OperationTracker::start(KIND, "create");
        let result = async {
            let client = self.client(credentials)?;
            let mut request = client.create_bucket().bucket(name);
            if let Some(acl) = &params.acl {
                request = request.acl(BucketCannedAcl::from(acl.as_str()));
            }
            match request.send().await {
                Ok(_) => info!(bucket.name = name, "Created bucket"),
                Err(e)
                    if e.as_service_error()
                        .is_some_and(|se| se.is_bucket_already_owned_by_you()) =>
                {
                    debug!(bucket.name = name, "Bucket already owned by this account");
                }
                Err(e) => return Err(classify_sdk_error(&e, name, "create bucket")),
            }
            Ok::<_, ProviderError>(())
        }
        .instrument(info_span!("yos.create", bucket.name = name))
        .await;
        tracker.finish(result)
    }

    async fn delete(
        &self,
        credentials: &Credentials,
        name: &str,
        _params: &Self::Params,
    ) -> Result<(), ProviderError> {
        let tracker = OperationTracker::start(KIND, "delete");
        let result = async {
            let client = self.client(credentials)?;
            client
                .delete_bucket()
                .bucket(name)
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e, name, "delete bucket"))?;
            info!(bucket.name = name, "Deleted bucket");
            Ok::<_, ProviderError>(())
        }
        .instrument(info_span!("yos.delete", bucket.name = name))
        .await;
        tracker.finish(result)
    }
}
