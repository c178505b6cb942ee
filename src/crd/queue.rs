//! `YandexMessageQueue` custom resource.
//!
//! The only kind that publishes a derived artifact: a ConfigMap holding the
//! queue URL under the `url` key.

use super::validation::validate_queue_name;
use super::{ConnectorStatus, ManagedResource};
use crate::provider::{CredentialsRef, RemoteResourceDescriptor, ATTRIBUTE_URL};
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Yandex Message Queue
///
/// # Example
///
/// ```yaml
/// apiVersion: connectors.cloud.yandex.com/v1
/// kind: YandexMessageQueue
/// metadata:
///   name: orders
///   namespace: shop
/// spec:
///   name: orders.fifo
///   fifoQueue: true
///   contentBasedDeduplication: true
///   saKeyName: ymq-access-key
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[kube(
    kind = "YandexMessageQueue",
    group = "connectors.cloud.yandex.com",
    version = "v1",
    namespaced,
    status = "QueueStatus",
    shortname = "ymq",
    printcolumn = r#"{"name":"URL", "type":"string", "jsonPath":".status.queueUrl"}"#,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct YandexMessageQueueSpec {
    /// Queue name in the cloud; FIFO queues must end with `.fifo`
    pub name: String,
    #[serde(default)]
    pub fifo_queue: bool,
    /// Only valid for FIFO queues
    #[serde(default)]
    pub content_based_deduplication: bool,
    #[serde(default)]
    pub delay_seconds: Option<i32>,
    #[serde(default)]
    pub maximum_message_size: Option<i32>,
    #[serde(default)]
    pub message_retention_period: Option<i32>,
    #[serde(default)]
    pub receive_message_wait_time_seconds: Option<i32>,
    #[serde(default)]
    pub visibility_timeout: Option<i32>,
    /// Secret holding the static access key (`key` and `secret`)
    pub sa_key_name: String,
}

/// Observed state of a message queue
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    #[serde(flatten)]
    pub common: ConnectorStatus,
    /// URL clients use to send and receive messages
    #[serde(default)]
    pub queue_url: String,
}

impl YandexMessageQueueSpec {
    fn check_bounds(&self) -> Result<(), String> {
        let bounds: [(&str, Option<i32>, i32, i32); 5] = [
            ("delaySeconds", self.delay_seconds, 0, 900),
            ("maximumMessageSize", self.maximum_message_size, 1024, 262_144),
            ("messageRetentionPeriod", self.message_retention_period, 60, 1_209_600),
            (
                "receiveMessageWaitTimeSeconds",
                self.receive_message_wait_time_seconds,
                0,
                20,
            ),
            ("visibilityTimeout", self.visibility_timeout, 0, 43_200),
        ];
        for (field, value, min, max) in bounds {
            if let Some(value) = value {
                if !(min..=max).contains(&value) {
                    return Err(format!("{field} must be between {min} and {max}, got {value}"));
                }
            }
        }
        Ok(())
    }
}

impl ManagedResource for YandexMessageQueue {
    type Params = YandexMessageQueueSpec;

    const KIND_TAG: &'static str = "ymq";
    const FINALIZER: &'static str = "ymq.connectors.cloud.yandex.com/finalizer";

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
        validate_queue_name(&self.spec.name, self.spec.fifo_queue)?;
        if self.spec.content_based_deduplication && !self.spec.fifo_queue {
            return Err("contentBasedDeduplication requires fifoQueue".to_string());
        }
        if self.spec.sa_key_name.trim().is_empty() {
            return Err("saKeyName must not be empty".to_string());
        }
        self.spec.check_bounds()
    }

    fn connector_status(&self) -> Option<&ConnectorStatus> {
        self.status.as_ref().map(|s| &s.common)
    }

    fn connector_status_mut(&mut self) -> &mut ConnectorStatus {
        &mut self.status.get_or_insert_with(QueueStatus::default).common
    }

    fn project_kind_status(&mut self, descriptor: &RemoteResourceDescriptor) {
        // The queue URL doubles as its identifier
        let url = descriptor
            .attributes
            .get(ATTRIBUTE_URL)
            .cloned()
            .unwrap_or_else(|| descriptor.id.clone());
        self.status.get_or_insert_with(QueueStatus::default).queue_url = url;
    }

    fn materializes_artifact() -> bool {
        true
    }

    fn artifact_data(&self) -> Option<BTreeMap<String, String>> {
        let url = self.status.as_ref().map(|s| s.queue_url.as_str())?;
        if url.is_empty() {
            return None;
        }
        Some(BTreeMap::from([(ATTRIBUTE_URL.to_string(), url.to_string())]))
    }
}
