//! # Message Queue Adapter
//!
//! Yandex Message Queue speaks the SQS wire protocol, so queues are managed
//! through `aws-sdk-sqs` pointed at the Message Queue endpoint.
//!
//! A queue's URL is its identifier. `get` resolves the URL directly by name
//! instead of listing every queue.

use super::common::{classify_sdk_error, static_sdk_credentials, EndpointConfig, OperationTracker};
use super::{CloudResourceAdapter, Credentials, ProviderError, RemoteResourceDescriptor, ATTRIBUTE_URL};
use crate::config::ControllerConfig;
use crate::crd::YandexMessageQueueSpec;
use async_trait::async_trait;
use aws_sdk_sqs::types::QueueAttributeName;
use aws_sdk_sqs::Client as SqsClient;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, info_span, Instrument};

const KIND: &str = "ymq";

/// SQS-compatible adapter for Yandex Message Queue
#[derive(Debug, Clone)]
pub struct MessageQueueAdapter {
    endpoint: EndpointConfig,
}

impl MessageQueueAdapter {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            endpoint: EndpointConfig {
                endpoint: config.message_queue_endpoint.clone(),
                region: config.cloud_region.clone(),
            },
        }
    }

    fn client(&self, credentials: &Credentials) -> Result<SqsClient, ProviderError> {
        let (key_id, secret) = credentials.static_key()?;
        let config = aws_sdk_sqs::Config::builder()
            .behavior_version(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(self.endpoint.region.clone()))
            .endpoint_url(&self.endpoint.endpoint)
            .credentials_provider(static_sdk_credentials(key_id, secret))
            .build();
        Ok(SqsClient::from_conf(config))
    }

    async fn queue_url(&self, client: &SqsClient, name: &str) -> Result<String, ProviderError> {
        let output = client
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e, name, "resolve URL of queue"))?;
        output
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::NotFound(name.to_string()))
    }

    async fn created_at(
        &self,
        client: &SqsClient,
        url: &str,
    ) -> Result<Option<DateTime<Utc>>, ProviderError> {
        let output = client
            .get_queue_attributes()
            .queue_url(url)
            .attribute_names(QueueAttributeName::CreatedTimestamp)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e, url, "read attributes of queue"))?;
        Ok(output
            .attributes()
            .and_then(|attrs| attrs.get(&QueueAttributeName::CreatedTimestamp))
            .and_then(|ts| parse_epoch_seconds(ts)))
    }
}

/// Queue name is the last path segment of its URL
pub(crate) fn queue_name_from_url(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}

fn parse_epoch_seconds(value: &str) -> Option<DateTime<Utc>> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

fn descriptor(url: String, created_at: Option<DateTime<Utc>>) -> RemoteResourceDescriptor {
    RemoteResourceDescriptor {
        name: queue_name_from_url(&url).to_string(),
        created_at,
        labels: BTreeMap::new(),
        attributes: BTreeMap::from([(ATTRIBUTE_URL.to_string(), url.clone())]),
        id: url,
    }
}

/// Queue attributes to set at creation, derived from the spec
fn creation_attributes(params: &YandexMessageQueueSpec) -> Vec<(QueueAttributeName, String)> {
    let mut attributes = Vec::new();
    if params.fifo_queue {
        attributes.push((QueueAttributeName::FifoQueue, "true".to_string()));
        if params.content_based_deduplication {
            attributes.push((QueueAttributeName::ContentBasedDeduplication, "true".to_string()));
        }
    }
    let numeric = [
        (QueueAttributeName::DelaySeconds, params.delay_seconds),
        (QueueAttributeName::MaximumMessageSize, params.maximum_message_size),
        (QueueAttributeName::MessageRetentionPeriod, params.message_retention_period),
        (
            QueueAttributeName::ReceiveMessageWaitTimeSeconds,
            params.receive_message_wait_time_seconds,
        ),
        (QueueAttributeName::VisibilityTimeout, params.visibility_timeout),
    ];
    attributes.extend(
        numeric
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v.to_string()))),
    );
    attributes
}

#[async_trait]
impl CloudResourceAdapter for MessageQueueAdapter {
    type Params = YandexMessageQueueSpec;

    async fn list(
        &self,
        credentials: &Credentials,
        _params: &Self::Params,
    ) -> Result<Vec<RemoteResourceDescriptor>, ProviderError> {
        let tracker = OperationTracker::start(KIND, "list");
        let result = async {
            let client = self.client(credentials)?;
            let mut queues = Vec::new();
            let mut next_token: Option<String> = None;
            loop {
                let output = client
                    .list_queues()
                    .max_results(1000)
                    .set_next_token(next_token.take())
                    .send()
                    .await
                    .map_err(|e| classify_sdk_error(&e, "queues", "list"))?;
                queues.extend(
                    output
                        .queue_urls()
                        .iter()
                        .map(|url| descriptor(url.clone(), None)),
                );
                match output.next_token() {
                    Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                    _ => break,
                }
            }
            debug!(count = queues.len(), "Listed message queues");
            Ok::<_, ProviderError>(queues)
        }
        .instrument(info_span!("ymq.list"))
        .await;
        tracker.finish(result)
    }

    async fn get(
        &self,
        credentials: &Credentials,
        name: &str,
        _params: &Self::Params,
    ) -> Result<Option<RemoteResourceDescriptor>, ProviderError> {
        let tracker = OperationTracker::start(KIND, "get");
        let result = async {
            let client = self.client(credentials)?;
            let url = match self.queue_url(&client, name).await {
                Ok(url) => url,
                Err(ProviderError::NotFound(_)) => return Ok(None),
                Err(e) => return Err(e),
            };
            let created_at = match self.created_at(&client, &url).await {
                Ok(created_at) => created_at,
                // Deleted between the two calls
                Err(ProviderError::NotFound(_)) => return Ok(None),
                Err(e) => return Err(e),
            };
            Ok::<_, ProviderError>(Some(descriptor(url, created_at)))
        }
        .instrument(info_span!("ymq.get", queue.name = name))
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
            let mut request = client.create_queue().queue_name(name);
            for (attribute, value) in creation_attributes(params) {
                request = request.attributes(attribute, value);
            }
            let output = request
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e, name, "create queue"))?;
            info!(
                queue.name = name,
                queue.url = output.queue_url().unwrap_or_default(),
                "Created message queue"
            );
            Ok::<_, ProviderError>(())
        }
        .instrument(info_span!("ymq.create", queue.name = name))
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
            let url = self.queue_url(&client, name).await?;
            client
                .delete_queue()
                .queue_url(&url)
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e, name, "delete queue"))?;
            info!(queue.name = name, queue.url = %url, "Deleted message queue");
            Ok::<_, ProviderError>(())
        }
        .instrument(info_span!("ymq.delete", queue.name = name))
        .await;
        tracker.finish(result)
    }
}
