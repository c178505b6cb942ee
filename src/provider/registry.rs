//! # Container Registry Adapter
//!
//! REST client for the Yandex Container Registry API v1.
//! Uses reqwest for HTTP requests and an IAM bearer token for authentication.
//!
//! Create and delete return long-running operations. The adapter does not
//! wait for them: the reconciler re-reads the registry list afterwards and
//! treats a registry that is not visible yet as a transient condition.
//!
//! References:
//! - [Container Registry REST API](https://yandex.cloud/en/docs/container-registry/api-ref/Registry/)

use super::common::OperationTracker;
use super::error::{classify_http_status, ErrorClass};
use super::{CloudResourceAdapter, Credentials, ProviderError, RemoteResourceDescriptor};
use crate::config::ControllerConfig;
use crate::crd::YandexContainerRegistrySpec;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, info_span, Instrument};

const KIND: &str = "ycr";

/// Registries requested per page when listing
const PAGE_SIZE: u32 = 1000;

/// Descriptor attribute holding the folder a registry lives in
pub const ATTRIBUTE_FOLDER_ID: &str = "folderId";

/// Descriptor attribute holding the registry lifecycle status
pub const ATTRIBUTE_STATUS: &str = "status";

// ============================================================================
// Container Registry REST API Request/Response Structures
// ============================================================================

/// Registry resource as returned by `registries.list`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Registry {
    id: String,
    #[serde(default)]
    folder_id: String,
    name: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRegistriesResponse {
    #[serde(default)]
    registries: Vec<Registry>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRegistryRequest<'a> {
    folder_id: &'a str,
    name: &'a str,
}

/// Long-running operation returned by create and delete
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Operation {
    id: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
}

/// Error payload, both for failed operations and error responses
#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

/// Map a gRPC status code carried by an operation error
fn classify_rpc_code(code: i32) -> ErrorClass {
    match code {
        // NOT_FOUND
        5 => ErrorClass::NotFound,
        // INVALID_ARGUMENT, PERMISSION_DENIED, FAILED_PRECONDITION, UNAUTHENTICATED
        3 | 7 | 9 | 16 => ErrorClass::Fatal,
        _ => ErrorClass::Transient,
    }
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))
}

impl From<Registry> for RemoteResourceDescriptor {
    fn from(registry: Registry) -> Self {
        let mut attributes = BTreeMap::from([(ATTRIBUTE_FOLDER_ID.to_string(), registry.folder_id)]);
        if let Some(status) = registry.status {
            attributes.insert(ATTRIBUTE_STATUS.to_string(), status);
        }
        Self {
            created_at: parse_timestamp(registry.created_at.as_deref()),
            id: registry.id,
            name: registry.name,
            labels: registry.labels,
            attributes,
        }
    }
}

/// Container Registry REST client
pub struct ContainerRegistryAdapter {
    http_client: Client,
    base_url: String,
}

impl std::fmt::Debug for ContainerRegistryAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerRegistryAdapter")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ContainerRegistryAdapter {
    /// Create a client for the configured registry endpoint
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: &ControllerConfig) -> anyhow::Result<Self> {
        Self::with_base_url(&config.container_registry_endpoint)
    }

    /// Create a client for an explicit base URL (mock servers, private endpoints)
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn with_base_url(base_url: &str) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build HTTP request with authentication headers
    fn make_request(
        &self,
        method: Method,
        path: &str,
        credentials: &Credentials,
    ) -> Result<RequestBuilder, ProviderError> {
        let token = credentials.iam_token()?;
        Ok(self
            .http_client
            .request(method, format!("{}/{}", self.base_url, path))
            .bearer_auth(token)
            .header("Content-Type", "application/json"))
    }

    async fn send(request: RequestBuilder, subject: &str) -> Result<reqwest::Response, ProviderError> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Container Registry request for {subject} failed"))
            .map_err(ProviderError::Transient)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Self::error_response(status, &body, subject))
    }

    /// Handle Container Registry API error responses
    fn error_response(status: StatusCode, body: &str, subject: &str) -> ProviderError {
        let message = serde_json::from_str::<OperationError>(body)
            .map(|e| e.message)
            .unwrap_or_else(|_| body.to_string());
        ProviderError::from_class(
            classify_http_status(status),
            subject,
            anyhow!("Container Registry API error for {subject} (status {status}): {message}"),
        )
    }

    /// Surface a failed long-running operation
    fn check_operation(operation: Operation, subject: &str) -> Result<(), ProviderError> {
        match operation.error {
            Some(error) if operation.done => Err(ProviderError::from_class(
                classify_rpc_code(error.code),
                subject,
                anyhow!(
                    "operation {} for {subject} failed with code {}: {}",
                    operation.id,
                    error.code,
                    error.message
                ),
            )),
            _ => {
                debug!(operation.id = %operation.id, done = operation.done, "Registry operation accepted");
                Ok(())
            }
        }
    }

    async fn list_registries(
        &self,
        credentials: &Credentials,
        folder_id: &str,
    ) -> Result<Vec<Registry>, ProviderError> {
        let mut registries = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("folderId", folder_id.to_string()),
                ("pageSize", PAGE_SIZE.to_string()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }
            let request = self
                .make_request(Method::GET, "registries", credentials)?
                .query(&query);
            let page: ListRegistriesResponse = Self::send(request, folder_id)
                .await?
                .json()
                .await
                .context("Failed to parse registries list response")
                .map_err(ProviderError::Transient)?;
            registries.extend(page.registries);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
        Ok(registries)
    }
}

#[async_trait]
impl CloudResourceAdapter for ContainerRegistryAdapter {
    type Params = YandexContainerRegistrySpec;

    async fn list(
        &self,
        credentials: &Credentials,
        params: &Self::Params,
    ) -> Result<Vec<RemoteResourceDescriptor>, ProviderError> {
        let tracker = OperationTracker::start(KIND, "list");
        let result = self
            .list_registries(credentials, &params.folder_id)
            .instrument(info_span!("ycr.list", folder.id = %params.folder_id))
            .await
            .map(|registries| registries.into_iter().map(Into::into).collect());
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
            let request = self
                .make_request(Method::POST, "registries", credentials)?
                .json(&CreateRegistryRequest {
                    folder_id: &params.folder_id,
                    name,
                });
            let operation: Operation = Self::send(request, name)
                .await?
                .json()
                .await
                .context("Failed to parse create registry operation")
                .map_err(ProviderError::Transient)?;
            Self::check_operation(operation, name)?;
            info!(registry.name = name, folder.id = %params.folder_id, "Requested registry creation");
            Ok::<_, ProviderError>(())
        }
        .instrument(info_span!("ycr.create", registry.name = name))
        .await;
        tracker.finish(result)
    }

    async fn delete(
        &self,
        credentials: &Credentials,
        name: &str,
        params: &Self::Params,
    ) -> Result<(), ProviderError> {
        let tracker = OperationTracker::start(KIND, "delete");
        let result = async {
            // Deletion is by id, so resolve the name first
            let registry = self
                .list_registries(credentials, &params.folder_id)
                .await?
                .into_iter()
                .find(|r| r.name == name)
                .ok_or_else(|| ProviderError::NotFound(name.to_string()))?;
            let request = self.make_request(
                Method::DELETE,
                &format!("registries/{}", registry.id),
                credentials,
            )?;
            let operation: Operation = Self::send(request, name)
                .await?
                .json()
                .await
                .context("Failed to parse delete registry operation")
                .map_err(ProviderError::Transient)?;
            Self::check_operation(operation, name)?;
            info!(registry.name = name, registry.id = %registry.id, "Requested registry deletion");
            Ok::<_, ProviderError>(())
        }
        .instrument(info_span!("ycr.delete", registry.name = name))
        .await;
        tracker.finish(result)
    }
}
