//! # Credentials
//!
//! Resolves the credentials a reconcile hands to a cloud adapter.
//!
//! - Static access keys live in a Kubernetes Secret in the object's namespace
//!   (`key` and `secret` entries), used for the SQS and S3 endpoints.
//! - IAM tokens come from the compute metadata service and are cached until
//!   shortly before they expire, used for the Container Registry REST API.

use super::ProviderError;
use crate::config::ControllerConfig;
use crate::constants::{STATIC_KEY_ID_FIELD, STATIC_KEY_SECRET_FIELD, TOKEN_EXPIRY_MARGIN_SECS};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Where an object's credentials come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsRef {
    /// Secret in the object's namespace holding a static access key
    StaticKeySecret { name: String },
    /// Service account attached to the compute instance
    InstanceServiceAccount,
}

/// Resolved credentials, wiped from memory on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub enum Credentials {
    StaticKey {
        key_id: String,
        secret: String,
    },
    IamToken {
        token: String,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StaticKey { key_id, .. } => f
                .debug_struct("StaticKey")
                .field("key_id", key_id)
                .finish_non_exhaustive(),
            Self::IamToken { .. } => f.debug_struct("IamToken").finish_non_exhaustive(),
        }
    }
}

impl Credentials {
    /// Static access key parts, or a fatal error for any other credential type
    pub fn static_key(&self) -> Result<(&str, &str), ProviderError> {
        match self {
            Self::StaticKey { key_id, secret } => Ok((key_id.as_str(), secret.as_str())),
            Self::IamToken { .. } => Err(ProviderError::Fatal(anyhow!(
                "static access key required, got an IAM token"
            ))),
        }
    }

    /// IAM token, or a fatal error for any other credential type
    pub fn iam_token(&self) -> Result<&str, ProviderError> {
        match self {
            Self::IamToken { token } => Ok(token.as_str()),
            Self::StaticKey { .. } => Err(ProviderError::Fatal(anyhow!(
                "IAM token required, got a static access key"
            ))),
        }
    }
}

/// Source of credentials for cloud adapters
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    async fn resolve(
        &self,
        namespace: &str,
        reference: &CredentialsRef,
    ) -> Result<Credentials, ProviderError>;
}

/// IAM token response from the compute metadata service
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

impl Drop for CachedToken {
    fn drop(&mut self) {
        self.token.zeroize();
    }
}

/// Credentials backed by Kubernetes Secrets and the compute metadata service
pub struct KubeCredentialsProvider {
    client: Client,
    http_client: HttpClient,
    metadata_token_url: String,
    cached_token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for KubeCredentialsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCredentialsProvider")
            .field("metadata_token_url", &self.metadata_token_url)
            .finish_non_exhaustive()
    }
}

impl KubeCredentialsProvider {
    /// Create a provider reading Secrets through `client`
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(client: Client, config: &ControllerConfig) -> anyhow::Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            http_client,
            metadata_token_url: config.metadata_token_url.clone(),
            cached_token: Mutex::new(None),
        })
    }

    async fn static_key(&self, namespace: &str, name: &str) -> Result<Credentials, ProviderError> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = secrets
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to read secret {namespace}/{name}"))
            .map_err(ProviderError::Transient)?
            // The secret may simply not be created yet
            .ok_or_else(|| {
                ProviderError::Transient(anyhow!("access key secret {namespace}/{name} not found"))
            })?;

        let field = |key: &str| -> Result<String, ProviderError> {
            let bytes = secret
                .data
                .as_ref()
                .and_then(|data| data.get(key))
                .ok_or_else(|| {
                    ProviderError::Fatal(anyhow!(
                        "access key secret {namespace}/{name} has no '{key}' entry"
                    ))
                })?;
            String::from_utf8(bytes.0.clone()).map_err(|e| {
                ProviderError::Fatal(anyhow!(
                    "access key secret {namespace}/{name} entry '{key}' is not UTF-8: {e}"
                ))
            })
        };

        Ok(Credentials::StaticKey {
            key_id: field(STATIC_KEY_ID_FIELD)?,
            secret: field(STATIC_KEY_SECRET_FIELD)?,
        })
    }

    async fn iam_token(&self) -> Result<Credentials, ProviderError> {
        let mut cached = self.cached_token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(Credentials::IamToken {
                    token: token.token.clone(),
                });
            }
        }

        debug!("Requesting IAM token from metadata service");
        let response = self
            .http_client
            .get(&self.metadata_token_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .context("Metadata service not available")
            .map_err(ProviderError::Transient)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Transient(anyhow!(
                "Metadata service returned status {status}: {body}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response from metadata service")
            .map_err(ProviderError::Transient)?;
        info!(
            expires_in = token_response.expires_in,
            "Retrieved IAM token from metadata service"
        );

        let lifetime = token_response
            .expires_in
            .saturating_sub(TOKEN_EXPIRY_MARGIN_SECS);
        let token = token_response.access_token;
        *cached = Some(CachedToken {
            token: token.clone(),
            refresh_at: Instant::now() + Duration::from_secs(lifetime),
        });
        Ok(Credentials::IamToken { token })
    }
}

#[async_trait]
impl CredentialsProvider for KubeCredentialsProvider {
    async fn resolve(
        &self,
        namespace: &str,
        reference: &CredentialsRef,
    ) -> Result<Credentials, ProviderError> {
        match reference {
            CredentialsRef::StaticKeySecret { name } => self.static_key(namespace, name).await,
            CredentialsRef::InstanceServiceAccount => self.iam_token().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials::StaticKey {
            key_id: "AKID".to_string(),
            secret: "very-secret".to_string(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("AKID"));
        assert!(!debug.contains("very-secret"));

        let token = Credentials::IamToken {
            token: "t1.9euelZ".to_string(),
        };
        assert!(!format!("{token:?}").contains("t1.9euelZ"));
    }

    #[test]
    fn test_accessors_reject_wrong_credential_type() {
        let token = Credentials::IamToken {
            token: "t".to_string(),
        };
        assert!(matches!(token.static_key(), Err(ProviderError::Fatal(_))));
        assert_eq!(token.iam_token().ok(), Some("t"));

        let key = Credentials::StaticKey {
            key_id: "id".to_string(),
            secret: "s".to_string(),
        };
        assert!(matches!(key.iam_token(), Err(ProviderError::Fatal(_))));
        assert_eq!(key.static_key().ok(), Some(("id", "s")));
    }
}
