//! # Provider Modules
//!
//! Wire adapters for the cloud APIs behind each connector kind.
//!
//! Every adapter implements [`CloudResourceAdapter`]. The reconciler only
//! ever sees that trait, the [`RemoteResourceDescriptor`] it returns and the
//! [`ProviderError`] taxonomy.
//!
//! - `registry.rs` - Container Registry (REST, IAM token)
//! - `queue.rs` - Message Queue (SQS-compatible, static access key)
//! - `storage.rs` - Object Storage (S3-compatible, static access key)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

mod common;
mod credentials;
mod error;
pub mod queue;
pub mod registry;
pub mod storage;

pub use credentials::{Credentials, CredentialsProvider, CredentialsRef, KubeCredentialsProvider};
pub use error::ProviderError;

/// Descriptor attribute holding a resource's endpoint URL
pub const ATTRIBUTE_URL: &str = "url";

/// Remote state of a cloud resource as reported by the provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteResourceDescriptor {
    /// Provider-assigned identifier
    pub id: String,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub labels: BTreeMap<String, String>,
    /// Kind-specific attributes (for example [`ATTRIBUTE_URL`] for queues)
    pub attributes: BTreeMap<String, String>,
}

/// Adapter trait for one kind of remote cloud resource
///
/// All operations are keyed by the resource name from the object's spec.
/// Callers do list-before-create; `create` itself is not idempotent.
#[async_trait]
pub trait CloudResourceAdapter: Send + Sync {
    /// Desired attributes taken from the object's spec
    type Params: Send + Sync;

    /// List every resource visible with these credentials
    async fn list(
        &self,
        credentials: &Credentials,
        params: &Self::Params,
    ) -> Result<Vec<RemoteResourceDescriptor>, ProviderError>;

    /// Look up one resource by name
    ///
    /// The default implementation lists and scans; adapters with a direct
    /// lookup override it.
    async fn get(
        &self,
        credentials: &Credentials,
        name: &str,
        params: &Self::Params,
    ) -> Result<Option<RemoteResourceDescriptor>, ProviderError> {
        let resources = self.list(credentials, params).await?;
        Ok(resources.into_iter().find(|r| r.name == name))
    }

    async fn create(
        &self,
        credentials: &Credentials,
        name: &str,
        params: &Self::Params,
    ) -> Result<(), ProviderError>;

    /// Delete a resource; fails with [`ProviderError::NotFound`] when it is already gone
    async fn delete(
        &self,
        credentials: &Credentials,
        name: &str,
        params: &Self::Params,
    ) -> Result<(), ProviderError>;
}
