//! # Stores
//!
//! Narrow interfaces over the declarative object store and the derived
//! artifact store. The reconciler depends only on these traits; `kubernetes.rs`
//! backs them with the Kubernetes API.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

mod kubernetes;

pub use kubernetes::{ConfigMapArtifactStore, KubeObjectStore};

/// Namespaced identity of an object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Failure of a store operation
#[derive(Debug, Error)]
pub enum StoreError {
    /// The write was based on a stale version of the object
    #[error("write conflict on {0}")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("transient store failure: {0:#}")]
    Transient(anyhow::Error),
    #[error("fatal store failure: {0:#}")]
    Fatal(anyhow::Error),
}

impl StoreError {
    /// Classify an API status code
    pub fn from_status(code: u16, subject: &str, message: &str) -> Self {
        match code {
            409 => Self::Conflict(subject.to_string()),
            404 => Self::NotFound(subject.to_string()),
            400 | 403 | 422 => Self::Fatal(anyhow::anyhow!("{subject}: {message}")),
            _ => Self::Transient(anyhow::anyhow!("{subject}: {message}")),
        }
    }
}

/// Key-addressed access to the objects of one kind
///
/// Both writes use optimistic concurrency: they fail with
/// [`StoreError::Conflict`] when the object changed since it was read.
#[async_trait]
pub trait ObjectStore<K>: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError>;

    /// Persist metadata and spec (finalizers live here)
    async fn update(&self, object: &K) -> Result<K, StoreError>;

    /// Persist the status subresource
    async fn update_status(&self, object: &K) -> Result<K, StoreError>;
}

/// Identity of a derived artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactOwner {
    pub name: String,
    pub namespace: String,
    /// Short kind tag of the owning object
    pub kind: &'static str,
}

impl ArtifactOwner {
    /// Name of the artifact derived from its owner
    pub fn artifact_name(&self) -> String {
        format!("{}-{}", self.name, self.kind)
    }
}

/// Storage for the small key/value artifacts published for consumers
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn exists(&self, owner: &ArtifactOwner) -> Result<bool, StoreError>;

    /// Create the artifact; an artifact that already exists is left untouched
    async fn put(&self, owner: &ArtifactOwner, data: BTreeMap<String, String>)
        -> Result<(), StoreError>;

    /// Remove the artifact; absence counts as success
    async fn remove(&self, owner: &ArtifactOwner) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::new("shop", "orders").to_string(), "shop/orders");
    }

    #[test]
    fn test_artifact_name_includes_kind_tag() {
        let owner = ArtifactOwner {
            name: "orders".to_string(),
            namespace: "shop".to_string(),
            kind: "ymq",
        };
        assert_eq!(owner.artifact_name(), "orders-ymq");
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            StoreError::from_status(409, "shop/orders", "conflict"),
            StoreError::Conflict(_)
        ));
        assert!(matches!(
            StoreError::from_status(404, "shop/orders", "missing"),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            StoreError::from_status(422, "shop/orders", "invalid"),
            StoreError::Fatal(_)
        ));
        assert!(matches!(
            StoreError::from_status(500, "shop/orders", "oops"),
            StoreError::Transient(_)
        ));
    }
}
