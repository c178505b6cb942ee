//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::crd::ManagedResource;
use crate::provider::{CloudResourceAdapter, CredentialsProvider, ProviderError};
use crate::store::{ArtifactStore, ObjectKey, ObjectStore, StoreError};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use thiserror::Error;
use tracing::warn;

/// Step of the reconcile protocol, carried by every failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    FetchObject,
    ValidateSpec,
    EnsureFinalizer,
    ResolveCredentials,
    AllocateResource,
    SyncStatus,
    ProvideArtifact,
    DeallocateResource,
    RemoveArtifact,
    RemoveFinalizer,
    RecordCondition,
}

impl Operation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::FetchObject => "fetch_object",
            Operation::ValidateSpec => "validate_spec",
            Operation::EnsureFinalizer => "ensure_finalizer",
            Operation::ResolveCredentials => "resolve_credentials",
            Operation::AllocateResource => "allocate_resource",
            Operation::SyncStatus => "sync_status",
            Operation::ProvideArtifact => "provide_artifact",
            Operation::DeallocateResource => "deallocate_resource",
            Operation::RemoveArtifact => "remove_artifact",
            Operation::RemoveFinalizer => "remove_finalizer",
            Operation::RecordCondition => "record_condition",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// Retrying later may succeed
    #[error("{operation} failed for {object}: {source:#}")]
    Transient {
        operation: Operation,
        object: String,
        source: anyhow::Error,
    },
    /// Retrying cannot succeed until the object or its environment changes
    #[error("{operation} failed permanently for {object}: {source:#}")]
    Fatal {
        operation: Operation,
        object: String,
        source: anyhow::Error,
    },
}

impl ReconcilerError {
    pub fn transient(operation: Operation, key: &ObjectKey, source: anyhow::Error) -> Self {
        Self::Transient {
            operation,
            object: key.to_string(),
            source,
        }
    }

    pub fn fatal(operation: Operation, key: &ObjectKey, source: anyhow::Error) -> Self {
        Self::Fatal {
            operation,
            object: key.to_string(),
            source,
        }
    }

    /// Wrap a provider failure; a not-found that reaches here is unexpected and retried
    pub fn from_provider(operation: Operation, key: &ObjectKey, err: ProviderError) -> Self {
        match err {
            ProviderError::Fatal(source) => Self::fatal(operation, key, source),
            ProviderError::Transient(source) => Self::transient(operation, key, source),
            not_found @ ProviderError::NotFound(_) => {
                Self::transient(operation, key, anyhow::Error::new(not_found))
            }
        }
    }

    /// Wrap a store failure; only explicitly fatal store errors are fatal
    pub fn from_store(operation: Operation, key: &ObjectKey, err: StoreError) -> Self {
        match err {
            StoreError::Fatal(source) => Self::fatal(operation, key, source),
            StoreError::Transient(source) => Self::transient(operation, key, source),
            other => Self::transient(operation, key, anyhow::Error::new(other)),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::Transient { operation, .. } | Self::Fatal { operation, .. } => *operation,
        }
    }

    /// Error class label for logs and metrics
    pub fn class(&self) -> &'static str {
        match self {
            Self::Transient { .. } => "transient",
            Self::Fatal { .. } => "fatal",
        }
    }
}

/// Result of a successful reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Remote resource exists and the status reflects it
    Synced,
    /// Remote resource and artifact are gone and the finalizer was removed
    Finalized,
    /// Object is being deleted and no longer carries the finalizer
    Released,
    /// Object no longer exists in the store
    Absent,
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
    /// Object generation at the last failure
    pub failed_generation: Option<i64>,
    /// When the scheduled retry is due; `None` waits for the object to change
    pub retry_at: Option<Instant>,
}

impl BackoffState {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
            failed_generation: None,
            retry_at: None,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }
}

/// Everything a reconcile of kind `K` needs, shared across reconciles
pub struct Reconciler<K: ManagedResource> {
    pub store: Arc<dyn ObjectStore<K>>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub adapter: Arc<dyn CloudResourceAdapter<Params = K::Params>>,
    pub credentials: Arc<dyn CredentialsProvider>,
    pub config: Arc<ControllerConfig>,
    /// Per-object backoff, keyed by `namespace/name`
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl<K: ManagedResource> fmt::Debug for Reconciler<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("kind", &K::KIND_TAG)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<K: ManagedResource> Reconciler<K> {
    pub fn new(
        store: Arc<dyn ObjectStore<K>>,
        artifacts: Arc<dyn ArtifactStore>,
        adapter: Arc<dyn CloudResourceAdapter<Params = K::Params>>,
        credentials: Arc<dyn CredentialsProvider>,
        config: Arc<ControllerConfig>,
    ) -> Self {
        Self {
            store,
            artifacts,
            adapter,
            credentials,
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Run `f` on the backoff state of `key`, creating it if needed
    ///
    /// Returns `None` if the state map is poisoned.
    pub fn with_backoff_state<R>(
        &self,
        key: &ObjectKey,
        f: impl FnOnce(&mut BackoffState) -> R,
    ) -> Option<R> {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states.entry(key.to_string()).or_insert_with(|| {
                    BackoffState::new(self.config.backoff_min_secs, self.config.backoff_max_secs)
                });
                Some(f(state))
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}", e);
                None
            }
        }
    }

    /// Copy of the backoff state of `key`, if it has failed since its last success
    pub fn backoff_snapshot(&self, key: &ObjectKey) -> Option<BackoffState> {
        match self.backoff_states.lock() {
            Ok(states) => states
                .get(&key.to_string())
                .filter(|state| state.error_count > 0)
                .cloned(),
            Err(e) => {
                warn!("Failed to lock backoff_states: {}", e);
                None
            }
        }
    }

    /// Forget the failure history of `key`
    pub fn clear_failures(&self, key: &ObjectKey) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                states.remove(&key.to_string());
            }
            Err(e) => warn!("Failed to lock backoff_states: {}", e),
        }
    }

    /// Drop failure history of every key `live` rejects
    ///
    /// Returns how many entries were dropped.
    pub fn retain_failures(&self, live: impl Fn(&str) -> bool) -> usize {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let before = states.len();
                states.retain(|key, _| live(key));
                before - states.len()
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}", e);
                0
            }
        }
    }
}
