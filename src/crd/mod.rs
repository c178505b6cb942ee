//! # Custom Resource Definitions
//!
//! CRD types for the cloud connector controllers.
//!
//! ## Module Structure
//!
//! - `registry.rs` - `YandexContainerRegistry`
//! - `queue.rs` - `YandexMessageQueue`
//! - `storage.rs` - `YandexObjectStorage`
//! - `status.rs` - Status types shared by all kinds
//! - `validation.rs` - Name rules checked before anything is created remotely
//!
//! Every kind implements [`ManagedResource`], which is all the generic
//! reconciler needs to know about it.

mod queue;
mod registry;
mod status;
mod storage;
mod validation;

pub use queue::{QueueStatus, YandexMessageQueue, YandexMessageQueueSpec};
pub use registry::{YandexContainerRegistry, YandexContainerRegistrySpec};
pub use status::{
    Condition, ConnectorStatus, CONDITION_READY, REASON_FATAL_ERROR, REASON_SYNCED,
};
pub use storage::{YandexObjectStorage, YandexObjectStorageSpec};

use crate::provider::{CredentialsRef, RemoteResourceDescriptor};
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// A namespaced custom resource whose lifecycle drives one remote cloud resource
pub trait ManagedResource:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Desired attributes handed to the cloud adapter
    type Params: Clone + Debug + Send + Sync + 'static;

    /// Short kind tag used in artifact names, metrics and logs
    const KIND_TAG: &'static str;

    /// Finalizer marker guarding remote deletion
    const FINALIZER: &'static str;

    fn params(&self) -> &Self::Params;

    /// Name of the remote resource
    fn desired_name(&self) -> &str;

    /// Spec fields that pick out the remote resource, in one string
    fn remote_identity(&self) -> String {
        self.desired_name().to_string()
    }

    /// Point the spec back at the remote resource recorded as `identity`
    fn rebind(&mut self, identity: &str);

    /// Identity recorded in status once the remote resource was observed
    fn bound_identity(&self) -> Option<&str> {
        self.connector_status()
            .filter(|s| s.is_observed() && !s.remote_identity.is_empty())
            .map(|s| s.remote_identity.as_str())
    }

    /// Reject specs that would move an already provisioned object to another
    /// remote resource
    fn verify_binding(&self) -> Result<(), String> {
        match self.bound_identity() {
            Some(bound) if bound != self.remote_identity() => Err(format!(
                "object is bound to remote resource '{bound}', which cannot change once provisioned (spec now selects '{}')",
                self.remote_identity()
            )),
            _ => Ok(()),
        }
    }

    /// Where the credentials for the cloud adapter come from
    fn credentials_ref(&self) -> CredentialsRef;

    /// Check the spec against the provider's naming and parameter rules
    fn validate(&self) -> Result<(), String>;

    fn connector_status(&self) -> Option<&ConnectorStatus>;

    fn connector_status_mut(&mut self) -> &mut ConnectorStatus;

    /// Copy kind-specific fields of the descriptor into the status
    fn project_kind_status(&mut self, _descriptor: &RemoteResourceDescriptor) {}

    /// Whether this kind publishes a derived artifact
    fn materializes_artifact() -> bool {
        false
    }

    /// Content of the derived artifact, built from synced status fields
    fn artifact_data(&self) -> Option<BTreeMap<String, String>> {
        None
    }
}
