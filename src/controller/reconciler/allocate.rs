//! # Allocation
//!
//! Creates the remote resource only after confirming it is absent, so a
//! repeated reconcile never allocates twice. Deletion treats "already gone"
//! as success.

use crate::controller::reconciler::types::{Operation, Reconciler, ReconcilerError};
use crate::crd::ManagedResource;
use crate::observability::metrics;
use crate::provider::{Credentials, ProviderError, RemoteResourceDescriptor};
use crate::store::ObjectKey;
use anyhow::anyhow;
use tracing::{debug, info};

/// Find the remote resource by name, creating it when absent
pub async fn allocate_resource<K: ManagedResource>(
    ctx: &Reconciler<K>,
    key: &ObjectKey,
    object: &K,
    credentials: &Credentials,
) -> Result<RemoteResourceDescriptor, ReconcilerError> {
    let name = object.desired_name();
    let params = object.params();
    let lookup = |e| ReconcilerError::from_provider(Operation::AllocateResource, key, e);

    if let Some(existing) = ctx.adapter.get(credentials, name, params).await.map_err(lookup)? {
        debug!(object = %key, remote.name = name, remote.id = %existing.id, "Remote resource already exists");
        return Ok(existing);
    }

    info!(object = %key, remote.name = name, "Creating remote resource");
    ctx.adapter
        .create(credentials, name, params)
        .await
        .map_err(lookup)?;
    metrics::increment_remote_resources_created(K::KIND_TAG);

    ctx.adapter
        .get(credentials, name, params)
        .await
        .map_err(lookup)?
        .ok_or_else(|| {
            ReconcilerError::transient(
                Operation::AllocateResource,
                key,
                anyhow!("remote resource {name} was created but is not visible yet"),
            )
        })
}

/// Delete the remote resource by name
pub async fn deallocate_resource<K: ManagedResource>(
    ctx: &Reconciler<K>,
    key: &ObjectKey,
    object: &K,
    credentials: &Credentials,
) -> Result<(), ReconcilerError> {
    let name = object.desired_name();
    match ctx.adapter.delete(credentials, name, object.params()).await {
        Ok(()) => {
            metrics::increment_remote_resources_deleted(K::KIND_TAG);
            info!(object = %key, remote.name = name, "Deleted remote resource");
            Ok(())
        }
        Err(ProviderError::NotFound(_)) => {
            debug!(object = %key, remote.name = name, "Remote resource already absent");
            Ok(())
        }
        Err(e) => Err(ReconcilerError::from_provider(
            Operation::DeallocateResource,
            key,
            e,
        )),
    }
}
