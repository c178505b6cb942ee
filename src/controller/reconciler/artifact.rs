//! Derived artifact lifecycle.
//!
//! Kinds that publish an artifact get it created once the status carries
//! the data it is built from. An existing artifact is never overwritten.

use crate::controller::reconciler::types::{Operation, Reconciler, ReconcilerError};
use crate::crd::ManagedResource;
use crate::store::{ArtifactOwner, ObjectKey};
use tracing::{debug, info};

pub fn artifact_owner<K: ManagedResource>(key: &ObjectKey) -> ArtifactOwner {
    ArtifactOwner {
        name: key.name.clone(),
        namespace: key.namespace.clone(),
        kind: K::KIND_TAG,
    }
}

pub async fn provide_artifact<K: ManagedResource>(
    ctx: &Reconciler<K>,
    key: &ObjectKey,
    object: &K,
) -> Result<(), ReconcilerError> {
    if !K::materializes_artifact() {
        return Ok(());
    }
    let Some(data) = object.artifact_data() else {
        debug!(object = %key, "Artifact data not available yet");
        return Ok(());
    };

    let owner = artifact_owner::<K>(key);
    let store_err = |e| ReconcilerError::from_store(Operation::ProvideArtifact, key, e);
    if ctx.artifacts.exists(&owner).await.map_err(store_err)? {
        return Ok(());
    }
    ctx.artifacts.put(&owner, data).await.map_err(store_err)?;
    info!(object = %key, artifact = %owner.artifact_name(), "Published artifact");
    Ok(())
}

pub async fn remove_artifact<K: ManagedResource>(
    ctx: &Reconciler<K>,
    key: &ObjectKey,
) -> Result<(), ReconcilerError> {
    if !K::materializes_artifact() {
        return Ok(());
    }
    let owner = artifact_owner::<K>(key);
    ctx.artifacts
        .remove(&owner)
        .await
        .map_err(|e| ReconcilerError::from_store(Operation::RemoveArtifact, key, e))?;
    debug!(object = %key, artifact = %owner.artifact_name(), "Artifact removed");
    Ok(())
}
