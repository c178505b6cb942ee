//! Finalizer bookkeeping.

use crate::controller::reconciler::conflict::{write_with_conflict_retry, WriteTarget};
use crate::controller::reconciler::types::{Operation, Reconciler, ReconcilerError};
use crate::crd::ManagedResource;
use crate::store::ObjectKey;
use anyhow::anyhow;
use kube::ResourceExt;
use tracing::info;

pub fn has_finalizer<K: ManagedResource>(object: &K) -> bool {
    object.finalizers().iter().any(|f| f == K::FINALIZER)
}

/// Add the kind's finalizer if it is missing
pub async fn ensure_finalizer<K: ManagedResource>(
    ctx: &Reconciler<K>,
    key: &ObjectKey,
    object: K,
) -> Result<K, ReconcilerError> {
    let written = write_with_conflict_retry(
        ctx,
        key,
        object,
        Operation::EnsureFinalizer,
        WriteTarget::Object,
        |o: &mut K| {
            if has_finalizer(o) {
                return false;
            }
            o.finalizers_mut().push(K::FINALIZER.to_string());
            info!(object = %key, finalizer = K::FINALIZER, "Adding finalizer");
            true
        },
    )
    .await?;
    written.ok_or_else(|| {
        ReconcilerError::transient(
            Operation::EnsureFinalizer,
            key,
            anyhow!("object disappeared while adding the finalizer"),
        )
    })
}

/// Remove the kind's finalizer; absence of the object or the marker is success
pub async fn remove_finalizer<K: ManagedResource>(
    ctx: &Reconciler<K>,
    key: &ObjectKey,
    object: K,
) -> Result<(), ReconcilerError> {
    write_with_conflict_retry(
        ctx,
        key,
        object,
        Operation::RemoveFinalizer,
        WriteTarget::Object,
        |o: &mut K| {
            let before = o.finalizers().len();
            o.finalizers_mut().retain(|f| f != K::FINALIZER);
            o.finalizers().len() != before
        },
    )
    .await?;
    info!(object = %key, finalizer = K::FINALIZER, "Finalizer removed");
    Ok(())
}
