//! # Status Sync
//!
//! Mirrors the observed remote resource into the object's status and
//! records fatal failures as a `Ready=False` condition.

use crate::controller::reconciler::conflict::{write_with_conflict_retry, WriteTarget};
use crate::controller::reconciler::types::{Operation, Reconciler, ReconcilerError};
use crate::crd::{Condition, ManagedResource};
use crate::provider::RemoteResourceDescriptor;
use crate::store::ObjectKey;
use anyhow::anyhow;
use chrono::Utc;
use kube::Resource;
use tracing::{debug, info};

/// Copy the descriptor into the status of `object`
///
/// Labels are replaced wholesale, so labels removed remotely disappear.
pub fn project_status<K: ManagedResource>(object: &mut K, descriptor: &RemoteResourceDescriptor) {
    let generation = object.meta().generation;
    let identity = object.remote_identity();
    let status = object.connector_status_mut();
    status.remote_id.clone_from(&descriptor.id);
    status.remote_identity = identity;
    status.created_at = descriptor
        .created_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    status.labels.clone_from(&descriptor.labels);
    status.observed_generation = generation;
    status.last_sync_time = Some(Utc::now().to_rfc3339());
    status.set_condition(Condition::ready(generation));
    object.project_kind_status(descriptor);
}

/// Persist the observed state of the remote resource
pub async fn sync_status<K: ManagedResource>(
    ctx: &Reconciler<K>,
    key: &ObjectKey,
    object: K,
    descriptor: &RemoteResourceDescriptor,
) -> Result<K, ReconcilerError> {
    if descriptor.id.is_empty() {
        return Err(ReconcilerError::transient(
            Operation::SyncStatus,
            key,
            anyhow!("remote resource {} reported an empty identifier", descriptor.name),
        ));
    }

    let written = write_with_conflict_retry(
        ctx,
        key,
        object,
        Operation::SyncStatus,
        WriteTarget::Status,
        |o: &mut K| {
            project_status(o, descriptor);
            true
        },
    )
    .await?;

    let synced = written.ok_or_else(|| {
        ReconcilerError::transient(
            Operation::SyncStatus,
            key,
            anyhow!("object disappeared while syncing status"),
        )
    })?;
    debug!(object = %key, remote.id = %descriptor.id, "Status synced");
    Ok(synced)
}

/// Record a fatal failure as `Ready=False` on the current object
///
/// Nothing is written when the same failure is already recorded for the
/// current generation.
pub async fn record_fatal_condition<K: ManagedResource>(
    ctx: &Reconciler<K>,
    key: &ObjectKey,
    error: &ReconcilerError,
) -> Result<(), ReconcilerError> {
    let Some(object) = ctx
        .store
        .get(key)
        .await
        .map_err(|e| ReconcilerError::from_store(Operation::RecordCondition, key, e))?
    else {
        return Ok(());
    };

    let message = error.to_string();
    write_with_conflict_retry(
        ctx,
        key,
        object,
        Operation::RecordCondition,
        WriteTarget::Status,
        |o: &mut K| {
            let condition = Condition::fatal(message.clone(), o.meta().generation);
            let unchanged = o
                .connector_status()
                .and_then(|s| s.ready_condition())
                .is_some_and(|c| c.same_observation(&condition));
            if unchanged {
                return false;
            }
            o.connector_status_mut().set_condition(condition);
            true
        },
    )
    .await?;
    info!(object = %key, "Recorded fatal condition");
    Ok(())
}
