//! # Reconciliation Logic
//!
//! One pass of the reconcile protocol for a single object key.
//!
//! ## Flow
//!
//! 1. Fetch the object; a missing object is done
//! 2. Deleting: release the remote resource and artifact, then drop the finalizer
//! 3. Otherwise: validate (including that a provisioned object still selects
//!    the same remote resource), add the finalizer, resolve credentials,
//!    find-or-create the remote resource, sync status, publish the artifact
//!
//! Fatal failures are also recorded on the object as `Ready=False`.

use crate::controller::reconciler::allocate::{allocate_resource, deallocate_resource};
use crate::controller::reconciler::artifact::{provide_artifact, remove_artifact};
use crate::controller::reconciler::finalizer::{ensure_finalizer, has_finalizer, remove_finalizer};
use crate::controller::reconciler::phase::ObjectPhase;
use crate::controller::reconciler::status::{record_fatal_condition, sync_status};
use crate::controller::reconciler::types::{
    Operation, ReconcileOutcome, Reconciler, ReconcilerError,
};
use crate::crd::ManagedResource;
use crate::provider::Credentials;
use crate::store::ObjectKey;
use anyhow::anyhow;
use kube::Resource;
use tracing::{debug, info, warn};

/// Reconcile the object at `key`
///
/// Errors are returned to the caller, which owns retry scheduling.
pub async fn reconcile<K: ManagedResource>(
    ctx: &Reconciler<K>,
    key: &ObjectKey,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let result = reconcile_object(ctx, key).await;
    if let Err(error) = &result {
        if error.is_fatal() {
            if let Err(record_error) = record_fatal_condition(ctx, key, error).await {
                warn!(
                    object = %key,
                    error = %record_error,
                    "Failed to record fatal condition"
                );
            }
        }
    }
    result
}

async fn reconcile_object<K: ManagedResource>(
    ctx: &Reconciler<K>,
    key: &ObjectKey,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let Some(object) = ctx
        .store
        .get(key)
        .await
        .map_err(|e| ReconcilerError::from_store(Operation::FetchObject, key, e))?
    else {
        debug!(object = %key, "Object no longer exists");
        return Ok(ReconcileOutcome::Absent);
    };

    let phase = ObjectPhase::of(&object);
    debug!(object = %key, phase = phase.as_str(), "Reconciling");

    if object.meta().deletion_timestamp.is_some() {
        return finalize(ctx, key, object).await;
    }

    object
        .validate()
        .and_then(|()| object.verify_binding())
        .map_err(|reason| ReconcilerError::fatal(Operation::ValidateSpec, key, anyhow!(reason)))?;

    let object = ensure_finalizer(ctx, key, object).await?;
    let credentials = resolve_credentials(ctx, key, &object).await?;
    let descriptor = allocate_resource(ctx, key, &object, &credentials).await?;
    let object = sync_status(ctx, key, object, &descriptor).await?;
    provide_artifact(ctx, key, &object).await?;

    if phase != ObjectPhase::Synced {
        info!(object = %key, remote.id = %descriptor.id, "Remote resource in sync");
    }
    Ok(ReconcileOutcome::Synced)
}

async fn finalize<K: ManagedResource>(
    ctx: &Reconciler<K>,
    key: &ObjectKey,
    object: K,
) -> Result<ReconcileOutcome, ReconcilerError> {
    if !has_finalizer(&object) {
        debug!(object = %key, "Deleting without finalizer, nothing to release");
        return Ok(ReconcileOutcome::Released);
    }

    // Release what the object was bound to, even if the spec was edited since
    let mut bound = object.clone();
    if let Some(identity) = object.bound_identity() {
        if identity != object.remote_identity() {
            warn!(
                object = %key,
                remote.identity = identity,
                "Spec no longer matches the provisioned resource, releasing the recorded one"
            );
            bound.rebind(identity);
        }
    }

    info!(object = %key, remote.name = bound.desired_name(), "Releasing remote resource");
    let credentials = resolve_credentials(ctx, key, &bound).await?;
    deallocate_resource(ctx, key, &bound, &credentials).await?;
    remove_artifact(ctx, key).await?;
    remove_finalizer(ctx, key, object).await?;
    Ok(ReconcileOutcome::Finalized)
}

async fn resolve_credentials<K: ManagedResource>(
    ctx: &Reconciler<K>,
    key: &ObjectKey,
    object: &K,
) -> Result<Credentials, ReconcilerError> {
    ctx.credentials
        .resolve(&key.namespace, &object.credentials_ref())
        .await
        .map_err(|e| ReconcilerError::from_provider(Operation::ResolveCredentials, key, e))
}
