//! # Conflict Retry
//!
//! Object writes are optimistic. When a write loses against a concurrent
//! writer, the object is re-read and the same mutation is applied again to
//! the fresh copy, up to `CONFLICT_RETRY_LIMIT` times.

use crate::controller::reconciler::types::{Operation, Reconciler, ReconcilerError};
use crate::crd::ManagedResource;
use crate::observability::metrics;
use crate::store::{ObjectKey, StoreError};
use anyhow::anyhow;
use tracing::debug;

/// Which part of the object a write targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    /// Metadata and spec
    Object,
    Status,
}

/// Apply `mutate` to `object` and persist it, retrying on conflicts
///
/// `mutate` returns `false` when the object already has the desired shape, in
/// which case nothing is written. Returns `Ok(None)` when the object no longer
/// exists.
pub async fn write_with_conflict_retry<K, F>(
    ctx: &Reconciler<K>,
    key: &ObjectKey,
    mut object: K,
    operation: Operation,
    target: WriteTarget,
    mut mutate: F,
) -> Result<Option<K>, ReconcilerError>
where
    K: ManagedResource,
    F: FnMut(&mut K) -> bool + Send,
{
    let limit = ctx.config.conflict_retry_limit;
    let mut conflicts = 0u32;
    loop {
        if !mutate(&mut object) {
            return Ok(Some(object));
        }

        let written = match target {
            WriteTarget::Object => ctx.store.update(&object).await,
            WriteTarget::Status => ctx.store.update_status(&object).await,
        };

        match written {
            Ok(updated) => return Ok(Some(updated)),
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(StoreError::Conflict(_)) if conflicts < limit => {
                conflicts += 1;
                metrics::increment_write_conflicts(K::KIND_TAG);
                debug!(
                    object = %key,
                    operation = %operation,
                    attempt = conflicts,
                    "Write conflict, re-reading object"
                );
                match ctx
                    .store
                    .get(key)
                    .await
                    .map_err(|e| ReconcilerError::from_store(operation, key, e))?
                {
                    Some(fresh) => object = fresh,
                    None => return Ok(None),
                }
            }
            Err(StoreError::Conflict(_)) => {
                return Err(ReconcilerError::transient(
                    operation,
                    key,
                    anyhow!("write still conflicting after {limit} retries"),
                ));
            }
            Err(e) => return Err(ReconcilerError::from_store(operation, key, e)),
        }
    }
}
