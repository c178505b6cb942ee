//! # Watch Loop
//!
//! Runs one kube-runtime controller per connector kind and gates every
//! triggered reconcile through the skip filter.
//!
//! The skip filter drops events the controller caused itself: status writes
//! of an object that is already in sync, and events for an object that is
//! still waiting out its backoff. Skipped objects are requeued for whatever
//! time is left on their resync or backoff timer.

use crate::config::ControllerConfig;
use crate::controller::reconciler::{
    reconcile, BackoffState, ObjectPhase, ReconcileOutcome, Reconciler, ReconcilerError,
};
use crate::crd::ManagedResource;
use crate::observability::metrics;
use crate::runtime::error_policy::handle_reconciliation_error;
use crate::runtime::object_key;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use kube::api::Api;
use kube::{Client, Resource};
use kube_runtime::controller::{self, Action};
use kube_runtime::reflector::Store;
use kube_runtime::{watcher, Controller};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};

/// Whether a triggered reconcile should run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Reconcile,
    /// Skip; requeue after the given delay, or wait for a change when `None`
    Skip { requeue_after: Option<Duration> },
}

/// Decide whether a triggered reconcile of `object` should run
///
/// `backoff` is the object's failure state, present only while it has an
/// unresolved failure. A failure recorded in status but unknown in memory,
/// as after a restart, is retried right away.
pub fn admit<K: ManagedResource>(
    object: &K,
    backoff: Option<&BackoffState>,
    resync_interval: Duration,
    now: Instant,
    wall_clock: DateTime<Utc>,
) -> Admission {
    let phase = ObjectPhase::of(object);
    if matches!(phase, ObjectPhase::Deleting | ObjectPhase::Gone) {
        return Admission::Reconcile;
    }

    if let Some(state) = backoff {
        if state.failed_generation != object.meta().generation {
            return Admission::Reconcile;
        }
        return match state.retry_at {
            Some(retry_at) if retry_at > now => Admission::Skip {
                requeue_after: Some(retry_at - now),
            },
            Some(_) => Admission::Reconcile,
            None => Admission::Skip {
                requeue_after: None,
            },
        };
    }

    if phase != ObjectPhase::Synced {
        return Admission::Reconcile;
    }

    let failed = object
        .connector_status()
        .and_then(|s| s.ready_condition())
        .is_some_and(|c| c.status != "True");
    if failed {
        return Admission::Reconcile;
    }

    let last_sync = object
        .connector_status()
        .and_then(|s| s.last_sync_time.as_deref())
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc));
    let Some(last_sync) = last_sync else {
        return Admission::Reconcile;
    };
    let elapsed = (wall_clock - last_sync).to_std().unwrap_or_default();
    if elapsed < resync_interval {
        Admission::Skip {
            requeue_after: Some(resync_interval - elapsed),
        }
    } else {
        Admission::Reconcile
    }
}

/// Api scoped to the configured watch namespace
pub fn watched_api<K: ManagedResource>(client: Client, config: &ControllerConfig) -> Api<K> {
    match &config.watch_namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    }
}

/// Run the controller for kind `K` until a shutdown signal arrives
pub async fn run_controller<K: ManagedResource>(api: Api<K>, reconciler: Arc<Reconciler<K>>) {
    let concurrency = reconciler.config.max_concurrent_reconciliations;
    info!(
        kind = K::KIND_TAG,
        concurrency = concurrency,
        "Starting controller watch loop"
    );

    let controller = Controller::new(api, watcher::Config::default().any_semantic())
        .with_config(controller::Config::default().concurrency(concurrency));
    let pruner = tokio::spawn(prune_failures(controller.store(), reconciler.clone()));

    controller
        .shutdown_on_signal()
        .run(
            reconcile_triggered::<K>,
            |obj, error, ctx| handle_reconciliation_error(obj, error, ctx),
            reconciler,
        )
        .for_each(|result| {
            match result {
                Ok((obj, action)) => {
                    debug!(kind = K::KIND_TAG, object = %obj, action = ?action, "watch.event.reconciled");
                }
                Err(e) => {
                    warn!(kind = K::KIND_TAG, error = %e, "watch.event.failed");
                }
            }
            futures::future::ready(())
        })
        .await;

    pruner.abort();
    info!(kind = K::KIND_TAG, "Controller stopped");
}

/// Periodically forget failure history of objects that left the cache
///
/// Objects deleted before they carried a finalizer never reach a successful
/// reconcile, so nothing else clears their entry.
async fn prune_failures<K: ManagedResource>(store: Store<K>, reconciler: Arc<Reconciler<K>>) {
    if store.wait_until_ready().await.is_err() {
        return;
    }
    let period = reconciler.config.resync_interval().max(Duration::from_secs(1));
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        let live: HashSet<String> = store
            .state()
            .iter()
            .map(|obj| object_key(obj.as_ref()).to_string())
            .collect();
        let dropped = reconciler.retain_failures(|key| live.contains(key));
        if dropped > 0 {
            debug!(kind = K::KIND_TAG, dropped = dropped, "Pruned failure history");
        }
    }
}

async fn reconcile_triggered<K: ManagedResource>(
    obj: Arc<K>,
    ctx: Arc<Reconciler<K>>,
) -> Result<Action, ReconcilerError> {
    let key = object_key(obj.as_ref());
    let span = info_span!(
        "controller.watch.reconcile",
        resource.kind = K::KIND_TAG,
        resource.namespace = %key.namespace,
        resource.name = %key.name,
        resource.generation = obj.meta().generation.unwrap_or(0),
    );

    async move {
        let backoff = ctx.backoff_snapshot(&key);
        let admission = admit(
            obj.as_ref(),
            backoff.as_ref(),
            ctx.config.resync_interval(),
            Instant::now(),
            Utc::now(),
        );
        if let Admission::Skip { requeue_after } = admission {
            metrics::increment_reconciliations_skipped(K::KIND_TAG);
            debug!(requeue_after = ?requeue_after, "Skipping reconciliation");
            return Ok(requeue_after.map_or_else(Action::await_change, Action::requeue));
        }

        metrics::increment_reconciliations(K::KIND_TAG);
        let start = Instant::now();
        let result = reconcile(&ctx, &key).await;
        metrics::observe_reconciliation_duration(K::KIND_TAG, start.elapsed().as_secs_f64());

        let outcome = result?;
        ctx.clear_failures(&key);
        debug!(outcome = ?outcome, "Reconciliation finished");
        Ok(match outcome {
            ReconcileOutcome::Synced => {
                metrics::increment_requeues(K::KIND_TAG, "resync");
                Action::requeue(ctx.config.resync_interval())
            }
            ReconcileOutcome::Finalized | ReconcileOutcome::Released | ReconcileOutcome::Absent => {
                Action::await_change()
            }
        })
    }
    .instrument(span)
    .await
}
