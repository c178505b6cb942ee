//! # Error Policy
//!
//! Retry scheduling for failed reconciliations.
//!
//! Every failure advances the object's Fibonacci backoff. Fatal failures
//! follow `FATAL_ERROR_POLICY`: either the same backoff as transient ones or
//! no retry until the object changes.

use crate::config::FatalErrorPolicy;
use crate::controller::reconciler::{BackoffState, Reconciler, ReconcilerError};
use crate::crd::ManagedResource;
use crate::observability::metrics;
use crate::runtime::object_key;
use kube::Resource;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// What to do after a failed reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    After(Duration),
    AwaitChange,
}

impl RetryDecision {
    pub fn into_action(self) -> Action {
        match self {
            Self::After(delay) => Action::requeue(delay),
            Self::AwaitChange => Action::await_change(),
        }
    }
}

/// Record a failure in `state` and decide when to retry
pub fn schedule_retry(
    state: &mut BackoffState,
    fatal: bool,
    policy: FatalErrorPolicy,
    generation: Option<i64>,
    now: Instant,
) -> RetryDecision {
    state.increment_error();
    state.failed_generation = generation;
    if fatal && policy == FatalErrorPolicy::AwaitChange {
        state.retry_at = None;
        return RetryDecision::AwaitChange;
    }
    let delay = state.backoff.next_backoff();
    state.retry_at = Some(now + delay);
    RetryDecision::After(delay)
}

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per object so failing objects do not slow down
/// healthy ones.
pub fn handle_reconciliation_error<K: ManagedResource>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler<K>>,
) -> Action {
    let key = object_key(obj.as_ref());
    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.reconciliation_error",
        resource.kind = K::KIND_TAG,
        resource.namespace = %key.namespace,
        resource.name = %key.name,
        error.class = error.class(),
        error.operation = %error.operation(),
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation failed: {}", error);
    metrics::increment_reconciliation_errors(K::KIND_TAG, error.class());

    let decision = ctx
        .with_backoff_state(&key, |state| {
            schedule_retry(
                state,
                error.is_fatal(),
                ctx.config.fatal_error_policy,
                obj.meta().generation,
                Instant::now(),
            )
        })
        .unwrap_or(RetryDecision::After(Duration::from_secs(
            ctx.config.backoff_max_secs,
        )));

    match decision {
        RetryDecision::After(delay) => {
            info!(
                "Retrying in {}s (trigger source: error-backoff)",
                delay.as_secs()
            );
            let reason = if error.is_fatal() {
                "fatal_error"
            } else {
                "transient_error"
            };
            metrics::increment_requeues(K::KIND_TAG, reason);
        }
        RetryDecision::AwaitChange => {
            warn!("Not retrying until the object changes");
        }
    }
    decision.into_action()
}
