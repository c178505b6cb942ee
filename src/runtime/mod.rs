//! # Runtime
//!
//! Wiring between kube-runtime controllers and the reconciler.
//!
//! - `initialization`: process-wide setup shared by every kind
//! - `watch_loop`: controller per kind, skip filter, outcome to requeue mapping
//! - `error_policy`: per-object Fibonacci backoff on failures

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use error_policy::{handle_reconciliation_error, schedule_retry, RetryDecision};
pub use initialization::{initialize, InitializationResult};
pub use watch_loop::{admit, run_controller, watched_api, Admission};

use crate::store::ObjectKey;
use kube::{Resource, ResourceExt};

/// Store key of a watched object
pub(crate) fn object_key<K: Resource>(obj: &K) -> ObjectKey {
    ObjectKey::new(obj.namespace().unwrap_or_default(), obj.name_any())
}
