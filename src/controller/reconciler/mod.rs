//! # Reconciler
//!
//! Kind-agnostic reconcile protocol shared by every connector.
//!
//! The reconciler keeps one remote cloud resource in step with one custom
//! resource:
//! - the remote resource is looked up by name before it is ever created
//! - a finalizer guards deletion until the remote resource is released
//! - the status mirrors the observed remote resource
//! - kinds that publish an artifact get it created next to the object
//!
//! Everything the reconciler touches goes through the store, artifact,
//! adapter and credentials traits, so it runs unchanged against fakes.

pub mod allocate;
pub mod artifact;
pub mod conflict;
pub mod finalizer;
pub mod phase;
pub mod reconcile;
pub mod status;
pub mod types;

// Re-export public API
pub use phase::ObjectPhase;
pub use reconcile::reconcile;
pub use types::{BackoffState, Operation, ReconcileOutcome, Reconciler, ReconcilerError};
