//! # Object Phase
//!
//! Lifecycle phase of a managed object, derived from its fields. Nothing
//! stores the phase; it is recomputed on every reconcile and used for logs.

use crate::controller::reconciler::finalizer::has_finalizer;
use crate::crd::ManagedResource;
use kube::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectPhase {
    /// No finalizer and not being deleted
    New,
    /// Finalizer present, status not yet synced for the current generation
    Ensuring,
    /// Finalizer present, status synced for the current generation
    Synced,
    /// Deletion requested, finalizer still present
    Deleting,
    /// Deletion requested, finalizer already removed
    Gone,
}

impl ObjectPhase {
    pub fn of<K: ManagedResource>(object: &K) -> Self {
        let finalized = has_finalizer(object);
        if object.meta().deletion_timestamp.is_some() {
            return if finalized { Self::Deleting } else { Self::Gone };
        }
        if !finalized {
            return Self::New;
        }
        let synced = object.connector_status().is_some_and(|s| {
            s.is_observed() && s.observed_generation == object.meta().generation
        });
        if synced {
            Self::Synced
        } else {
            Self::Ensuring
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Ensuring => "Ensuring",
            Self::Synced => "Synced",
            Self::Deleting => "Deleting",
            Self::Gone => "Gone",
        }
    }
}
