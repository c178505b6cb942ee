//! # Connector Status
//!
//! Status types shared by every connector kind.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Condition type reported by every connector
pub const CONDITION_READY: &str = "Ready";

/// Reason recorded after a successful status sync
pub const REASON_SYNCED: &str = "Synced";

/// Reason recorded when a reconcile failed with a fatal error
pub const REASON_FATAL_ERROR: &str = "FatalError";

/// Observed state of a remote cloud resource
///
/// Written only by the controller.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorStatus {
    /// Identifier assigned by the cloud provider
    /// Empty until the remote resource has been observed at least once
    #[serde(default)]
    pub remote_id: String,
    /// Spec identity (name, plus folder for registries) the object is bound to
    #[serde(default)]
    pub remote_identity: String,
    /// Creation time reported by the cloud provider (RFC3339, empty if unknown)
    #[serde(default)]
    pub created_at: String,
    /// Labels reported by the cloud provider
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Generation of the spec the status was last synced for
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Last successful sync with the cloud provider (RFC3339)
    #[serde(default)]
    pub last_sync_time: Option<String>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Condition for status reporting
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
    /// Generation the condition was recorded for
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// `Ready=True` after a successful sync
    pub fn ready(generation: Option<i64>) -> Self {
        Self {
            r#type: CONDITION_READY.to_string(),
            status: "True".to_string(),
            last_transition_time: Some(Utc::now().to_rfc3339()),
            reason: Some(REASON_SYNCED.to_string()),
            message: Some("Remote resource is in sync".to_string()),
            observed_generation: generation,
        }
    }

    /// `Ready=False` with reason `FatalError`
    pub fn fatal(message: impl Into<String>, generation: Option<i64>) -> Self {
        Self {
            r#type: CONDITION_READY.to_string(),
            status: "False".to_string(),
            last_transition_time: Some(Utc::now().to_rfc3339()),
            reason: Some(REASON_FATAL_ERROR.to_string()),
            message: Some(message.into()),
            observed_generation: generation,
        }
    }

    /// Same observation, ignoring when it was made
    pub fn same_observation(&self, other: &Self) -> bool {
        self.r#type == other.r#type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
            && self.observed_generation == other.observed_generation
    }
}

impl ConnectorStatus {
    /// Whether the remote resource has been observed at least once
    pub fn is_observed(&self) -> bool {
        !self.remote_id.is_empty()
    }

    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }

    pub fn ready_condition(&self) -> Option<&Condition> {
        self.condition(CONDITION_READY)
    }

    /// Insert or replace a condition of the same type
    ///
    /// The previous transition time is kept when the condition status did not flip.
    pub fn set_condition(&mut self, mut condition: Condition) {
        match self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition.r#type)
        {
            Some(existing) => {
                if existing.status == condition.status {
                    condition
                        .last_transition_time
                        .clone_from(&existing.last_transition_time);
                }
                *existing = condition;
            }
            None => self.conditions.push(condition),
        }
    }
}
