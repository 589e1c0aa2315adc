//! # Conditions
//!
//! Typed status observations keyed by condition type.
//!
//! A [`ConditionedStatus`] keeps at most one [`Condition`] per type. Setting a
//! condition whose status did not change keeps the original transition time
//! but takes the new reason and message.

use chrono::SecondsFormat;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition type reporting whether the resource is usable
pub const TYPE_READY: &str = "Ready";

/// Condition type reporting the outcome of the last reconciliation pass
pub const TYPE_SYNCED: &str = "Synced";

pub const REASON_AVAILABLE: &str = "Available";
pub const REASON_UNAVAILABLE: &str = "Unavailable";
pub const REASON_CREATING: &str = "Creating";
pub const REASON_DELETING: &str = "Deleting";
pub const REASON_RECONCILE_SUCCESS: &str = "ReconcileSuccess";
pub const REASON_RECONCILE_ERROR: &str = "ReconcileError";
pub const REASON_RECONCILE_PAUSED: &str = "ReconcilePaused";
pub const REASON_IN_USE: &str = "InUse";
pub const REASON_UNRESOLVABLE: &str = "ReferenceUnresolvable";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Condition represents one typed observation of a resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,
    /// Last time the status changed (RFC3339)
    #[serde(default)]
    pub last_transition_time: String,
    /// Machine-readable reason for the status
    #[serde(default)]
    pub reason: String,
    /// Human-readable detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Condition {
    /// New condition stamped with the current time
    pub fn new(
        r#type: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            r#type: r#type.into(),
            status,
            last_transition_time: now(),
            reason: reason.into(),
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Equal in everything but transition time
    #[must_use]
    pub fn equal(&self, other: &Condition) -> bool {
        self.r#type == other.r#type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }

    /// The resource is available for use
    pub fn available() -> Self {
        Self::new(TYPE_READY, ConditionStatus::True, REASON_AVAILABLE)
    }

    /// The resource exists but is not usable
    pub fn unavailable() -> Self {
        Self::new(TYPE_READY, ConditionStatus::False, REASON_UNAVAILABLE)
    }

    pub fn creating() -> Self {
        Self::new(TYPE_READY, ConditionStatus::False, REASON_CREATING)
    }

    pub fn deleting() -> Self {
        Self::new(TYPE_READY, ConditionStatus::False, REASON_DELETING)
    }

    pub fn reconcile_success() -> Self {
        Self::new(TYPE_SYNCED, ConditionStatus::True, REASON_RECONCILE_SUCCESS)
    }

    pub fn reconcile_error(err: impl fmt::Display) -> Self {
        Self::new(TYPE_SYNCED, ConditionStatus::False, REASON_RECONCILE_ERROR)
            .with_message(err.to_string())
    }

    pub fn reconcile_paused() -> Self {
        Self::new(TYPE_SYNCED, ConditionStatus::False, REASON_RECONCILE_PAUSED)
            .with_message("reconciliation is paused")
    }
}

/// Ordered set of conditions, at most one per type
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConditionedStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl ConditionedStatus {
    /// Upsert each condition by type, in call order
    pub fn set_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        for new in conditions {
            match self.conditions.iter_mut().find(|c| c.r#type == new.r#type) {
                Some(existing) if existing.status == new.status => {
                    existing.reason = new.reason;
                    existing.message = new.message;
                }
                Some(existing) => *existing = new,
                None => self.conditions.push(new),
            }
        }
    }

    /// The condition of the given type, or an `Unknown` one if never set
    #[must_use]
    pub fn get_condition(&self, r#type: &str) -> Condition {
        self.conditions
            .iter()
            .find(|c| c.r#type == r#type)
            .cloned()
            .unwrap_or_else(|| Condition {
                r#type: r#type.to_string(),
                status: ConditionStatus::Unknown,
                last_transition_time: String::new(),
                reason: String::new(),
                message: None,
            })
    }
}
