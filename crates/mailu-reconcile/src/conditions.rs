//! Status conditions.
//!
//! A resource carries an ordered list of conditions with at most one entry
//! per condition type. Setting a condition replaces the entry of the same
//! type in place, or appends a new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Condition type reporting whether the remote entity matches the declared state.
pub const READY: &str = "Ready";

/// Reason set after a successful create.
pub const REASON_CREATED: &str = "Created";

/// Reason set after a successful update or a no-op comparison.
pub const REASON_UPDATED: &str = "Updated";

/// Reason set after a permanent failure.
pub const REASON_ERROR: &str = "Error";

/// Tri-state condition status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConditionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "True" => Ok(ConditionStatus::True),
            "False" => Ok(ConditionStatus::False),
            "Unknown" => Ok(ConditionStatus::Unknown),
            _ => Err(format!("Unknown condition status: {s}")),
        }
    }
}

/// A single named condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    /// When `status` last changed value.
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Whether the condition has the given status.
    #[must_use]
    pub fn is(&self, status: ConditionStatus) -> bool {
        self.status == status
    }
}

/// Ordered set of conditions, one per type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conditions(Vec<Condition>);

impl Conditions {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a condition by type.
    #[must_use]
    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.0.iter().find(|c| c.type_ == type_)
    }

    /// Whether the condition of `type_` exists and is `True`.
    #[must_use]
    pub fn is_true(&self, type_: &str) -> bool {
        self.get(type_).is_some_and(|c| c.is(ConditionStatus::True))
    }

    /// Upsert a condition by type. Returns whether anything changed.
    ///
    /// The transition time only moves when the status value changes, so
    /// repeating the same outcome leaves the set untouched.
    pub fn set(
        &mut self,
        type_: &str,
        status: ConditionStatus,
        reason: &str,
        message: impl Into<String>,
    ) -> bool {
        self.set_at(type_, status, reason, message, Utc::now())
    }

    /// Like [`Conditions::set`] with an explicit clock reading.
    pub fn set_at(
        &mut self,
        type_: &str,
        status: ConditionStatus,
        reason: &str,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let message = message.into();

        if let Some(existing) = self.0.iter_mut().find(|c| c.type_ == type_) {
            if existing.status == status && existing.reason == reason && existing.message == message {
                return false;
            }
            if existing.status != status {
                existing.last_transition_time = now;
            }
            existing.status = status;
            existing.reason = reason.to_string();
            existing.message = message;
            return true;
        }

        self.0.push(Condition {
            type_: type_.to_string(),
            status,
            reason: reason.to_string(),
            message,
            last_transition_time: now,
        });
        true
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
