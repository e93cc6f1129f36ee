//! Typed condition history for entity status
//!
//! Conditions record why an entity is in its current state, with stable
//! reason codes an operator can alert on. One condition per reason is kept;
//! re-asserting a reason refreshes its probe time and only bumps the
//! transition time when the message changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable reason codes surfaced on entity conditions.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum ConditionReason {
    AccountCreating,
    AccountCreated,
    AccountReady,
    AccountFailed,
    CreationTimeout,
    AccountLimitExceeded,
    QuotaExceeded,
    InternalFailure,
    PendingVerification,
    VerificationComplete,
    OptInRegionsInProgress,
    OptInRegionsEnabled,
    InitializingRegions,
    ClientError,
    ClaimPending,
    ClaimBound,
    ClaimReady,
    ClaimError,
    TeardownFailed,
    AccountReset,
    AccountUnclaimed,
}

/// One entry in an entity's condition history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub reason: ConditionReason,
    pub message: String,
    /// When this reason was last asserted with a new message
    pub last_transition_time: DateTime<Utc>,
    /// When this reason was last asserted at all
    pub last_probe_time: DateTime<Utc>,
}

impl Condition {
    pub fn new(reason: ConditionReason, message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            reason,
            message: message.into(),
            last_transition_time: now,
            last_probe_time: now,
        }
    }

    /// Age of the condition since its last transition.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.last_transition_time
    }
}

/// Assert `reason` on a condition list, updating in place if present.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    reason: ConditionReason,
    message: impl Into<String>,
) {
    let message = message.into();
    let now = Utc::now();
    if let Some(existing) = conditions.iter_mut().find(|c| c.reason == reason) {
        existing.last_probe_time = now;
        if existing.message != message {
            existing.message = message;
            existing.last_transition_time = now;
        }
    } else {
        conditions.push(Condition::new(reason, message));
    }
}

/// Find a condition by reason.
pub fn find_condition(conditions: &[Condition], reason: ConditionReason) -> Option<&Condition> {
    conditions.iter().find(|c| c.reason == reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_appends_then_updates() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, ConditionReason::AccountCreating, "creating");
        assert_eq!(conditions.len(), 1);

        let first_transition = conditions[0].last_transition_time;

        // Same reason, same message: probe time moves, transition time stays
        set_condition(&mut conditions, ConditionReason::AccountCreating, "creating");
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].last_transition_time, first_transition);

        // Same reason, new message: transition time moves
        set_condition(&mut conditions, ConditionReason::AccountCreating, "retrying");
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].message, "retrying");
        assert!(conditions[0].last_transition_time >= first_transition);
    }

    #[test]
    fn distinct_reasons_are_distinct_entries() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, ConditionReason::AccountCreating, "a");
        set_condition(&mut conditions, ConditionReason::AccountReady, "b");
        assert_eq!(conditions.len(), 2);
        assert!(find_condition(&conditions, ConditionReason::AccountReady).is_some());
        assert!(find_condition(&conditions, ConditionReason::AccountFailed).is_none());
    }
}
