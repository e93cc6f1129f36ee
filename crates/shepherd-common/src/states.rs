//! Entity state enums with explicit transition tables
//!
//! Every state an Account or AccountClaim can occupy is a variant here, and
//! every legal transition is listed in one place. Controllers go through
//! [`AccountState::can_transition`] / [`ClaimState::can_transition`] so an
//! illegal jump is rejected instead of silently written.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a managed AWS account.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum AccountState {
    /// No state recorded yet (freshly created object)
    #[default]
    #[strum(serialize = "")]
    Unset,
    /// Waiting to start provider-side creation
    Pending,
    /// Provider-side account creation in progress
    Creating,
    /// Waiting for the support case confirming the account is usable
    PendingVerification,
    /// Opt-in region enablement in progress
    OptingInRegions,
    /// All configured opt-in regions enabled
    OptInRegionsEnabled,
    /// Launch-and-terminate region activation in progress
    InitializingRegions,
    /// Account is usable and (if unclaimed) eligible for matching
    Ready,
    /// Terminal failure; skipped by all further reconciliation
    Failed,
}

impl AccountState {
    /// True for states no reconciliation will ever move the account out of.
    pub fn is_terminal(self) -> bool {
        matches!(self, AccountState::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// `Failed` is reachable from every non-terminal state. `Ready` accounts
    /// only move back through `Ready` itself (claim/release events mutate
    /// flags, not state).
    pub fn can_transition(self, next: AccountState) -> bool {
        use AccountState::*;
        if self == next {
            return true;
        }
        match (self, next) {
            (Failed, _) => false,
            (_, Failed) => true,
            (Unset, Pending) | (Unset, Creating) => true,
            (Pending, Creating) => true,
            (Creating, PendingVerification) => true,
            // BYOC/STS accounts skip verification entirely
            (Creating, InitializingRegions) | (Creating, Ready) => true,
            (PendingVerification, OptingInRegions) => true,
            (PendingVerification, InitializingRegions) => true,
            (OptingInRegions, OptInRegionsEnabled) => true,
            (OptInRegionsEnabled, InitializingRegions) => true,
            (InitializingRegions, Ready) => true,
            _ => false,
        }
    }
}

/// Lifecycle state of an account claim.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum ClaimState {
    /// No state recorded yet
    #[default]
    #[strum(serialize = "")]
    Unset,
    /// Claim accepted, not yet matched
    Pending,
    /// Waiting for an account to become available in the target pool
    PendingAccount,
    /// Bound to an account that is still being prepared
    InProgress,
    /// Bound to a ready account
    Ready,
    /// Terminal error (validation failure or exhausted pool)
    Error,
}

impl ClaimState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ClaimState::Error)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition(self, next: ClaimState) -> bool {
        use ClaimState::*;
        if self == next {
            return true;
        }
        match (self, next) {
            (Error, _) => false,
            (_, Error) => true,
            (Unset, Pending) => true,
            (Pending, PendingAccount) | (Pending, InProgress) | (Pending, Ready) => true,
            (PendingAccount, InProgress) | (PendingAccount, Ready) => true,
            (InProgress, Ready) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_happy_path_is_legal() {
        use AccountState::*;
        let path = [
            Unset,
            Pending,
            Creating,
            PendingVerification,
            OptingInRegions,
            OptInRegionsEnabled,
            InitializingRegions,
            Ready,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition(pair[1]),
                "expected {} -> {} to be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn account_failed_is_terminal() {
        use AccountState::*;
        for state in [Unset, Pending, Creating, PendingVerification, Ready] {
            assert!(state.can_transition(Failed));
        }
        for state in [Pending, Creating, Ready, Unset] {
            assert!(!Failed.can_transition(state));
        }
        assert!(AccountState::Failed.is_terminal());
        assert!(!AccountState::Ready.is_terminal());
    }

    #[test]
    fn account_rejects_backwards_jumps() {
        use AccountState::*;
        assert!(!Ready.can_transition(Pending));
        assert!(!InitializingRegions.can_transition(Creating));
        assert!(!PendingVerification.can_transition(Pending));
    }

    #[test]
    fn byoc_accounts_skip_verification() {
        use AccountState::*;
        assert!(Creating.can_transition(InitializingRegions));
        assert!(Creating.can_transition(Ready));
    }

    #[test]
    fn claim_happy_path_is_legal() {
        use ClaimState::*;
        assert!(Unset.can_transition(Pending));
        assert!(Pending.can_transition(PendingAccount));
        assert!(PendingAccount.can_transition(InProgress));
        assert!(InProgress.can_transition(Ready));
        // fast path: account already available
        assert!(Pending.can_transition(Ready));
    }

    #[test]
    fn claim_error_is_terminal() {
        use ClaimState::*;
        assert!(Pending.can_transition(Error));
        assert!(!Error.can_transition(Pending));
        assert!(!Ready.can_transition(Pending));
    }

    #[test]
    fn states_roundtrip_through_strings() {
        let s: AccountState = "PendingVerification".parse().unwrap();
        assert_eq!(s, AccountState::PendingVerification);
        assert_eq!(s.to_string(), "PendingVerification");

        let c: ClaimState = "PendingAccount".parse().unwrap();
        assert_eq!(c, ClaimState::PendingAccount);
        assert_eq!(AccountState::default(), AccountState::Unset);
    }
}
