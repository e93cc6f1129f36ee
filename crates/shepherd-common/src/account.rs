//! The Account entity: one AWS account under management

use crate::conditions::Condition;
use crate::meta::{Key, ObjectMeta};
use crate::states::AccountState;
use serde::{Deserialize, Serialize};

/// The legal entity an account is (or was last) claimed under. Accounts are
/// never reused across legal entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalEntity {
    pub name: String,
    pub id: String,
}

impl LegalEntity {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.id.is_empty()
    }
}

/// Desired state of an account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSpec {
    /// Provider account ID; empty until creation succeeds (or pre-set for
    /// pre-provisioned and BYOC accounts)
    pub aws_account_id: String,
    /// Customer-supplied account rather than one we created
    pub byoc: bool,
    /// No IAM user is provisioned; only role-assumption credentials are used
    pub manual_sts_mode: bool,
    pub legal_entity: LegalEntity,
    /// Name of the claim bound to this account; empty when unclaimed
    pub claim_link: String,
    pub claim_link_namespace: String,
    /// Pool this account belongs to; empty means the default pool
    pub account_pool: String,
}

/// Observed state of an account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountStatus {
    pub state: AccountState,
    pub claimed: bool,
    /// Previously claimed, released, and cleaned; eligible for reclaim
    pub reused: bool,
    /// Provider-side creation request being polled while Creating
    pub creation_request_id: String,
    /// Support case opened during verification of managed accounts
    pub support_case_id: String,
    pub conditions: Vec<Condition>,
}

/// One AWS account under management.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    pub meta: ObjectMeta,
    pub spec: AccountSpec,
    pub status: AccountStatus,
}

impl Account {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            meta: ObjectMeta::new(name, namespace),
            ..Default::default()
        }
    }

    pub fn key(&self) -> Key {
        self.meta.key()
    }

    pub fn is_byoc(&self) -> bool {
        self.spec.byoc
    }

    pub fn is_failed(&self) -> bool {
        self.status.state == AccountState::Failed
    }

    pub fn is_ready(&self) -> bool {
        self.status.state == AccountState::Ready
    }

    pub fn is_claimed(&self) -> bool {
        self.status.claimed
    }

    pub fn has_aws_account_id(&self) -> bool {
        !self.spec.aws_account_id.is_empty()
    }

    pub fn has_state(&self) -> bool {
        self.status.state != AccountState::Unset
    }

    pub fn has_claim_link(&self) -> bool {
        !self.spec.claim_link.is_empty()
    }

    /// Key of the claim bound to this account, if any.
    pub fn claim_key(&self) -> Option<Key> {
        if self.has_claim_link() {
            Some(Key::new(
                self.spec.claim_link.clone(),
                self.spec.claim_link_namespace.clone(),
            ))
        } else {
            None
        }
    }

    /// Ready, unclaimed, but carrying a claim link: the bind step wrote the
    /// link and the claimed flag still needs to be confirmed.
    pub fn is_ready_unclaimed_with_claim_link(&self) -> bool {
        self.is_ready() && !self.is_claimed() && self.has_claim_link()
    }

    /// Move to `next`, rejecting transitions the table does not allow.
    pub fn transition(&mut self, next: AccountState) -> Result<(), String> {
        if !self.status.state.can_transition(next) {
            return Err(format!(
                "illegal account state transition {} -> {} for {}",
                self.status.state, next, self.meta.name
            ));
        }
        self.status.state = next;
        Ok(())
    }

    /// Eligible for matching: ready, unclaimed, no pending deletion.
    pub fn is_available(&self) -> bool {
        self.is_ready() && !self.is_claimed() && !self.meta.is_pending_deletion()
    }

    /// Record a claim binding on the account side.
    pub fn bind_claim(&mut self, claim_name: &str, claim_namespace: &str) {
        self.spec.claim_link = claim_name.to_string();
        self.spec.claim_link_namespace = claim_namespace.to_string();
        self.status.claimed = true;
    }

    /// Clear the claim binding and mark the account reusable. State stays
    /// `Ready`; the account goes back to the pool, not through creation.
    pub fn reset_for_reuse(&mut self) {
        self.spec.claim_link.clear();
        self.spec.claim_link_namespace.clear();
        self.status.claimed = false;
        self.status.reused = true;
        self.status.state = AccountState::Ready;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_and_reset_are_symmetric() {
        let mut account = Account::new("osd-creds-mgmt-aaabbb", "shepherd");
        account.status.state = AccountState::Ready;

        account.bind_claim("my-claim", "tenant-ns");
        assert!(account.is_claimed());
        assert!(account.has_claim_link());
        assert_eq!(
            account.claim_key(),
            Some(Key::new("my-claim", "tenant-ns"))
        );
        assert!(!account.is_available());

        account.reset_for_reuse();
        assert!(!account.is_claimed());
        assert!(!account.has_claim_link());
        assert!(account.status.reused);
        assert_eq!(account.status.state, AccountState::Ready);
        assert!(account.is_available());
    }

    #[test]
    fn availability_requires_ready_and_unclaimed() {
        let mut account = Account::new("acct", "shepherd");
        assert!(!account.is_available());
        account.status.state = AccountState::Ready;
        assert!(account.is_available());
        account.status.claimed = true;
        assert!(!account.is_available());
    }

    #[test]
    fn legal_entity_empty() {
        assert!(LegalEntity::default().is_empty());
        assert!(!LegalEntity::new("LegalCorp. Inc.", "abcdefg123456").is_empty());
    }

    #[test]
    fn transition_enforces_the_table() {
        let mut account = Account::new("acct", "shepherd");
        account.transition(AccountState::Pending).unwrap();
        account.transition(AccountState::Creating).unwrap();
        account.transition(AccountState::PendingVerification).unwrap();

        let err = account.transition(AccountState::Pending).unwrap_err();
        assert!(err.contains("illegal account state transition"));
        assert_eq!(account.status.state, AccountState::PendingVerification);
    }
}
