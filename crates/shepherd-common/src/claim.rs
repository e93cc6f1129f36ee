//! The AccountClaim entity: one request for an account

use crate::account::LegalEntity;
use crate::conditions::Condition;
use crate::meta::{Key, ObjectMeta};
use crate::states::ClaimState;
use serde::{Deserialize, Serialize};

/// Reference to a named secret in a named namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    pub name: String,
    pub namespace: String,
}

/// Customer-supplied account details for BYOC claims.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ByocConfig {
    /// The customer's AWS account ID
    pub aws_account_id: String,
    /// Secret holding the customer credentials used to bootstrap the account
    pub secret_ref: SecretRef,
    /// Role in the customer account the operator is trusted to assume
    pub role_arn: String,
    /// External ID required by the customer role's trust policy
    pub external_id: String,
}

/// Desired state of a claim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimSpec {
    pub legal_entity: LegalEntity,
    /// Requested pool; empty means the default pool
    pub account_pool: String,
    /// Name of the bound account; immutable once set except on release
    pub account_link: String,
    pub byoc: Option<ByocConfig>,
}

/// Observed state of a claim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimStatus {
    pub state: ClaimState,
    pub conditions: Vec<Condition>,
}

/// One request binding a consumer to exactly one account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountClaim {
    pub meta: ObjectMeta,
    pub spec: ClaimSpec,
    pub status: ClaimStatus,
}

impl AccountClaim {
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
        self.spec.byoc.is_some()
    }

    pub fn has_account_link(&self) -> bool {
        !self.spec.account_link.is_empty()
    }

    /// Move to `next`, rejecting transitions the table does not allow.
    pub fn transition(&mut self, next: ClaimState) -> Result<(), String> {
        if !self.status.state.can_transition(next) {
            return Err(format!(
                "illegal claim state transition {} -> {} for {}",
                self.status.state, next, self.meta.name
            ));
        }
        self.status.state = next;
        Ok(())
    }

    /// BYOC claims must name the customer account they bring.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(byoc) = &self.spec.byoc {
            if byoc.aws_account_id.is_empty() {
                return Err("BYOC claim missing customer AWS account ID".to_string());
            }
        }
        Ok(())
    }
}
