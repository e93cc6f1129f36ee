//! Pool matching: pick the best available account for a pending claim
//!
//! Selection is a pure function over a listed snapshot so the ranking is
//! directly testable. The ordering has three tiers:
//!
//! 1. reused accounts already tagged with the claim's legal entity
//!    (reclaim continuity),
//! 2. any other reused account (prefer recycling over fresh capacity),
//! 3. never-claimed accounts, in listing order.
//!
//! A reused account tagged with a *different* legal entity is excluded
//! outright; accounts are never recycled across tenants.

use shepherd_common::{Account, AccountClaim, LegalEntity};
use uuid::Uuid;

/// True when the account may serve the claim at all.
pub fn eligible(account: &Account, claim: &AccountClaim) -> bool {
    if !account.is_available() || account.is_byoc() {
        return false;
    }
    // Pool names match literally; empty means the default pool on both
    // sides, so a named-pool claim never drains default capacity.
    if account.spec.account_pool != claim.spec.account_pool {
        return false;
    }
    // Cross-tenant reuse is forbidden once an account carries an entity.
    if account.status.reused
        && !account.spec.legal_entity.is_empty()
        && account.spec.legal_entity != claim.spec.legal_entity
    {
        return false;
    }
    true
}

fn rank(account: &Account, entity: &LegalEntity) -> u8 {
    if account.status.reused && account.spec.legal_entity == *entity {
        0
    } else if account.status.reused {
        1
    } else {
        2
    }
}

/// Select the best available account for the claim, if any.
///
/// Ties within a tier resolve to listing order; only the legal-entity and
/// reuse rules impose an ordering.
pub fn select_account<'a>(claim: &AccountClaim, accounts: &'a [Account]) -> Option<&'a Account> {
    let mut best: Option<(&Account, u8)> = None;
    for account in accounts.iter().filter(|a| eligible(a, claim)) {
        let tier = rank(account, &claim.spec.legal_entity);
        match best {
            Some((_, best_tier)) if best_tier <= tier => {}
            _ => best = Some((account, tier)),
        }
    }
    best.map(|(account, _)| account)
}

/// A placeholder account for pool replenishment; the account state machine
/// drives it through creation.
pub fn replenishment_account(namespace: &str, pool_name: &str) -> Account {
    let suffix = Uuid::new_v4().simple().to_string();
    let mut account = Account::new(format!("shepherd-pool-{}", &suffix[..12]), namespace);
    account.spec.account_pool = pool_name.to_string();
    account
}
