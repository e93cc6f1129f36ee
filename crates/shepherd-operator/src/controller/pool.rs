//! The pool observer
//!
//! Maintains the aggregate counts operators watch (claimed / unclaimed /
//! available / progressing / limit delta) and asks the matcher for
//! replenishment accounts when the pool is short of its declared size.
//! Read-only with respect to accounts and claims.

use crate::config::OperatorConfig;
use crate::controller::{matcher, ReconcileOutcome, ReconcileResult};
use crate::limits::BudgetWatcher;
use crate::store::{ControlPlane, StoreError};
use shepherd_common::{Account, AccountPool, AccountState, Key};
use std::sync::Arc;
use tracing::{debug, info};

/// How often pool aggregates refresh when nothing else changes
const POOL_REFRESH_SECS: u64 = 300;

/// Reconciles AccountPool entities.
pub struct PoolReconciler<C> {
    store: C,
    config: Arc<OperatorConfig>,
    budget: BudgetWatcher,
}

impl<C: ControlPlane> PoolReconciler<C> {
    pub fn new(store: C, config: Arc<OperatorConfig>, budget: BudgetWatcher) -> Self {
        Self {
            store,
            config,
            budget,
        }
    }

    /// Accounts belonging to this pool. Accounts with an empty pool name
    /// belong to the pool marked default in configuration.
    fn is_member(&self, pool_name: &str, account: &Account) -> bool {
        if account.spec.account_pool == pool_name {
            return true;
        }
        account.spec.account_pool.is_empty()
            && self.config.default_pool_name() == Some(pool_name)
    }

    pub async fn reconcile(&self, key: &Key) -> ReconcileResult {
        let mut pool = match self.store.get_pool(key).await {
            Ok(pool) => pool,
            Err(StoreError::NotFound { .. }) => return Ok(ReconcileOutcome::Done),
            Err(err) => return Err(err.into()),
        };

        let accounts = self.store.list_accounts(&self.config.namespace).await?;
        let members: Vec<&Account> = accounts
            .iter()
            .filter(|a| self.is_member(&pool.meta.name, a))
            .collect();

        refresh_status(&mut pool, &members, self.budget.snapshot().delta());

        let shortfall = pool.shortfall();
        if shortfall > 0 {
            info!(
                pool = %pool.meta.name,
                shortfall,
                "replenishing pool toward declared size"
            );
            let member_pool_name = if self.config.default_pool_name() == Some(pool.meta.name.as_str())
            {
                ""
            } else {
                pool.meta.name.as_str()
            };
            for _ in 0..shortfall {
                let account =
                    matcher::replenishment_account(&self.config.namespace, member_pool_name);
                self.store.create_account(&account).await?;
            }
        } else {
            debug!(pool = %pool.meta.name, "pool at declared size");
        }

        self.store.update_pool_status(&pool).await?;
        Ok(ReconcileOutcome::requeue_secs(POOL_REFRESH_SECS))
    }
}

/// Recompute the status aggregates from a membership snapshot.
fn refresh_status(pool: &mut AccountPool, members: &[&Account], limit_delta: i64) {
    let claimed = members.iter().filter(|a| a.is_claimed()).count() as u32;
    let unclaimed = members.len() as u32 - claimed;
    let available = members.iter().filter(|a| a.is_available()).count() as u32;
    let progressing = members
        .iter()
        .filter(|a| {
            !matches!(
                a.status.state,
                AccountState::Ready | AccountState::Failed
            )
        })
        .count() as u32;

    pool.status.claimed_accounts = claimed;
    pool.status.unclaimed_accounts = unclaimed;
    pool.status.available_accounts = available;
    pool.status.accounts_progressing = progressing;
    pool.status.aws_limit_delta = limit_delta;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::HashMap;

    fn config_with_default_pool(name: &str) -> OperatorConfig {
        let mut config = OperatorConfig::default();
        let mut pools = HashMap::new();
        pools.insert(
            name.to_string(),
            crate::config::PoolPolicy {
                default: true,
                create_on_empty: true,
            },
        );
        config.pools = pools;
        config
    }

    fn account_in_state(name: &str, state: AccountState, claimed: bool) -> Account {
        let mut account = Account::new(name, "shepherd");
        account.status.state = state;
        account.status.claimed = claimed;
        account
    }

    #[tokio::test]
    async fn aggregates_count_membership() {
        let store = MemoryStore::new();
        let config = Arc::new(config_with_default_pool("main"));
        let reconciler = PoolReconciler::new(store.clone(), config, BudgetWatcher::new(10));

        store
            .create_account(&account_in_state("ready-free", AccountState::Ready, false))
            .await
            .unwrap();
        store
            .create_account(&account_in_state("ready-claimed", AccountState::Ready, true))
            .await
            .unwrap();
        store
            .create_account(&account_in_state("creating", AccountState::Creating, false))
            .await
            .unwrap();

        let pool = store
            .create_pool(&AccountPool::new("main", "shepherd", 3))
            .await
            .unwrap();

        reconciler.reconcile(&pool.key()).await.unwrap();

        let updated = store.get_pool(&pool.key()).await.unwrap();
        assert_eq!(updated.status.claimed_accounts, 1);
        assert_eq!(updated.status.unclaimed_accounts, 2);
        assert_eq!(updated.status.available_accounts, 1);
        assert_eq!(updated.status.accounts_progressing, 1);
    }

    #[tokio::test]
    async fn short_pools_are_replenished() {
        let store = MemoryStore::new();
        let config = Arc::new(config_with_default_pool("main"));
        let reconciler = PoolReconciler::new(store.clone(), config, BudgetWatcher::new(10));

        let pool = store
            .create_pool(&AccountPool::new("main", "shepherd", 2))
            .await
            .unwrap();

        reconciler.reconcile(&pool.key()).await.unwrap();

        let accounts = store.list_accounts("shepherd").await.unwrap();
        assert_eq!(accounts.len(), 2);
        // default-pool members carry an empty pool name
        assert!(accounts.iter().all(|a| a.spec.account_pool.is_empty()));
    }

    #[tokio::test]
    async fn full_pools_are_left_alone() {
        let store = MemoryStore::new();
        let config = Arc::new(config_with_default_pool("main"));
        let reconciler = PoolReconciler::new(store.clone(), config, BudgetWatcher::new(10));

        store
            .create_account(&account_in_state("a", AccountState::Ready, false))
            .await
            .unwrap();
        store
            .create_account(&account_in_state("b", AccountState::Creating, false))
            .await
            .unwrap();

        let pool = store
            .create_pool(&AccountPool::new("main", "shepherd", 2))
            .await
            .unwrap();
        reconciler.reconcile(&pool.key()).await.unwrap();

        assert_eq!(store.list_accounts("shepherd").await.unwrap().len(), 2);
    }
}
