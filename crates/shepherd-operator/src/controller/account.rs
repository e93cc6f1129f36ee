//! The account state machine
//!
//! Drives a single account from nonexistent to ready-for-use and back to
//! reclaimed. Reads current state, acts through the AWS boundary, writes
//! the new state back; never touches another entity except through the
//! store.

use crate::aws::api::ClientBuilder;
use crate::aws::sts::{handle_role_assumption, RoleAssumptionRequest};
use crate::aws::teardown::TeardownEngine;
use crate::config::OperatorConfig;
use crate::controller::provision::{
    set_account_failed, ByocFlow, FlowDeps, ManagedFlow, ProvisionFlow,
};
use crate::controller::{optin, regioninit, verification};
use crate::controller::{ControllerError, ReconcileOutcome, ReconcileResult};
use crate::limits::BudgetWatcher;
use crate::retry::Sleep;
use crate::secrets::SecretStore;
use crate::store::{ControlPlane, StoreError};
use shepherd_common::conditions::{set_condition, ConditionReason};
use shepherd_common::defaults::{ACCOUNT_FINALIZER, ORG_ACCESS_ROLE, REGION_INIT_REQUEUE_SECS};
use shepherd_common::{Account, AccountState, Key};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reconciles Account entities.
pub struct AccountReconciler<C, B, S, Se> {
    store: C,
    builder: B,
    sleeper: S,
    secrets: Se,
    config: Arc<OperatorConfig>,
    budget: BudgetWatcher,
}

impl<C, B, S, Se> AccountReconciler<C, B, S, Se>
where
    C: ControlPlane,
    B: ClientBuilder,
    S: Sleep,
    Se: SecretStore,
{
    pub fn new(
        store: C,
        builder: B,
        sleeper: S,
        secrets: Se,
        config: Arc<OperatorConfig>,
        budget: BudgetWatcher,
    ) -> Self {
        Self {
            store,
            builder,
            sleeper,
            secrets,
            config,
            budget,
        }
    }

    fn deps(&self) -> FlowDeps<'_, C, B, S, Se> {
        FlowDeps {
            store: &self.store,
            builder: &self.builder,
            sleeper: &self.sleeper,
            secrets: &self.secrets,
            config: &self.config,
            budget: &self.budget,
        }
    }

    pub async fn reconcile(&self, cancel: &CancellationToken, key: &Key) -> ReconcileResult {
        let mut account = match self.store.get_account(key).await {
            Ok(account) => account,
            Err(StoreError::NotFound { .. }) => return Ok(ReconcileOutcome::Done),
            Err(err) => return Err(err.into()),
        };

        // STS-mode accounts never get a finalizer; there is nothing of ours
        // to tear down inside them
        if !account.spec.manual_sts_mode && account.meta.add_finalizer(ACCOUNT_FINALIZER) {
            account = self.store.update_account(&account).await?;
        }

        if account.meta.is_pending_deletion() {
            return self.handle_deletion(cancel, account).await;
        }

        if account.is_failed() {
            info!(account = %account.meta.name, "account is failed, ignoring");
            return Ok(ReconcileOutcome::Done);
        }

        let outcome = match account.status.state {
            AccountState::Unset | AccountState::Pending => {
                let operator = self.operator_api().await?;
                let deps = self.deps();
                if account.is_byoc() {
                    ByocFlow.begin(&deps, &operator, &mut account).await?
                } else {
                    ManagedFlow.begin(&deps, &operator, &mut account).await?
                }
            }

            AccountState::Creating => {
                let operator = self.operator_api().await?;
                let deps = self.deps();
                if account.is_byoc() {
                    ByocFlow
                        .advance_creating(&deps, &operator, &mut account, cancel)
                        .await?
                } else {
                    ManagedFlow
                        .advance_creating(&deps, &operator, &mut account, cancel)
                        .await?
                }
            }

            AccountState::PendingVerification => {
                let opt_in = self.config.feature_opt_in_regions
                    && !self.config.opt_in_regions.is_empty();
                if opt_in
                    && !optin::fleet_has_enablement_capacity(&self.store, &account.meta.namespace)
                        .await?
                {
                    debug!(
                        account = %account.meta.name,
                        "region enablement ceiling reached, holding in verification"
                    );
                    return Ok(ReconcileOutcome::requeue_secs(60));
                }
                let operator = self.operator_api().await?;
                verification::handle_pending_verification(
                    &self.store,
                    &operator,
                    &mut account,
                    opt_in,
                )
                .await?
            }

            AccountState::OptingInRegions => {
                let api = self.account_api(&account).await?;
                optin::handle_opt_in_regions(
                    &api,
                    &self.sleeper,
                    &mut account,
                    &self.config.opt_in_regions,
                )
                .await?
            }

            AccountState::OptInRegionsEnabled => {
                account
                    .transition(AccountState::InitializingRegions)
                    .map_err(ControllerError::Validation)?;
                set_condition(
                    &mut account.status.conditions,
                    ConditionReason::InitializingRegions,
                    "starting region initialization",
                );
                ReconcileOutcome::Requeue
            }

            AccountState::InitializingRegions => {
                self.initialize_regions(cancel, &mut account).await?
            }

            AccountState::Ready => {
                if account.is_ready_unclaimed_with_claim_link() {
                    info!(account = %account.meta.name, "confirming claim on ready account");
                    account.status.claimed = true;
                }
                ReconcileOutcome::Done
            }

            // Failed was handled above
            AccountState::Failed => ReconcileOutcome::Done,
        };

        self.store.update_account(&account).await?;
        Ok(outcome)
    }

    async fn operator_api(&self) -> Result<B::Api, ControllerError> {
        Ok(self
            .builder
            .operator_api(&self.config.default_region)
            .await?)
    }

    /// Client scoped to the account via the organization access role.
    async fn account_api(&self, account: &Account) -> Result<B::Api, ControllerError> {
        let operator = self.operator_api().await?;
        let (api, _) = handle_role_assumption(
            &self.builder,
            &operator,
            &self.sleeper,
            RoleAssumptionRequest {
                account_id: &account.spec.aws_account_id,
                role_name: ORG_ACCESS_ROLE,
                region: &self.config.default_region,
                external_id: None,
                expected_role_id: None,
            },
        )
        .await?;
        Ok(api)
    }

    async fn initialize_regions(
        &self,
        cancel: &CancellationToken,
        account: &mut Account,
    ) -> ReconcileResult {
        let operator = self.operator_api().await?;
        let deps = self.deps();
        let creds = if account.is_byoc() {
            ByocFlow
                .acquire_credentials(&deps, &operator, account)
                .await?
        } else {
            ManagedFlow
                .acquire_credentials(&deps, &operator, account)
                .await?
        };

        let result = regioninit::initialize_regions(
            &self.builder,
            &creds,
            &self.config.supported_regions,
            &self.config.ami_owner,
            &self.config.init_instance_type,
            &self.sleeper,
            cancel,
        )
        .await;

        match result {
            Ok(()) => {
                info!(account = %account.meta.name, "account initialization completed");
                account
                    .transition(AccountState::Ready)
                    .map_err(ControllerError::Validation)?;
                if account.has_claim_link() {
                    account.status.claimed = true;
                }
                set_condition(
                    &mut account.status.conditions,
                    ConditionReason::AccountReady,
                    "account ready for use",
                );
                Ok(ReconcileOutcome::Done)
            }
            Err(err) if err.is_opt_in_required() => {
                info!(account = %account.meta.name, "account not ready yet, requeuing");
                set_condition(
                    &mut account.status.conditions,
                    ConditionReason::InitializingRegions,
                    "waiting for region opt-in to settle",
                );
                Ok(ReconcileOutcome::requeue_secs(REGION_INIT_REQUEUE_SECS))
            }
            Err(regioninit::RegionInitError::Cancelled) => Ok(ReconcileOutcome::Requeue),
            Err(regioninit::RegionInitError::Aws { region, source }) if source.is_retryable() => {
                warn!(account = %account.meta.name, region = %region, error = %source, "transient region failure");
                Ok(ReconcileOutcome::requeue_secs(REGION_INIT_REQUEUE_SECS))
            }
            Err(regioninit::RegionInitError::Aws { region, source }) => {
                set_account_failed(
                    account,
                    ConditionReason::InternalFailure,
                    &format!("failed to initialize region {region}: {source}"),
                );
                Ok(ReconcileOutcome::Done)
            }
            Err(regioninit::RegionInitError::OptInRequired(_)) => unreachable!(),
        }
    }

    async fn handle_deletion(
        &self,
        cancel: &CancellationToken,
        mut account: Account,
    ) -> ReconcileResult {
        // STS and BYOC accounts carry nothing of ours; the claim owns any
        // customer-side cleanup
        if account.spec.manual_sts_mode || account.is_byoc() {
            if account.meta.remove_finalizer(ACCOUNT_FINALIZER) {
                self.store.update_account(&account).await?;
            }
            return Ok(ReconcileOutcome::Done);
        }

        // Never-created placeholders have nothing to tear down either
        if account.has_aws_account_id() {
            let api = self.account_api(&account).await?;
            let report = TeardownEngine::new(&api, &account.spec.aws_account_id)
                .run(cancel)
                .await;
            if !report.is_clean() {
                let failed: Vec<String> = report
                    .failures
                    .iter()
                    .map(|(category, message)| format!("{category}: {message}"))
                    .collect();
                warn!(account = %account.meta.name, failures = ?failed, "teardown incomplete");
                set_condition(
                    &mut account.status.conditions,
                    ConditionReason::TeardownFailed,
                    failed.join("; "),
                );
                self.store.update_account_status(&account).await?;
                return Ok(ReconcileOutcome::requeue_secs(60));
            }
        }

        account.reset_for_reuse();
        account.meta.remove_finalizer(ACCOUNT_FINALIZER);
        self.store.update_account(&account).await?;
        info!(account = %account.meta.name, "account finalized");
        Ok(ReconcileOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::MemorySecrets;
    use crate::store::MemoryStore;
    use crate::testing::{MockAws, MockBuilder, NoopSleep};

    type TestReconciler = AccountReconciler<MemoryStore, MockBuilder, NoopSleep, MemorySecrets>;

    fn reconciler(mock: MockAws) -> (TestReconciler, MemoryStore) {
        let store = MemoryStore::new();
        let reconciler = AccountReconciler::new(
            store.clone(),
            MockBuilder::from(mock),
            NoopSleep,
            MemorySecrets::new(),
            Arc::new(OperatorConfig::default()),
            BudgetWatcher::new(100),
        );
        (reconciler, store)
    }

    async fn drive_to_done(
        reconciler: &TestReconciler,
        key: &Key,
        max_passes: usize,
    ) -> Account {
        let cancel = CancellationToken::new();
        for _ in 0..max_passes {
            match reconciler.reconcile(&cancel, key).await.unwrap() {
                ReconcileOutcome::Done => break,
                _ => continue,
            }
        }
        reconciler.store.get_account(key).await.unwrap()
    }

    #[tokio::test]
    async fn managed_account_reaches_ready() {
        let mock = MockAws::new();
        let (reconciler, store) = reconciler(mock.clone());

        let account = Account::new("acct-1", "shepherd");
        let stored = store.create_account(&account).await.unwrap();

        let final_account = drive_to_done(&reconciler, &stored.key(), 12).await;

        assert_eq!(final_account.status.state, AccountState::Ready);
        assert_eq!(final_account.spec.aws_account_id, "100000000001");
        assert!(!final_account.status.claimed);
        // creation, verification, and region activation all ran
        assert_eq!(mock.count("create_account"), 1);
        assert_eq!(mock.count("create_support_case"), 1);
        assert!(mock.count("run_instance") >= 1);
    }

    #[tokio::test]
    async fn failed_accounts_are_skipped() {
        let mock = MockAws::new();
        let (reconciler, store) = reconciler(mock.clone());

        let mut account = Account::new("acct-1", "shepherd");
        account.status.state = AccountState::Failed;
        let stored = store.create_account(&account).await.unwrap();

        let outcome = reconciler
            .reconcile(&CancellationToken::new(), &stored.key())
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Done);
        assert_eq!(mock.count("create_account"), 0);
    }

    #[tokio::test]
    async fn ready_account_with_claim_link_gets_claimed() {
        let mock = MockAws::new();
        let (reconciler, store) = reconciler(mock.clone());

        let mut account = Account::new("acct-1", "shepherd");
        account.status.state = AccountState::Ready;
        account.spec.claim_link = "claim".to_string();
        account.spec.claim_link_namespace = "tenant".to_string();
        let stored = store.create_account(&account).await.unwrap();

        reconciler
            .reconcile(&CancellationToken::new(), &stored.key())
            .await
            .unwrap();

        let updated = store.get_account(&stored.key()).await.unwrap();
        assert!(updated.status.claimed);
    }

    #[tokio::test]
    async fn managed_deletion_runs_teardown_and_finalizes() {
        let mock = MockAws::new();
        mock.add_bucket("leftover", &["obj"]);
        let (reconciler, store) = reconciler(mock.clone());

        let mut account = Account::new("acct-1", "shepherd");
        account.spec.aws_account_id = "100000000001".to_string();
        account.status.state = AccountState::Ready;
        account.meta.add_finalizer(ACCOUNT_FINALIZER);
        let stored = store.create_account(&account).await.unwrap();

        store.delete_account(&stored.key()).await.unwrap();
        reconciler
            .reconcile(&CancellationToken::new(), &stored.key())
            .await
            .unwrap();

        // teardown emptied the bucket and the object is physically gone
        assert!(mock
            .destructive_calls()
            .contains(&"delete_bucket:leftover".to_string()));
        assert!(store.get_account(&stored.key()).await.is_err());
    }

    #[tokio::test]
    async fn sts_account_deletion_only_drops_finalizer() {
        let mock = MockAws::new();
        let (reconciler, store) = reconciler(mock.clone());

        let mut account = Account::new("sts-1", "shepherd");
        account.spec.byoc = true;
        account.spec.manual_sts_mode = true;
        account.status.state = AccountState::Ready;
        let stored = store.create_account(&account).await.unwrap();

        store.delete_account(&stored.key()).await.unwrap();
        reconciler
            .reconcile(&CancellationToken::new(), &stored.key())
            .await
            .unwrap();

        assert!(store.get_account(&stored.key()).await.is_err());
        assert!(mock.destructive_calls().is_empty());
    }
}
