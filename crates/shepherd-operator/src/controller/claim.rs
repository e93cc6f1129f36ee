//! The claim state machine
//!
//! Drives a claim from pending through account binding to ready, and on
//! deletion tears the bound account down and returns it to the pool (or
//! deletes it, for customer-supplied accounts).

use crate::aws::api::ClientBuilder;
use crate::aws::sts::{handle_role_assumption, RoleAssumptionRequest};
use crate::aws::teardown::TeardownEngine;
use crate::config::OperatorConfig;
use crate::controller::matcher;
use crate::controller::{ControllerError, ReconcileOutcome, ReconcileResult};
use crate::retry::Sleep;
use crate::store::{ControlPlane, StoreError};
use shepherd_common::conditions::{set_condition, ConditionReason};
use shepherd_common::defaults::{CLAIM_FINALIZER, ORG_ACCESS_ROLE};
use shepherd_common::{Account, AccountClaim, ClaimState, Key};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use tracing::{debug, info, warn};

/// How long a claim waits between checks on a not-yet-ready account
const BIND_POLL_SECS: u64 = 30;

/// Reconciles AccountClaim entities.
pub struct ClaimReconciler<C, B, S> {
    store: C,
    builder: B,
    sleeper: S,
    config: Arc<OperatorConfig>,
}

impl<C, B, S> ClaimReconciler<C, B, S>
where
    C: ControlPlane,
    B: ClientBuilder,
    S: Sleep,
{
    pub fn new(store: C, builder: B, sleeper: S, config: Arc<OperatorConfig>) -> Self {
        Self {
            store,
            builder,
            sleeper,
            config,
        }
    }

    pub async fn reconcile(&self, cancel: &CancellationToken, key: &Key) -> ReconcileResult {
        let mut claim = match self.store.get_claim(key).await {
            Ok(claim) => claim,
            Err(StoreError::NotFound { .. }) => return Ok(ReconcileOutcome::Done),
            Err(err) => return Err(err.into()),
        };

        if claim.meta.is_pending_deletion() {
            return self.handle_deletion(cancel, claim).await;
        }

        if claim.meta.add_finalizer(CLAIM_FINALIZER) {
            claim = self.store.update_claim(&claim).await?;
        }

        if claim.status.state == ClaimState::Error {
            debug!(claim = %claim.meta.name, "claim is in error state, ignoring");
            return Ok(ReconcileOutcome::Done);
        }

        if let Err(message) = claim.validate() {
            warn!(claim = %claim.meta.name, message, "claim failed validation");
            claim
                .transition(ClaimState::Error)
                .map_err(ControllerError::Validation)?;
            set_condition(
                &mut claim.status.conditions,
                ConditionReason::ClaimError,
                &message,
            );
            self.store.update_claim_status(&claim).await?;
            return Err(ControllerError::Validation(message));
        }

        if claim.status.state == ClaimState::Unset {
            claim
                .transition(ClaimState::Pending)
                .map_err(ControllerError::Validation)?;
            set_condition(
                &mut claim.status.conditions,
                ConditionReason::ClaimPending,
                "claim accepted",
            );
            claim = self.store.update_claim_status(&claim).await?;
        }

        if !claim.has_account_link() {
            if claim.is_byoc() {
                return self.create_byoc_account(claim).await;
            }
            return self.match_and_bind(claim).await;
        }

        self.track_bound_account(claim).await
    }

    /// Create the Account object backing a BYOC claim.
    async fn create_byoc_account(&self, mut claim: AccountClaim) -> ReconcileResult {
        let byoc = claim.spec.byoc.clone().expect("validated BYOC claim");
        let suffix = Uuid::new_v4().simple().to_string();

        let mut account = Account::new(
            format!("shepherd-ccs-{}", &suffix[..12]),
            self.config.namespace.clone(),
        );
        account.spec.byoc = true;
        account.spec.aws_account_id = byoc.aws_account_id.clone();
        // Claims carrying a trusted role instead of credentials run in
        // manual STS mode: no IAM user is ever provisioned
        account.spec.manual_sts_mode = !byoc.role_arn.is_empty() && byoc.secret_ref.name.is_empty();
        account.spec.legal_entity = claim.spec.legal_entity.clone();
        account.spec.claim_link = claim.meta.name.clone();
        account.spec.claim_link_namespace = claim.meta.namespace.clone();

        let created = self.store.create_account(&account).await?;
        info!(
            claim = %claim.meta.name,
            account = %created.meta.name,
            aws_account_id = %byoc.aws_account_id,
            "created BYOC account for claim"
        );

        claim.spec.account_link = created.meta.name.clone();
        let mut claim = self.store.update_claim(&claim).await?;
        claim
            .transition(ClaimState::InProgress)
            .map_err(ControllerError::Validation)?;
        set_condition(
            &mut claim.status.conditions,
            ConditionReason::ClaimBound,
            "BYOC account created",
        );
        self.store.update_claim_status(&claim).await?;
        Ok(ReconcileOutcome::Requeue)
    }

    /// Match the claim against the pool and bind, or arrange capacity.
    async fn match_and_bind(&self, mut claim: AccountClaim) -> ReconcileResult {
        let accounts = self.store.list_accounts(&self.config.namespace).await?;

        let Some(selected) = matcher::select_account(&claim, &accounts) else {
            return self.handle_no_capacity(claim, &accounts).await;
        };

        // Bind the account side first; a concurrent claim loses the
        // version race here and re-matches from the top.
        let mut account = selected.clone();
        account.bind_claim(&claim.meta.name, &claim.meta.namespace);
        // The account is tenant-tagged from its first claim onward; reuse
        // never crosses legal entities after this point
        account.spec.legal_entity = claim.spec.legal_entity.clone();
        match self.store.update_account(&account).await {
            Ok(_) => {}
            Err(StoreError::Conflict { .. }) => {
                debug!(
                    claim = %claim.meta.name,
                    account = %account.meta.name,
                    "account changed while binding, re-matching"
                );
                return Ok(ReconcileOutcome::Requeue);
            }
            Err(err) => return Err(err.into()),
        }

        claim.spec.account_link = account.meta.name.clone();
        match self.store.update_claim(&claim).await {
            Ok(updated) => claim = updated,
            Err(StoreError::Conflict { .. }) => return Ok(ReconcileOutcome::Requeue),
            Err(err) => return Err(err.into()),
        }

        info!(
            claim = %claim.meta.name,
            account = %account.meta.name,
            "claim bound to account"
        );
        claim
            .transition(ClaimState::InProgress)
            .map_err(ControllerError::Validation)?;
        set_condition(
            &mut claim.status.conditions,
            ConditionReason::ClaimBound,
            format!("bound to account {}", account.meta.name),
        );
        self.store.update_claim_status(&claim).await?;
        Ok(ReconcileOutcome::Requeue)
    }

    /// No available account: replenish the pool or report the shortage.
    async fn handle_no_capacity(
        &self,
        mut claim: AccountClaim,
        accounts: &[Account],
    ) -> ReconcileResult {
        let pool = claim.spec.account_pool.clone();
        if self.config.pool_creates_on_empty(&pool) {
            // One in-flight account per shortage; repeated requeues must
            // not stack placeholders
            let already_inflight = accounts.iter().any(|a| {
                a.spec.account_pool == pool
                    && !a.is_claimed()
                    && !a.is_ready()
                    && !a.is_failed()
                    && !a.meta.is_pending_deletion()
            });
            if !already_inflight {
                let replenishment =
                    matcher::replenishment_account(&self.config.namespace, &pool);
                info!(
                    claim = %claim.meta.name,
                    account = %replenishment.meta.name,
                    pool = %pool,
                    "no account available, requesting replenishment"
                );
                self.store.create_account(&replenishment).await?;
            }

            claim
                .transition(ClaimState::PendingAccount)
                .map_err(ControllerError::Validation)?;
            set_condition(
                &mut claim.status.conditions,
                ConditionReason::ClaimPending,
                "waiting for a new account to become ready",
            );
            self.store.update_claim_status(&claim).await?;
            return Ok(ReconcileOutcome::requeue_secs(BIND_POLL_SECS));
        }

        // Absence of capacity in a named pool is a reported condition, not
        // something to retry silently forever
        let message = format!("no accounts available in pool {pool}");
        warn!(claim = %claim.meta.name, pool = %pool, "{message}");
        claim
            .transition(ClaimState::Error)
            .map_err(ControllerError::Validation)?;
        set_condition(
            &mut claim.status.conditions,
            ConditionReason::ClaimError,
            &message,
        );
        self.store.update_claim_status(&claim).await?;
        Err(ControllerError::Validation(message))
    }

    /// Watch the bound account until it is ready and claimed.
    async fn track_bound_account(&self, mut claim: AccountClaim) -> ReconcileResult {
        let account_key = Key::new(claim.spec.account_link.clone(), self.config.namespace.clone());
        let account = match self.store.get_account(&account_key).await {
            Ok(account) => account,
            Err(StoreError::NotFound { .. }) => {
                // The bound account vanished; release the link so the claim
                // can re-match
                warn!(
                    claim = %claim.meta.name,
                    account = %claim.spec.account_link,
                    "bound account no longer exists, re-matching"
                );
                claim.spec.account_link.clear();
                self.store.update_claim(&claim).await?;
                return Ok(ReconcileOutcome::Requeue);
            }
            Err(err) => return Err(err.into()),
        };

        if account.is_ready() && account.is_claimed() {
            if claim.status.state != ClaimState::Ready {
                claim
                    .transition(ClaimState::Ready)
                    .map_err(ControllerError::Validation)?;
                set_condition(
                    &mut claim.status.conditions,
                    ConditionReason::ClaimReady,
                    "account ready",
                );
                self.store.update_claim_status(&claim).await?;
                info!(claim = %claim.meta.name, "claim ready");
            }
            return Ok(ReconcileOutcome::Done);
        }

        if claim.status.state != ClaimState::InProgress {
            claim
                .transition(ClaimState::InProgress)
                .map_err(ControllerError::Validation)?;
            self.store.update_claim_status(&claim).await?;
        }
        Ok(ReconcileOutcome::requeue_secs(BIND_POLL_SECS))
    }

    /// Teardown and release on claim deletion. The claim object is only
    /// finalized after a clean teardown and a successful account reset.
    async fn handle_deletion(
        &self,
        cancel: &CancellationToken,
        mut claim: AccountClaim,
    ) -> ReconcileResult {
        if !claim.meta.has_finalizer(CLAIM_FINALIZER) {
            return Ok(ReconcileOutcome::Done);
        }
        // Someone else still holds the object; wait for them
        if claim.meta.finalizers.iter().any(|f| f != CLAIM_FINALIZER) {
            debug!(claim = %claim.meta.name, "other finalizers present, waiting");
            return Ok(ReconcileOutcome::Done);
        }

        if claim.has_account_link() {
            let account_key = Key::new(claim.spec.account_link.clone(), self.config.namespace.clone());
            match self.store.get_account(&account_key).await {
                Ok(account) if account.is_byoc() => {
                    // The customer keeps their account; we only drop our
                    // object for it
                    self.store.delete_account(&account_key).await?;
                }
                Ok(account) => {
                    self.release_managed_account(cancel, account).await?;
                }
                Err(StoreError::NotFound { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }

        claim.meta.remove_finalizer(CLAIM_FINALIZER);
        self.store.update_claim(&claim).await?;
        info!(claim = %claim.meta.name, "claim finalized");
        Ok(ReconcileOutcome::Done)
    }

    /// Tear the account's resources down and return it to the pool.
    async fn release_managed_account(
        &self,
        cancel: &CancellationToken,
        account: Account,
    ) -> Result<(), ControllerError> {
        let operator = self
            .builder
            .operator_api(&self.config.default_region)
            .await?;
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

        let report = TeardownEngine::new(&api, &account.spec.aws_account_id)
            .run(cancel)
            .await;
        if !report.is_clean() {
            let failed: Vec<String> = report
                .failures
                .iter()
                .map(|(category, message)| format!("{category}: {message}"))
                .collect();
            return Err(ControllerError::Validation(format!(
                "account teardown incomplete: {}",
                failed.join("; ")
            )));
        }

        // Reset against the freshest copy; a conflict here means the
        // account moved under us and the whole deletion retries
        let mut fresh = self.store.get_account(&account.key()).await?;
        fresh.reset_for_reuse();
        match self.store.update_account(&fresh).await {
            Ok(_) => {
                info!(account = %fresh.meta.name, "account reset for reuse");
                Ok(())
            }
            Err(StoreError::Conflict { .. }) => Err(ControllerError::ResetConflict),
            Err(err) => Err(err.into()),
        }
    }
}
