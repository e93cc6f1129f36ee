//! Provisioning flows: managed vs. customer-supplied accounts
//!
//! The account state machine shares its skeleton (finalizers, failure
//! reporting, conditions) across both kinds of account; the steps that
//! differ are behind [`ProvisionFlow`]. `ManagedFlow` creates accounts at
//! the provider and provisions an IAM admin user; `ByocFlow` adopts a
//! customer account and earns access by creating an admin role in it (or,
//! in manual STS mode, by chaining through the jump role).

use crate::aws::api::{AwsApi, AwsResult, ClientBuilder};
use crate::aws::sts::{
    chain_through_jump_role, handle_role_assumption, RoleAssumptionRequest,
};
use crate::aws::AssumedCredentials;
use crate::config::OperatorConfig;
use crate::controller::{ControllerError, ReconcileOutcome, ReconcileResult};
use crate::limits::BudgetWatcher;
use crate::retry::Sleep;
use crate::secrets::{CredentialSecret, SecretStore};
use crate::store::ControlPlane;
use shepherd_common::conditions::{find_condition, set_condition, ConditionReason};
use shepherd_common::defaults::{
    BUDGET_COOLDOWN_SECS, CREATE_STATUS_POLL_SECS, MANAGED_ADMIN_USER, ORG_ACCESS_ROLE,
};
use shepherd_common::tags::{TAG_MANAGED, TAG_MANAGED_VALUE, TAG_OWNER};
use shepherd_common::{Account, AccountState, SecretRef};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Role created in customer accounts granting the operator admin access
pub const CUSTOMER_ADMIN_ROLE: &str = "CustomerAdminAccess";

const ADMIN_POLICY_ARN: &str = "arn:aws:iam::aws:policy/AdministratorAccess";

/// Creation-status polls made within a single reconcile; provider-side
/// completion lands in low tens of seconds
const CREATE_POLL_ATTEMPTS: u32 = 6;

/// Everything a flow needs besides the account itself.
pub struct FlowDeps<'a, C, B, S, Se> {
    pub store: &'a C,
    pub builder: &'a B,
    pub sleeper: &'a S,
    pub secrets: &'a Se,
    pub config: &'a OperatorConfig,
    pub budget: &'a BudgetWatcher,
}

/// Mark an account failed with a stable reason. Terminal; the reconciler
/// skips failed accounts from then on.
pub fn set_account_failed(account: &mut Account, reason: ConditionReason, message: &str) {
    warn!(account = %account.meta.name, reason = %reason, message, "account failed");
    account.status.state = AccountState::Failed;
    set_condition(&mut account.status.conditions, reason, message);
    set_condition(
        &mut account.status.conditions,
        ConditionReason::AccountFailed,
        message,
    );
}

/// The steps that differ between managed and BYOC accounts. Flows mutate
/// the account in place; the reconciler persists it afterwards.
pub trait ProvisionFlow<C, B, S, Se>: Send + Sync
where
    C: ControlPlane,
    B: ClientBuilder,
    S: Sleep,
    Se: SecretStore,
{
    /// Move an account with no state toward Creating.
    fn begin(
        &self,
        deps: &FlowDeps<'_, C, B, S, Se>,
        operator: &B::Api,
        account: &mut Account,
    ) -> impl Future<Output = ReconcileResult> + Send;

    /// Advance an account sitting in Creating.
    fn advance_creating(
        &self,
        deps: &FlowDeps<'_, C, B, S, Se>,
        operator: &B::Api,
        account: &mut Account,
        cancel: &CancellationToken,
    ) -> impl Future<Output = ReconcileResult> + Send;

    /// Produce credentials usable for region initialization.
    fn acquire_credentials(
        &self,
        deps: &FlowDeps<'_, C, B, S, Se>,
        operator: &B::Api,
        account: &mut Account,
    ) -> impl Future<Output = Result<AssumedCredentials, ControllerError>> + Send;
}

/// Provider-created accounts.
pub struct ManagedFlow;

/// Customer-supplied accounts (with or without manual STS mode).
pub struct ByocFlow;

impl<C, B, S, Se> ProvisionFlow<C, B, S, Se> for ManagedFlow
where
    C: ControlPlane,
    B: ClientBuilder,
    S: Sleep,
    Se: SecretStore,
{
    async fn begin(
        &self,
        deps: &FlowDeps<'_, C, B, S, Se>,
        operator: &B::Api,
        account: &mut Account,
    ) -> ReconcileResult {
        if account.status.state == AccountState::Unset {
            account
                .transition(AccountState::Pending)
                .map_err(ControllerError::Validation)?;
            set_condition(
                &mut account.status.conditions,
                ConditionReason::AccountCreating,
                "accepted for creation",
            );
            return Ok(ReconcileOutcome::Requeue);
        }

        if account.has_aws_account_id() {
            // Pre-provisioned: the provider account already exists
            info!(account = %account.meta.name, "AWS account already created");
            account
                .transition(AccountState::Creating)
                .map_err(ControllerError::Validation)?;
            set_condition(
                &mut account.status.conditions,
                ConditionReason::AccountCreating,
                "AWS account already created",
            );
            return Ok(ReconcileOutcome::Requeue);
        }

        // The creation budget is a limit we enforce to prevent runaway
        // account creation; hitting it is not the account's fault.
        if !deps.budget.can_create() {
            info!(account = %account.meta.name, "account creation budget exhausted, waiting");
            set_condition(
                &mut account.status.conditions,
                ConditionReason::AccountLimitExceeded,
                "account creation budget exhausted",
            );
            return Ok(ReconcileOutcome::requeue_secs(BUDGET_COOLDOWN_SECS));
        }

        let email = deps.config.account_email(&account.meta.name);
        let request_id = operator.create_account(&account.meta.name, &email).await?;
        account.status.creation_request_id = request_id;
        account
            .transition(AccountState::Creating)
            .map_err(ControllerError::Validation)?;
        set_condition(
            &mut account.status.conditions,
            ConditionReason::AccountCreating,
            "provider account creation requested",
        );
        Ok(ReconcileOutcome::Requeue)
    }

    async fn advance_creating(
        &self,
        deps: &FlowDeps<'_, C, B, S, Se>,
        operator: &B::Api,
        account: &mut Account,
        cancel: &CancellationToken,
    ) -> ReconcileResult {
        // A creation pending longer than the configured threshold fails
        if let Some(condition) =
            find_condition(&account.status.conditions, ConditionReason::AccountCreating)
        {
            if condition.age() > chrono::Duration::minutes(deps.config.create_pend_minutes) {
                let message = format!(
                    "Creation pending for longer than {} minutes",
                    deps.config.create_pend_minutes
                );
                set_account_failed(account, ConditionReason::CreationTimeout, &message);
                return Ok(ReconcileOutcome::Done);
            }
        }

        if account.status.creation_request_id.is_empty() {
            // Pre-provisioned account; nothing to poll
            account
                .transition(AccountState::PendingVerification)
                .map_err(ControllerError::Validation)?;
            return Ok(ReconcileOutcome::Requeue);
        }

        for _ in 0..CREATE_POLL_ATTEMPTS {
            if cancel.is_cancelled() {
                return Ok(ReconcileOutcome::Requeue);
            }

            let creation = operator
                .describe_create_account_status(&account.status.creation_request_id)
                .await?;

            match creation.state {
                crate::aws::api::CreationState::Succeeded => {
                    let account_id = creation.account_id.unwrap_or_default();
                    info!(account = %account.meta.name, aws_account_id = %account_id, "account created");
                    account.spec.aws_account_id = account_id;
                    account.status.creation_request_id.clear();
                    set_condition(
                        &mut account.status.conditions,
                        ConditionReason::AccountCreated,
                        "provider account creation succeeded",
                    );

                    if let Err(err) = operator
                        .tag_account(
                            &account.spec.aws_account_id,
                            TAG_OWNER,
                            &deps.config.shard_name,
                        )
                        .await
                    {
                        warn!(
                            account = %account.meta.name,
                            error = %err,
                            "unable to tag AWS account"
                        );
                    }

                    account
                        .transition(AccountState::PendingVerification)
                        .map_err(ControllerError::Validation)?;
                    return Ok(ReconcileOutcome::Requeue);
                }
                crate::aws::api::CreationState::Failed => {
                    let reason = creation.failure_reason.unwrap_or_default();
                    return match reason.as_str() {
                        "ACCOUNT_LIMIT_EXCEEDED" => {
                            // Capacity, not this account's fault; retry the
                            // whole creation once the ceiling lifts
                            account.status.creation_request_id.clear();
                            set_condition(
                                &mut account.status.conditions,
                                ConditionReason::AccountLimitExceeded,
                                "provider account limit exceeded",
                            );
                            Ok(ReconcileOutcome::requeue_secs(BUDGET_COOLDOWN_SECS))
                        }
                        _ => {
                            set_account_failed(
                                account,
                                ConditionReason::InternalFailure,
                                &format!("provider account creation failed: {reason}"),
                            );
                            Ok(ReconcileOutcome::Done)
                        }
                    };
                }
                crate::aws::api::CreationState::InProgress => {
                    deps.sleeper
                        .sleep(Duration::from_secs(CREATE_STATUS_POLL_SECS))
                        .await;
                }
            }
        }

        // Still in progress; hand the worker back and check again later
        Ok(ReconcileOutcome::requeue_secs(CREATE_STATUS_POLL_SECS))
    }

    async fn acquire_credentials(
        &self,
        deps: &FlowDeps<'_, C, B, S, Se>,
        operator: &B::Api,
        account: &mut Account,
    ) -> Result<AssumedCredentials, ControllerError> {
        let (account_api, creds) = handle_role_assumption(
            deps.builder,
            operator,
            deps.sleeper,
            RoleAssumptionRequest {
                account_id: &account.spec.aws_account_id,
                role_name: ORG_ACCESS_ROLE,
                region: &deps.config.default_region,
                external_id: None,
                expected_role_id: None,
            },
        )
        .await?;

        ensure_managed_admin(&account_api, deps, account).await?;
        Ok(creds)
    }
}

/// Provision the operator-owned IAM admin user in a managed account and
/// store a fresh access key via the secrets boundary.
async fn ensure_managed_admin<C, B, S, Se>(
    api: &impl AwsApi,
    deps: &FlowDeps<'_, C, B, S, Se>,
    account: &Account,
) -> Result<(), ControllerError>
where
    C: ControlPlane,
    B: ClientBuilder,
    S: Sleep,
    Se: SecretStore,
{
    let users = api.list_users().await?;
    if !users.iter().any(|u| u == MANAGED_ADMIN_USER) {
        api.create_user(MANAGED_ADMIN_USER).await?;
        api.attach_user_policy(MANAGED_ADMIN_USER, ADMIN_POLICY_ARN)
            .await?;
    }
    api.tag_user(MANAGED_ADMIN_USER, TAG_OWNER, &deps.config.shard_name)
        .await?;
    api.tag_user(MANAGED_ADMIN_USER, TAG_MANAGED, TAG_MANAGED_VALUE)
        .await?;

    // Rotate: old keys are useless once the account changes hands
    for key_id in api.list_access_keys(MANAGED_ADMIN_USER).await? {
        api.delete_access_key(MANAGED_ADMIN_USER, &key_id).await?;
    }
    let key = api.create_access_key(MANAGED_ADMIN_USER).await?;

    deps.secrets
        .put_secret(
            &SecretRef {
                name: format!("{}-secret", account.meta.name),
                namespace: account.meta.namespace.clone(),
            },
            CredentialSecret {
                access_key_id: key.access_key_id,
                secret_access_key: key.secret_access_key,
            },
        )
        .await?;
    Ok(())
}

impl<C, B, S, Se> ProvisionFlow<C, B, S, Se> for ByocFlow
where
    C: ControlPlane,
    B: ClientBuilder,
    S: Sleep,
    Se: SecretStore,
{
    async fn begin(
        &self,
        _deps: &FlowDeps<'_, C, B, S, Se>,
        _operator: &B::Api,
        account: &mut Account,
    ) -> ReconcileResult {
        if !account.has_claim_link() {
            return Err(ControllerError::Validation(format!(
                "BYOC account {} has no claim link",
                account.meta.name
            )));
        }
        if !account.is_claimed() {
            info!(account = %account.meta.name, "marking BYOC account claimed");
            account.status.claimed = true;
        }
        account
            .transition(AccountState::Creating)
            .map_err(ControllerError::Validation)?;
        set_condition(
            &mut account.status.conditions,
            ConditionReason::AccountCreating,
            "adopting customer account",
        );
        Ok(ReconcileOutcome::Requeue)
    }

    async fn advance_creating(
        &self,
        _deps: &FlowDeps<'_, C, B, S, Se>,
        _operator: &B::Api,
        account: &mut Account,
        _cancel: &CancellationToken,
    ) -> ReconcileResult {
        // Nothing to create at the provider; access is earned during
        // region initialization
        account
            .transition(AccountState::InitializingRegions)
            .map_err(ControllerError::Validation)?;
        set_condition(
            &mut account.status.conditions,
            ConditionReason::InitializingRegions,
            "customer account adopted",
        );
        Ok(ReconcileOutcome::Requeue)
    }

    async fn acquire_credentials(
        &self,
        deps: &FlowDeps<'_, C, B, S, Se>,
        operator: &B::Api,
        account: &mut Account,
    ) -> Result<AssumedCredentials, ControllerError> {
        let claim_key = account.claim_key().ok_or_else(|| {
            ControllerError::Validation(format!(
                "BYOC account {} has no claim link",
                account.meta.name
            ))
        })?;
        let claim = deps.store.get_claim(&claim_key).await?;
        let byoc = claim.spec.byoc.as_ref().ok_or_else(|| {
            ControllerError::Validation(format!(
                "claim {} bound to BYOC account {} has no BYOC config",
                claim.meta.name, account.meta.name
            ))
        })?;

        if account.spec.manual_sts_mode {
            let (_, creds) = chain_through_jump_role(
                deps.builder,
                operator,
                deps.sleeper,
                &deps.config.sts_jump_arn,
                &byoc.role_arn,
                some_nonempty(&byoc.external_id),
                &deps.config.default_region,
            )
            .await?;
            return Ok(creds);
        }

        // Bootstrap with the customer's own credentials, rotate in a fresh
        // admin role, then assume it and verify we got the new role.
        let customer_api = deps
            .builder
            .from_secret(&byoc.secret_ref, &deps.config.default_region)
            .await?;
        let role_id = ensure_customer_admin_role(&customer_api, deps.config).await?;

        let (_, creds) = handle_role_assumption(
            deps.builder,
            operator,
            deps.sleeper,
            RoleAssumptionRequest {
                account_id: &account.spec.aws_account_id,
                role_name: CUSTOMER_ADMIN_ROLE,
                region: &deps.config.default_region,
                external_id: some_nonempty(&byoc.external_id),
                expected_role_id: Some(&role_id),
            },
        )
        .await?;
        Ok(creds)
    }
}

fn some_nonempty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Create (replacing any stale copy) the admin role the operator assumes in
/// a customer account. Returns the new role's ID; the caller verifies the
/// assumed-role ID against it to ride out IAM eventual consistency.
async fn ensure_customer_admin_role(
    api: &impl AwsApi,
    config: &OperatorConfig,
) -> AwsResult<String> {
    if let Some(existing) = api.get_role(CUSTOMER_ADMIN_ROLE).await? {
        info!(role = %existing.name, "replacing existing customer admin role");
        for policy in api.list_attached_role_policies(CUSTOMER_ADMIN_ROLE).await? {
            api.detach_role_policy(CUSTOMER_ADMIN_ROLE, &policy.arn)
                .await?;
        }
        api.delete_role(CUSTOMER_ADMIN_ROLE).await?;
    }

    let trust_policy = serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Action": ["sts:AssumeRole"],
            "Principal": { "AWS": [config.sre_access_arn] }
        }]
    })
    .to_string();

    let role_id = api
        .create_role(
            CUSTOMER_ADMIN_ROLE,
            &trust_policy,
            "Operator admin access for customer-supplied account",
        )
        .await?;
    api.attach_role_policy(CUSTOMER_ADMIN_ROLE, ADMIN_POLICY_ARN)
        .await?;

    let inline_policy = serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Action": "*",
            "Resource": "*"
        }]
    })
    .to_string();
    api.put_role_policy(CUSTOMER_ADMIN_ROLE, "operator-access", &inline_policy)
        .await?;

    Ok(role_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::api::{AccountCreation, CreationState};
    use crate::store::MemoryStore;
    use crate::testing::{MockAws, MockBuilder, NoopSleep};
    use crate::secrets::MemorySecrets;

    struct Fixture {
        store: MemoryStore,
        builder: MockBuilder,
        secrets: MemorySecrets,
        config: OperatorConfig,
        budget: BudgetWatcher,
    }

    impl Fixture {
        fn new() -> Self {
            let mock = MockAws::new();
            Self {
                store: MemoryStore::new(),
                builder: MockBuilder::from(mock),
                secrets: MemorySecrets::new(),
                config: OperatorConfig::default(),
                budget: BudgetWatcher::new(100),
            }
        }

        fn deps(&self) -> FlowDeps<'_, MemoryStore, MockBuilder, NoopSleep, MemorySecrets> {
            FlowDeps {
                store: &self.store,
                builder: &self.builder,
                sleeper: &NoopSleep,
                secrets: &self.secrets,
                config: &self.config,
                budget: &self.budget,
            }
        }

        fn mock(&self) -> &MockAws {
            self.builder.api()
        }
    }

    #[tokio::test]
    async fn managed_begin_walks_pending_then_creates() {
        let fixture = Fixture::new();
        let mut account = Account::new("acct-1", "shepherd");
        let operator = fixture.mock().clone();

        // Unset normalizes to Pending first
        ManagedFlow
            .begin(&fixture.deps(), &operator, &mut account)
            .await
            .unwrap();
        assert_eq!(account.status.state, AccountState::Pending);
        assert_eq!(fixture.mock().count("create_account"), 0);

        // Pending requests creation
        ManagedFlow
            .begin(&fixture.deps(), &operator, &mut account)
            .await
            .unwrap();
        assert_eq!(account.status.state, AccountState::Creating);
        assert_eq!(account.status.creation_request_id, "car-mock-1");
        assert_eq!(fixture.mock().count("create_account"), 1);
    }

    #[tokio::test]
    async fn managed_begin_respects_the_budget() {
        let fixture = Fixture::new();
        fixture.budget.refresh(100); // at the ceiling
        let mut account = Account::new("acct-1", "shepherd");
        account.status.state = AccountState::Pending;
        let operator = fixture.mock().clone();

        let outcome = ManagedFlow
            .begin(&fixture.deps(), &operator, &mut account)
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::RequeueAfter(_)));
        assert_eq!(account.status.state, AccountState::Pending);
        assert_eq!(fixture.mock().count("create_account"), 0);
        assert!(find_condition(
            &account.status.conditions,
            ConditionReason::AccountLimitExceeded
        )
        .is_some());
    }

    #[tokio::test]
    async fn managed_pre_provisioned_skips_creation() {
        let fixture = Fixture::new();
        let mut account = Account::new("acct-1", "shepherd");
        account.spec.aws_account_id = "200000000002".to_string();
        account.status.state = AccountState::Pending;
        let operator = fixture.mock().clone();

        ManagedFlow
            .begin(&fixture.deps(), &operator, &mut account)
            .await
            .unwrap();
        assert_eq!(account.status.state, AccountState::Creating);
        assert!(account.status.creation_request_id.is_empty());
        assert_eq!(fixture.mock().count("create_account"), 0);

        ManagedFlow
            .advance_creating(
                &fixture.deps(),
                &operator,
                &mut account,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(account.status.state, AccountState::PendingVerification);
    }

    #[tokio::test]
    async fn managed_creation_poll_records_account_id_and_tags() {
        let fixture = Fixture::new();
        let mut account = Account::new("acct-1", "shepherd");
        account.status.state = AccountState::Creating;
        account.status.creation_request_id = "car-mock-1".to_string();
        set_condition(
            &mut account.status.conditions,
            ConditionReason::AccountCreating,
            "requested",
        );
        let operator = fixture.mock().clone();

        ManagedFlow
            .advance_creating(
                &fixture.deps(),
                &operator,
                &mut account,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(account.spec.aws_account_id, "100000000001");
        assert_eq!(account.status.state, AccountState::PendingVerification);
        assert_eq!(fixture.mock().count("tag_account"), 1);
    }

    #[tokio::test]
    async fn managed_creation_internal_failure_is_terminal() {
        let fixture = Fixture::new();
        fixture.mock().push_creation_status(AccountCreation {
            request_id: "car-mock-1".to_string(),
            state: CreationState::Failed,
            account_id: None,
            failure_reason: Some("INTERNAL_FAILURE".to_string()),
        });

        let mut account = Account::new("acct-1", "shepherd");
        account.status.state = AccountState::Creating;
        account.status.creation_request_id = "car-mock-1".to_string();
        let operator = fixture.mock().clone();

        ManagedFlow
            .advance_creating(
                &fixture.deps(),
                &operator,
                &mut account,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(account.status.state, AccountState::Failed);
    }

    #[tokio::test]
    async fn managed_creation_limit_is_capacity_not_failure() {
        let fixture = Fixture::new();
        fixture.mock().push_creation_status(AccountCreation {
            request_id: "car-mock-1".to_string(),
            state: CreationState::Failed,
            account_id: None,
            failure_reason: Some("ACCOUNT_LIMIT_EXCEEDED".to_string()),
        });

        let mut account = Account::new("acct-1", "shepherd");
        account.status.state = AccountState::Creating;
        account.status.creation_request_id = "car-mock-1".to_string();
        let operator = fixture.mock().clone();

        let outcome = ManagedFlow
            .advance_creating(
                &fixture.deps(),
                &operator,
                &mut account,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::RequeueAfter(_)));
        assert_eq!(account.status.state, AccountState::Creating);
        assert!(account.status.creation_request_id.is_empty());
    }

    #[tokio::test]
    async fn managed_credentials_provision_admin_user_and_secret() {
        let fixture = Fixture::new();
        let mut account = Account::new("acct-1", "shepherd");
        account.spec.aws_account_id = "100000000001".to_string();
        let operator = fixture.mock().clone();

        ManagedFlow
            .acquire_credentials(&fixture.deps(), &operator, &mut account)
            .await
            .unwrap();

        assert!(fixture
            .mock()
            .users()
            .contains(&MANAGED_ADMIN_USER.to_string()));
        let stored = fixture
            .secrets
            .get_secret(&SecretRef {
                name: "acct-1-secret".to_string(),
                namespace: "shepherd".to_string(),
            })
            .await
            .unwrap();
        assert!(stored.access_key_id.starts_with("AKIAMOCK"));
    }

    #[tokio::test]
    async fn byoc_begin_claims_and_moves_to_creating() {
        let fixture = Fixture::new();
        let mut account = Account::new("byoc-1", "shepherd");
        account.spec.byoc = true;
        account.spec.claim_link = "claim".to_string();
        account.spec.claim_link_namespace = "tenant".to_string();
        let operator = fixture.mock().clone();

        ByocFlow
            .begin(&fixture.deps(), &operator, &mut account)
            .await
            .unwrap();

        assert!(account.status.claimed);
        assert_eq!(account.status.state, AccountState::Creating);
    }

    #[tokio::test]
    async fn customer_admin_role_is_replaced_not_reused() {
        let fixture = Fixture::new();
        let api = fixture.mock().clone();

        // Pre-existing stale role
        api.create_role(CUSTOMER_ADMIN_ROLE, "{}", "stale").await.unwrap();
        api.attach_role_policy(CUSTOMER_ADMIN_ROLE, ADMIN_POLICY_ARN)
            .await
            .unwrap();
        api.set_next_role_id("AROAFRESH");

        let role_id = ensure_customer_admin_role(&api, &fixture.config)
            .await
            .unwrap();

        assert_eq!(role_id, "AROAFRESH");
        assert_eq!(api.count("delete_role"), 1);
        assert_eq!(api.count("detach_role_policy"), 1);
        assert_eq!(api.count("create_role"), 2);
    }
}
