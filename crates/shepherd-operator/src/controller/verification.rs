//! Account verification for managed accounts
//!
//! A freshly created account is not usable until the provider confirms it:
//! we open a support case and poll it to resolution, and make sure the
//! compute quota is high enough to run workloads. Open cases are bounded
//! fleet-wide so we never hold more concurrent cases than the provider
//! tolerates.

use crate::aws::api::{AwsApi, AwsResult};
use crate::controller::{ControllerError, ReconcileOutcome, ReconcileResult};
use crate::store::ControlPlane;
use shepherd_common::conditions::{set_condition, ConditionReason};
use shepherd_common::defaults::{MAX_OPEN_QUOTA_REQUESTS, SUPPORT_CASE_POLL_SECS};
use shepherd_common::{Account, AccountState};
use tracing::{debug, info};

const EC2_SERVICE_CODE: &str = "ec2";
/// Running on-demand standard instances (vCPU) quota
const VCPU_QUOTA_CODE: &str = "L-1216C47A";
/// Floor below which an increase is requested
const MIN_VCPU_QUOTA: f64 = 64.0;

/// Statuses of a quota request that is still moving
const OPEN_QUOTA_STATUSES: &[&str] = &["PENDING", "CASE_OPENED"];

/// Ensure the account's vCPU quota meets the floor, requesting an increase
/// when it does not. Returns true once the quota is settled.
async fn ensure_compute_quota<A: AwsApi>(api: &A, account_name: &str) -> AwsResult<bool> {
    let current = api
        .get_service_quota(EC2_SERVICE_CODE, VCPU_QUOTA_CODE)
        .await?;
    if current >= MIN_VCPU_QUOTA {
        return Ok(true);
    }

    let history = api.list_quota_request_history(EC2_SERVICE_CODE).await?;
    let already_pending = history.iter().any(|request| {
        request.quota_code == VCPU_QUOTA_CODE
            && OPEN_QUOTA_STATUSES.contains(&request.status.as_str())
    });
    if already_pending {
        debug!(account = %account_name, current, "quota increase still pending");
        return Ok(false);
    }

    let request_id = api
        .request_quota_increase(EC2_SERVICE_CODE, VCPU_QUOTA_CODE, MIN_VCPU_QUOTA)
        .await?;
    info!(
        account = %account_name,
        current,
        desired = MIN_VCPU_QUOTA,
        request_id = %request_id,
        "requested compute quota increase"
    );
    Ok(false)
}

/// Advance an account sitting in PendingVerification. Mutates the account;
/// the caller persists it.
pub async fn handle_pending_verification<C: ControlPlane, A: AwsApi>(
    store: &C,
    api: &A,
    account: &mut Account,
    opt_in_next: bool,
) -> ReconcileResult {
    if account.status.support_case_id.is_empty() {
        // Opening a case counts against the provider-side ceiling measured
        // across every account currently in verification.
        let open_cases = store
            .list_accounts(&account.meta.namespace)
            .await?
            .iter()
            .filter(|a| {
                a.status.state == AccountState::PendingVerification
                    && !a.status.support_case_id.is_empty()
            })
            .count();
        if open_cases >= MAX_OPEN_QUOTA_REQUESTS {
            debug!(
                account = %account.meta.name,
                open_cases,
                "support case ceiling reached, waiting"
            );
            return Ok(ReconcileOutcome::requeue_secs(SUPPORT_CASE_POLL_SECS));
        }

        let case_id = api
            .create_support_case(
                &format!("Account verification for {}", account.spec.aws_account_id),
                "Please verify this account is ready for service limits and support.",
            )
            .await?;
        info!(account = %account.meta.name, case_id = %case_id, "support case opened");
        account.status.support_case_id = case_id;
        set_condition(
            &mut account.status.conditions,
            ConditionReason::PendingVerification,
            "support case opened",
        );
        return Ok(ReconcileOutcome::requeue_secs(SUPPORT_CASE_POLL_SECS));
    }

    if !api.case_resolved(&account.status.support_case_id).await? {
        debug!(
            account = %account.meta.name,
            case_id = %account.status.support_case_id,
            "support case still open"
        );
        return Ok(ReconcileOutcome::requeue_secs(SUPPORT_CASE_POLL_SECS));
    }

    if !ensure_compute_quota(api, &account.meta.name).await? {
        set_condition(
            &mut account.status.conditions,
            ConditionReason::QuotaExceeded,
            "waiting for compute quota increase",
        );
        return Ok(ReconcileOutcome::requeue_secs(SUPPORT_CASE_POLL_SECS));
    }

    info!(account = %account.meta.name, "account verified");
    set_condition(
        &mut account.status.conditions,
        ConditionReason::VerificationComplete,
        "support case resolved",
    );
    let next = if opt_in_next {
        AccountState::OptingInRegions
    } else {
        AccountState::InitializingRegions
    };
    account.transition(next).map_err(ControllerError::Validation)?;
    Ok(ReconcileOutcome::Requeue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::MockAws;

    fn verifying_account(name: &str) -> Account {
        let mut account = Account::new(name, "shepherd");
        account.spec.aws_account_id = "100000000001".to_string();
        account.status.state = AccountState::PendingVerification;
        account
    }

    #[tokio::test]
    async fn opens_a_case_then_polls_to_resolution() {
        let store = MemoryStore::new();
        let mock = MockAws::new();
        let mut account = verifying_account("a1");

        // First pass opens the case
        let outcome = handle_pending_verification(&store, &mock, &mut account, false)
            .await
            .unwrap();
        assert_eq!(account.status.support_case_id, "case-mock-1");
        assert!(matches!(outcome, ReconcileOutcome::RequeueAfter(_)));

        // Case unresolved: stay in verification
        mock.hold_case_open("case-mock-1");
        let outcome = handle_pending_verification(&store, &mock, &mut account, false)
            .await
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::RequeueAfter(_)));
        assert_eq!(account.status.state, AccountState::PendingVerification);

        // Resolution moves the account toward region initialization
        mock.resolve_case("case-mock-1");
        handle_pending_verification(&store, &mock, &mut account, false)
            .await
            .unwrap();
        assert_eq!(account.status.state, AccountState::InitializingRegions);
    }

    #[tokio::test]
    async fn low_quota_requests_an_increase_once() {
        let store = MemoryStore::new();
        let mock = MockAws::new();
        mock.set_service_quota(EC2_SERVICE_CODE, VCPU_QUOTA_CODE, 5.0);

        let mut account = verifying_account("a1");
        account.status.support_case_id = "case-resolved".to_string();

        // Low quota: an increase is requested and the account waits
        let outcome = handle_pending_verification(&store, &mock, &mut account, false)
            .await
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::RequeueAfter(_)));
        assert_eq!(account.status.state, AccountState::PendingVerification);
        assert_eq!(mock.count("request_quota_increase"), 1);

        // While the request is pending no duplicate is filed
        handle_pending_verification(&store, &mock, &mut account, false)
            .await
            .unwrap();
        assert_eq!(mock.count("request_quota_increase"), 1);

        // Once the quota lands, verification completes
        mock.set_service_quota(EC2_SERVICE_CODE, VCPU_QUOTA_CODE, 256.0);
        handle_pending_verification(&store, &mock, &mut account, false)
            .await
            .unwrap();
        assert_eq!(account.status.state, AccountState::InitializingRegions);
    }

    #[tokio::test]
    async fn opt_in_feature_routes_to_region_enablement() {
        let store = MemoryStore::new();
        let mock = MockAws::new();
        let mut account = verifying_account("a1");
        account.status.support_case_id = "case-open".to_string();

        handle_pending_verification(&store, &mock, &mut account, true)
            .await
            .unwrap();
        assert_eq!(account.status.state, AccountState::OptingInRegions);
    }

    #[tokio::test]
    async fn case_ceiling_defers_new_cases() {
        let store = MemoryStore::new();
        let mock = MockAws::new();

        for i in 0..MAX_OPEN_QUOTA_REQUESTS {
            let mut other = verifying_account(&format!("other-{i}"));
            other.status.support_case_id = format!("case-{i}");
            store.create_account(&other).await.unwrap();
        }

        let mut account = verifying_account("blocked");
        let outcome = handle_pending_verification(&store, &mock, &mut account, false)
            .await
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::RequeueAfter(_)));
        assert!(account.status.support_case_id.is_empty());
        assert_eq!(mock.count("create_support_case"), 0);
    }
}
