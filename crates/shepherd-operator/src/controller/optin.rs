//! Opt-in region enablement
//!
//! Some provider regions must be explicitly enabled per account. Enablement
//! is slow and the provider throttles concurrent requests, so two ceilings
//! apply: at most [`MAX_OPT_IN_REGION_REQUESTS`] enablements in flight per
//! account batch, and at most [`MAX_ACCOUNT_REGION_ENABLEMENT`] accounts
//! enabling regions fleet-wide. Each enablement is polled to completion
//! before it counts as closed.

use crate::aws::api::AwsApi;
use crate::controller::{ReconcileOutcome, ReconcileResult};
use crate::retry::Sleep;
use crate::store::ControlPlane;
use shepherd_common::conditions::{set_condition, ConditionReason};
use shepherd_common::defaults::{MAX_ACCOUNT_REGION_ENABLEMENT, MAX_OPT_IN_REGION_REQUESTS};
use shepherd_common::{Account, AccountState};
use std::time::Duration;
use tracing::{debug, info};

/// In-process poll attempts per reconcile before handing back a requeue
const ENABLEMENT_POLL_ATTEMPTS: u32 = 6;
const ENABLEMENT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const ENABLEMENT_REQUEUE_SECS: u64 = 60;

/// True when the fleet has room for another account to start enabling
/// regions. Counted across all accounts in the namespace.
pub async fn fleet_has_enablement_capacity<C: ControlPlane>(
    store: &C,
    namespace: &str,
) -> Result<bool, crate::controller::ControllerError> {
    let enabling = store
        .list_accounts(namespace)
        .await?
        .iter()
        .filter(|a| a.status.state == AccountState::OptingInRegions)
        .count();
    Ok(enabling < MAX_ACCOUNT_REGION_ENABLEMENT)
}

/// Advance an account in OptingInRegions. Mutates the account; the caller
/// persists it.
pub async fn handle_opt_in_regions<A: AwsApi, S: Sleep>(
    api: &A,
    sleeper: &S,
    account: &mut Account,
    opt_in_regions: &[String],
) -> ReconcileResult {
    let mut enabling = Vec::new();
    let mut pending = Vec::new();

    for region in opt_in_regions {
        match api.get_region_opt_status(region).await? {
            status if status.is_enabled() => {}
            crate::aws::api::RegionOptStatus::Enabling => enabling.push(region.clone()),
            _ => pending.push(region.clone()),
        }
    }

    if enabling.is_empty() && pending.is_empty() {
        info!(account = %account.meta.name, "all opt-in regions enabled");
        set_condition(
            &mut account.status.conditions,
            ConditionReason::OptInRegionsEnabled,
            "all configured opt-in regions enabled",
        );
        account
            .transition(AccountState::OptInRegionsEnabled)
            .map_err(crate::controller::ControllerError::Validation)?;
        return Ok(ReconcileOutcome::Requeue);
    }

    // Issue new enablement requests up to the per-batch ceiling.
    let slots = MAX_OPT_IN_REGION_REQUESTS.saturating_sub(enabling.len());
    for region in pending.iter().take(slots) {
        debug!(account = %account.meta.name, region = %region, "enabling opt-in region");
        api.enable_region(region).await?;
        enabling.push(region.clone());
    }

    set_condition(
        &mut account.status.conditions,
        ConditionReason::OptInRegionsInProgress,
        format!("{} region(s) enabling", enabling.len()),
    );

    // Poll the in-flight enablements briefly; anything still pending after
    // the bounded poll comes back on the next reconcile.
    for _ in 0..ENABLEMENT_POLL_ATTEMPTS {
        let mut still_enabling = Vec::new();
        for region in &enabling {
            if !api.get_region_opt_status(region).await?.is_enabled() {
                still_enabling.push(region.clone());
            }
        }
        if still_enabling.is_empty() {
            break;
        }
        enabling = still_enabling;
        sleeper.sleep(ENABLEMENT_POLL_INTERVAL).await;
    }

    Ok(ReconcileOutcome::requeue_secs(ENABLEMENT_REQUEUE_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::api::RegionOptStatus;
    use crate::store::MemoryStore;
    use crate::testing::{MockAws, NoopSleep};

    fn enabling_account(name: &str) -> Account {
        let mut account = Account::new(name, "shepherd");
        account.status.state = AccountState::OptingInRegions;
        account
    }

    fn region_names(regions: &[&str]) -> Vec<String> {
        regions.iter().map(|r| r.to_string()).collect()
    }

    #[tokio::test]
    async fn enables_and_completes() {
        let mock = MockAws::new();
        let mut account = enabling_account("a1");
        let regions = region_names(&["af-south-1", "me-south-1"]);

        // First pass enables both and polls them to Enabled (mock flips a
        // region to Enabled once enable_region has been called).
        let outcome = handle_opt_in_regions(&mock, &NoopSleep, &mut account, &regions)
            .await
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::RequeueAfter(_)));
        assert_eq!(mock.count("enable_region"), 2);

        // Next pass observes both enabled
        handle_opt_in_regions(&mock, &NoopSleep, &mut account, &regions)
            .await
            .unwrap();
        assert_eq!(account.status.state, AccountState::OptInRegionsEnabled);
    }

    #[tokio::test]
    async fn batch_ceiling_bounds_in_flight_requests() {
        let mock = MockAws::new();
        let regions: Vec<String> = (0..10).map(|i| format!("opt-in-{i}")).collect();
        // Keep every region stuck in Enabling so the poll cannot drain
        for region in &regions {
            mock.set_region_status(region, vec![RegionOptStatus::Disabled]);
        }

        let mut account = enabling_account("a1");
        // Regions never report enabled; the handler must give up after its
        // bounded poll and must not have asked for more than the ceiling.
        let outcome = handle_opt_in_regions(&mock, &NoopSleep, &mut account, &regions)
            .await
            .unwrap();
        assert!(matches!(outcome, ReconcileOutcome::RequeueAfter(_)));
        assert_eq!(mock.count("enable_region"), MAX_OPT_IN_REGION_REQUESTS);
    }

    #[tokio::test]
    async fn fleet_ceiling_counts_enabling_accounts() {
        let store = MemoryStore::new();
        for i in 0..MAX_ACCOUNT_REGION_ENABLEMENT {
            store
                .create_account(&enabling_account(&format!("enabling-{i}")))
                .await
                .unwrap();
        }
        assert!(!fleet_has_enablement_capacity(&store, "shepherd")
            .await
            .unwrap());

        let spare = MemoryStore::new();
        spare.create_account(&enabling_account("one")).await.unwrap();
        assert!(fleet_has_enablement_capacity(&spare, "shepherd")
            .await
            .unwrap());
    }
}
