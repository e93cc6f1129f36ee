//! Default configuration values and provider-side concurrency ceilings
//!
//! The ceilings bound how hard we lean on AWS APIs that throttle or reject
//! concurrent mutation, not local concurrency.

/// Finalizer blocking deletion of Account objects until teardown completes
pub const ACCOUNT_FINALIZER: &str = "finalizer.shepherd.aws/account";

/// Finalizer blocking deletion of AccountClaim objects
pub const CLAIM_FINALIZER: &str = "finalizer.shepherd.aws/accountclaim";

/// Minutes an account may sit in Creating before it is failed with
/// CreationTimeout
pub const CREATE_PEND_MINUTES: i64 = 25;

/// Session duration for assumed roles, in seconds. Longer sessions need the
/// role's policy changed, so this is pinned.
pub const STS_SESSION_DURATION_SECS: i32 = 3600;

/// Attempts made against a freshly created role before giving up; covers IAM
/// propagation delay at 500 ms per attempt
pub const ASSUME_ROLE_MAX_ATTEMPTS: u32 = 100;

/// Fixed delay between assume-role attempts, in milliseconds
pub const ASSUME_ROLE_DELAY_MS: u64 = 500;

/// Attempts to observe the expected assumed-role ID after role replacement;
/// the sleep grows linearly with the attempt index
pub const ROLE_ID_MATCH_MAX_ATTEMPTS: u32 = 10;

/// Seconds between provider-side account-creation status polls
pub const CREATE_STATUS_POLL_SECS: u64 = 10;

/// Requeue delay after hitting OptInRequired during region initialization
pub const REGION_INIT_REQUEUE_SECS: u64 = 60;

/// Requeue delay when the account-creation budget is exhausted. The limit
/// rarely changes, so a long cooldown avoids hot-looping.
pub const BUDGET_COOLDOWN_SECS: u64 = 300;

/// Requeue delay while waiting on a support case
pub const SUPPORT_CASE_POLL_SECS: u64 = 300;

/// Maximum support/quota cases we keep open concurrently in AWS
pub const MAX_OPEN_QUOTA_REQUESTS: usize = 20;

/// Maximum regions AWS allows to be concurrently enabled per request batch
pub const MAX_OPT_IN_REGION_REQUESTS: usize = 6;

/// Maximum accounts allowed to enable all regions simultaneously
pub const MAX_ACCOUNT_REGION_ENABLEMENT: usize = 9;

/// Maximum reconciliations in flight across all entities
pub const MAX_CONCURRENT_RECONCILES: usize = 10;

/// Name used for the IAM admin user provisioned in managed accounts
pub const MANAGED_ADMIN_USER: &str = "shepherdManagedAdmin";

/// Session name for operator role assumption
pub const OPERATOR_SESSION_NAME: &str = "accountShepherd";

/// Default role created in child accounts, assumable by the payer account
pub const ORG_ACCESS_ROLE: &str = "OrganizationAccountAccessRole";
