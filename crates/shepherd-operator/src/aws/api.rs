//! The typed provider boundary
//!
//! [`AwsApi`] carries exactly the provider operations the engine depends on,
//! with domain-shaped inputs and outputs. [`super::sdk::SdkApi`] implements
//! it over the AWS SDK; [`crate::testing::MockAws`] implements it for tests.
//!
//! Methods return `impl Future + Send` rather than plain `async fn` so
//! generic callers can spawn reconciliations onto the runtime.

use crate::aws::error::AwsError;
use chrono::{DateTime, Utc};
use shepherd_common::SecretRef;
use std::fmt;
use std::future::Future;

pub type AwsResult<T> = Result<T, AwsError>;

/// State of a provider-side account creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationState {
    InProgress,
    Succeeded,
    Failed,
}

/// Snapshot of an account-creation request.
#[derive(Debug, Clone)]
pub struct AccountCreation {
    pub request_id: String,
    pub state: CreationState,
    /// Set once the creation succeeded
    pub account_id: Option<String>,
    /// Provider failure reason code when state is Failed
    pub failure_reason: Option<String>,
}

/// Temporary credentials returned by assume-role. Owned exclusively by the
/// call that produced them; never cached across reconciliations.
#[derive(Clone)]
pub struct AssumedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiry: Option<DateTime<Utc>>,
    /// `AROA...:session` identifier used for eventual-consistency checks
    pub assumed_role_id: String,
}

impl fmt::Debug for AssumedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssumedCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("assumed_role_id", &self.assumed_role_id)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

/// A freshly created IAM access key. The secret is only available here.
#[derive(Clone)]
pub struct AccessKey {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKey")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

/// An IAM role as seen through the boundary.
#[derive(Debug, Clone)]
pub struct RoleInfo {
    pub name: String,
    pub role_id: String,
    pub arn: String,
}

/// A managed policy attached to a role.
#[derive(Debug, Clone)]
pub struct AttachedPolicy {
    pub name: String,
    pub arn: String,
}

/// Opt-in status of a provider region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionOptStatus {
    Enabled,
    EnabledByDefault,
    Enabling,
    Disabled,
    Disabling,
}

impl RegionOptStatus {
    pub fn is_enabled(self) -> bool {
        matches!(self, RegionOptStatus::Enabled | RegionOptStatus::EnabledByDefault)
    }
}

/// Run state of a launched instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceRunState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopped,
}

/// One page of object keys from a bucket listing.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub keys: Vec<String>,
    pub next_token: Option<String>,
}

/// A DNS hosted zone.
#[derive(Debug, Clone)]
pub struct HostedZone {
    pub id: String,
    pub name: String,
}

/// A DNS record set within a zone.
#[derive(Debug, Clone)]
pub struct RecordSet {
    pub name: String,
    pub record_type: String,
    pub ttl: Option<i64>,
    pub values: Vec<String>,
}

impl RecordSet {
    /// NS and SOA records at the zone apex cannot be deleted; everything
    /// else must go before the zone itself.
    pub fn is_apex(&self, zone_name: &str) -> bool {
        self.name == zone_name && (self.record_type == "NS" || self.record_type == "SOA")
    }
}

/// A pending or resolved service-quota increase request.
#[derive(Debug, Clone)]
pub struct QuotaRequest {
    pub id: String,
    pub quota_code: String,
    pub status: String,
}

/// The provider operations the engine depends on. One implementation per
/// credential scope; region scoping happens at construction time.
pub trait AwsApi: Send + Sync {
    // ── Organizations ────────────────────────────────────────────────────
    /// Start creating a new account; returns the creation request ID.
    fn create_account(&self, name: &str, email: &str)
        -> impl Future<Output = AwsResult<String>> + Send;
    fn describe_create_account_status(
        &self,
        request_id: &str,
    ) -> impl Future<Output = AwsResult<AccountCreation>> + Send;
    fn tag_account(
        &self,
        account_id: &str,
        key: &str,
        value: &str,
    ) -> impl Future<Output = AwsResult<()>> + Send;

    // ── STS ──────────────────────────────────────────────────────────────
    fn assume_role(
        &self,
        role_arn: &str,
        external_id: Option<&str>,
        session_name: &str,
        duration_secs: i32,
    ) -> impl Future<Output = AwsResult<AssumedCredentials>> + Send;
    fn get_caller_identity(&self) -> impl Future<Output = AwsResult<String>> + Send;

    // ── IAM roles ────────────────────────────────────────────────────────
    fn create_role(
        &self,
        name: &str,
        trust_policy: &str,
        description: &str,
    ) -> impl Future<Output = AwsResult<String>> + Send;
    fn get_role(&self, name: &str) -> impl Future<Output = AwsResult<Option<RoleInfo>>> + Send;
    fn delete_role(&self, name: &str) -> impl Future<Output = AwsResult<()>> + Send;
    fn list_attached_role_policies(
        &self,
        role: &str,
    ) -> impl Future<Output = AwsResult<Vec<AttachedPolicy>>> + Send;
    fn attach_role_policy(
        &self,
        role: &str,
        policy_arn: &str,
    ) -> impl Future<Output = AwsResult<()>> + Send;
    fn detach_role_policy(
        &self,
        role: &str,
        policy_arn: &str,
    ) -> impl Future<Output = AwsResult<()>> + Send;
    fn put_role_policy(
        &self,
        role: &str,
        policy_name: &str,
        document: &str,
    ) -> impl Future<Output = AwsResult<()>> + Send;

    // ── IAM users and access keys ────────────────────────────────────────
    fn create_user(&self, name: &str) -> impl Future<Output = AwsResult<()>> + Send;
    fn delete_user(&self, name: &str) -> impl Future<Output = AwsResult<()>> + Send;
    fn list_users(&self) -> impl Future<Output = AwsResult<Vec<String>>> + Send;
    fn tag_user(
        &self,
        name: &str,
        key: &str,
        value: &str,
    ) -> impl Future<Output = AwsResult<()>> + Send;
    fn attach_user_policy(
        &self,
        user: &str,
        policy_arn: &str,
    ) -> impl Future<Output = AwsResult<()>> + Send;
    fn create_access_key(&self, user: &str) -> impl Future<Output = AwsResult<AccessKey>> + Send;
    fn list_access_keys(&self, user: &str) -> impl Future<Output = AwsResult<Vec<String>>> + Send;
    fn delete_access_key(
        &self,
        user: &str,
        key_id: &str,
    ) -> impl Future<Output = AwsResult<()>> + Send;

    // ── EC2 ──────────────────────────────────────────────────────────────
    /// Latest available AMI owned by the given account, if any.
    fn find_image(&self, owner: &str) -> impl Future<Output = AwsResult<Option<String>>> + Send;
    fn run_instance(
        &self,
        ami: &str,
        instance_type: &str,
    ) -> impl Future<Output = AwsResult<String>> + Send;
    fn describe_instance_state(
        &self,
        instance_id: &str,
    ) -> impl Future<Output = AwsResult<InstanceRunState>> + Send;
    fn terminate_instance(&self, instance_id: &str) -> impl Future<Output = AwsResult<()>> + Send;
    fn list_volumes(&self) -> impl Future<Output = AwsResult<Vec<String>>> + Send;
    fn delete_volume(&self, volume_id: &str) -> impl Future<Output = AwsResult<()>> + Send;
    fn list_snapshots(&self, owner: &str) -> impl Future<Output = AwsResult<Vec<String>>> + Send;
    fn delete_snapshot(&self, snapshot_id: &str) -> impl Future<Output = AwsResult<()>> + Send;
    fn list_endpoint_service_configurations(
        &self,
    ) -> impl Future<Output = AwsResult<Vec<String>>> + Send;
    fn delete_endpoint_service_configurations(
        &self,
        service_ids: &[String],
    ) -> impl Future<Output = AwsResult<()>> + Send;

    // ── S3 ───────────────────────────────────────────────────────────────
    fn list_buckets(&self) -> impl Future<Output = AwsResult<Vec<String>>> + Send;
    fn list_objects(
        &self,
        bucket: &str,
        continuation: Option<&str>,
    ) -> impl Future<Output = AwsResult<ObjectPage>> + Send;
    fn delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> impl Future<Output = AwsResult<()>> + Send;
    fn delete_bucket(&self, bucket: &str) -> impl Future<Output = AwsResult<()>> + Send;

    // ── Route53 ──────────────────────────────────────────────────────────
    fn list_hosted_zones(&self) -> impl Future<Output = AwsResult<Vec<HostedZone>>> + Send;
    fn list_record_sets(
        &self,
        zone_id: &str,
    ) -> impl Future<Output = AwsResult<Vec<RecordSet>>> + Send;
    fn delete_record_set(
        &self,
        zone_id: &str,
        record: &RecordSet,
    ) -> impl Future<Output = AwsResult<()>> + Send;
    fn delete_hosted_zone(&self, zone_id: &str) -> impl Future<Output = AwsResult<()>> + Send;

    // ── Account management (opt-in regions) ──────────────────────────────
    fn enable_region(&self, region: &str) -> impl Future<Output = AwsResult<()>> + Send;
    fn get_region_opt_status(
        &self,
        region: &str,
    ) -> impl Future<Output = AwsResult<RegionOptStatus>> + Send;

    // ── Service quotas ───────────────────────────────────────────────────
    fn get_service_quota(
        &self,
        service_code: &str,
        quota_code: &str,
    ) -> impl Future<Output = AwsResult<f64>> + Send;
    fn request_quota_increase(
        &self,
        service_code: &str,
        quota_code: &str,
        desired: f64,
    ) -> impl Future<Output = AwsResult<String>> + Send;
    fn list_quota_request_history(
        &self,
        service_code: &str,
    ) -> impl Future<Output = AwsResult<Vec<QuotaRequest>>> + Send;

    // ── Support ──────────────────────────────────────────────────────────
    fn create_support_case(
        &self,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = AwsResult<String>> + Send;
    fn case_resolved(&self, case_id: &str) -> impl Future<Output = AwsResult<bool>> + Send;
}

/// Builds credential-scoped [`AwsApi`] clients. The operator client comes
/// from the operator secret; assumed-role clients from chained credentials.
pub trait ClientBuilder: Send + Sync {
    type Api: AwsApi + Clone + Send + Sync + 'static;

    /// Client authenticated as the operator, in the given region.
    fn operator_api(&self, region: &str) -> impl Future<Output = AwsResult<Self::Api>> + Send;

    /// Client from temporary assumed-role credentials.
    fn from_credentials(
        &self,
        creds: &AssumedCredentials,
        region: &str,
    ) -> impl Future<Output = AwsResult<Self::Api>> + Send;

    /// Client from a stored credential secret (operator or customer).
    fn from_secret(
        &self,
        secret: &SecretRef,
        region: &str,
    ) -> impl Future<Output = AwsResult<Self::Api>> + Send;
}

/// Render a role ARN for a role in a specific account.
pub fn role_arn(account_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{account_id}:role/{role_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_arn_format() {
        assert_eq!(
            role_arn("123456789012", "OrganizationAccountAccessRole"),
            "arn:aws:iam::123456789012:role/OrganizationAccountAccessRole"
        );
    }

    #[test]
    fn apex_detection() {
        let ns = RecordSet {
            name: "example.com.".to_string(),
            record_type: "NS".to_string(),
            ttl: None,
            values: vec![],
        };
        let a = RecordSet {
            name: "www.example.com.".to_string(),
            record_type: "A".to_string(),
            ttl: Some(300),
            values: vec!["10.0.0.1".to_string()],
        };
        assert!(ns.is_apex("example.com."));
        assert!(!a.is_apex("example.com."));
    }

    #[test]
    fn credentials_debug_redacts_secret() {
        let creds = AssumedCredentials {
            access_key_id: "AKIA123".to_string(),
            secret_access_key: "super-secret".to_string(),
            session_token: "token".to_string(),
            expiry: None,
            assumed_role_id: "AROA123:session".to_string(),
        };
        let debug = format!("{creds:?}");
        assert!(debug.contains("AKIA123"));
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("token"));
    }

    #[test]
    fn region_opt_status_enabled() {
        assert!(RegionOptStatus::Enabled.is_enabled());
        assert!(RegionOptStatus::EnabledByDefault.is_enabled());
        assert!(!RegionOptStatus::Enabling.is_enabled());
    }
}
