//! Test doubles shared by unit and integration tests
//!
//! `MockAws` is a scriptable implementation of the provider boundary: every
//! call is recorded, list results come from in-memory fixtures, destructive
//! calls mutate them (so a second teardown run sees a clean account), and
//! individual operations can be made to fail.

use crate::aws::api::{
    AccessKey, AccountCreation, AssumedCredentials, AttachedPolicy, AwsApi, AwsResult,
    ClientBuilder, CreationState, HostedZone, InstanceRunState, ObjectPage, QuotaRequest,
    RecordSet, RegionOptStatus, RoleInfo,
};
use crate::aws::error::AwsError;
use crate::retry::Sleep;
use crate::store::{ControlPlane, StoreError, StoreResult};
use shepherd_common::{Account, AccountClaim, AccountPool, Key, SecretRef};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Sleeper that returns immediately; retries run at full speed in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSleep;

impl Sleep for NoopSleep {
    async fn sleep(&self, _duration: std::time::Duration) {}
}

#[derive(Default)]
struct MockState {
    calls: Vec<String>,
    destructive: Vec<String>,
    failures: HashMap<String, AwsError>,

    assume_role_failures_left: u32,
    assumed_role_ids: VecDeque<String>,

    creation_results: VecDeque<AccountCreation>,
    created_account_id: String,

    buckets: HashMap<String, Vec<String>>,
    zones: Vec<(HostedZone, Vec<RecordSet>)>,
    volumes: Vec<String>,
    snapshots: Vec<String>,
    endpoint_services: Vec<String>,

    roles: HashMap<String, RoleInfo>,
    role_policies: HashMap<String, Vec<AttachedPolicy>>,
    next_role_id: String,
    users: Vec<String>,
    access_keys: HashMap<String, Vec<String>>,

    instances: HashMap<String, InstanceRunState>,
    instance_counter: u32,

    region_status: HashMap<String, VecDeque<RegionOptStatus>>,

    quota_values: HashMap<(String, String), f64>,
    quota_requests: Vec<QuotaRequest>,

    case_counter: u32,
    unresolved_cases: Vec<String>,
}

/// Scriptable provider boundary for tests.
#[derive(Clone, Default)]
pub struct MockAws {
    state: Arc<Mutex<MockState>>,
}

impl std::fmt::Debug for MockAws {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAws").finish_non_exhaustive()
    }
}

impl MockAws {
    pub fn new() -> Self {
        let mock = Self::default();
        mock.state.lock().unwrap().created_account_id = "100000000001".to_string();
        mock
    }

    fn record(&self, call: impl Into<String>) {
        self.state.lock().unwrap().calls.push(call.into());
    }

    fn record_destructive(&self, call: impl Into<String>) {
        let call = call.into();
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.clone());
        state.destructive.push(call);
    }

    fn check_failure(&self, op: &str) -> AwsResult<()> {
        match self.state.lock().unwrap().failures.get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    // ── Scripting hooks ──────────────────────────────────────────────────

    /// Make `op` fail with `err` on every call until cleared.
    pub fn fail_operation(&self, op: &str, err: AwsError) {
        self.state.lock().unwrap().failures.insert(op.to_string(), err);
    }

    pub fn clear_failure(&self, op: &str) {
        self.state.lock().unwrap().failures.remove(op);
    }

    /// Fail the next `n` assume-role calls with throttling.
    pub fn fail_assume_role_times(&self, n: u32) {
        self.state.lock().unwrap().assume_role_failures_left = n;
    }

    /// Successive assume-role calls return these assumed-role IDs; the last
    /// repeats once the queue drains.
    pub fn set_assumed_role_ids(&self, ids: Vec<String>) {
        self.state.lock().unwrap().assumed_role_ids = ids.into();
    }

    /// Queue creation-status answers for describe calls.
    pub fn push_creation_status(&self, status: AccountCreation) {
        self.state.lock().unwrap().creation_results.push_back(status);
    }

    pub fn set_created_account_id(&self, id: &str) {
        self.state.lock().unwrap().created_account_id = id.to_string();
    }

    pub fn add_bucket(&self, name: &str, keys: &[&str]) {
        self.state.lock().unwrap().buckets.insert(
            name.to_string(),
            keys.iter().map(|k| k.to_string()).collect(),
        );
    }

    pub fn add_hosted_zone(&self, zone: HostedZone, records: Vec<RecordSet>) {
        self.state.lock().unwrap().zones.push((zone, records));
    }

    pub fn add_volume(&self, id: &str) {
        self.state.lock().unwrap().volumes.push(id.to_string());
    }

    pub fn add_snapshot(&self, id: &str) {
        self.state.lock().unwrap().snapshots.push(id.to_string());
    }

    pub fn add_endpoint_service(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .endpoint_services
            .push(id.to_string());
    }

    pub fn set_next_role_id(&self, role_id: &str) {
        self.state.lock().unwrap().next_role_id = role_id.to_string();
    }

    /// Queue opt-in status answers for a region; the last repeats.
    pub fn set_region_status(&self, region: &str, statuses: Vec<RegionOptStatus>) {
        self.state
            .lock()
            .unwrap()
            .region_status
            .insert(region.to_string(), statuses.into());
    }

    /// Override a service quota value; unset quotas report a satisfied
    /// default.
    pub fn set_service_quota(&self, service_code: &str, quota_code: &str, value: f64) {
        self.state
            .lock()
            .unwrap()
            .quota_values
            .insert((service_code.to_string(), quota_code.to_string()), value);
    }

    /// Keep a support case unresolved until `resolve_case` is called.
    pub fn hold_case_open(&self, case_id: &str) {
        self.state
            .lock()
            .unwrap()
            .unresolved_cases
            .push(case_id.to_string());
    }

    pub fn resolve_case(&self, case_id: &str) {
        self.state
            .lock()
            .unwrap()
            .unresolved_cases
            .retain(|c| c != case_id);
    }

    // ── Observation hooks ────────────────────────────────────────────────

    /// Number of calls whose name starts with `op`.
    pub fn count(&self, op: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.starts_with(op))
            .count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn destructive_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().destructive.clone()
    }

    pub fn users(&self) -> Vec<String> {
        self.state.lock().unwrap().users.clone()
    }
}

fn mock_credentials(assumed_role_id: String) -> AssumedCredentials {
    AssumedCredentials {
        access_key_id: "ASIAMOCK".to_string(),
        secret_access_key: "mock-secret".to_string(),
        session_token: "mock-token".to_string(),
        expiry: None,
        assumed_role_id,
    }
}

impl AwsApi for MockAws {
    async fn create_account(&self, name: &str, _email: &str) -> AwsResult<String> {
        self.record(format!("create_account:{name}"));
        self.check_failure("create_account")?;
        Ok("car-mock-1".to_string())
    }

    async fn describe_create_account_status(&self, request_id: &str) -> AwsResult<AccountCreation> {
        self.record(format!("describe_create_account_status:{request_id}"));
        self.check_failure("describe_create_account_status")?;
        let mut state = self.state.lock().unwrap();
        if let Some(status) = state.creation_results.pop_front() {
            return Ok(status);
        }
        Ok(AccountCreation {
            request_id: request_id.to_string(),
            state: CreationState::Succeeded,
            account_id: Some(state.created_account_id.clone()),
            failure_reason: None,
        })
    }

    async fn tag_account(&self, account_id: &str, key: &str, value: &str) -> AwsResult<()> {
        self.record(format!("tag_account:{account_id}/{key}={value}"));
        self.check_failure("tag_account")
    }

    async fn assume_role(
        &self,
        role_arn: &str,
        _external_id: Option<&str>,
        _session_name: &str,
        _duration_secs: i32,
    ) -> AwsResult<AssumedCredentials> {
        self.record(format!("assume_role:{role_arn}"));
        self.check_failure("assume_role")?;
        let mut state = self.state.lock().unwrap();
        if state.assume_role_failures_left > 0 {
            state.assume_role_failures_left -= 1;
            return Err(AwsError::Throttled);
        }
        let role_id = if state.assumed_role_ids.len() > 1 {
            state.assumed_role_ids.pop_front().unwrap()
        } else if let Some(front) = state.assumed_role_ids.front() {
            front.clone()
        } else {
            "AROAMOCK:session".to_string()
        };
        Ok(mock_credentials(role_id))
    }

    async fn get_caller_identity(&self) -> AwsResult<String> {
        self.record("get_caller_identity");
        self.check_failure("get_caller_identity")?;
        Ok("999999999999".to_string())
    }

    async fn create_role(
        &self,
        name: &str,
        _trust_policy: &str,
        _description: &str,
    ) -> AwsResult<String> {
        self.record(format!("create_role:{name}"));
        self.check_failure("create_role")?;
        let mut state = self.state.lock().unwrap();
        let role_id = if state.next_role_id.is_empty() {
            format!("AROAMOCK{}", state.roles.len())
        } else {
            state.next_role_id.clone()
        };
        state.roles.insert(
            name.to_string(),
            RoleInfo {
                name: name.to_string(),
                role_id: role_id.clone(),
                arn: format!("arn:aws:iam::100000000001:role/{name}"),
            },
        );
        Ok(role_id)
    }

    async fn get_role(&self, name: &str) -> AwsResult<Option<RoleInfo>> {
        self.record(format!("get_role:{name}"));
        self.check_failure("get_role")?;
        Ok(self.state.lock().unwrap().roles.get(name).cloned())
    }

    async fn delete_role(&self, name: &str) -> AwsResult<()> {
        self.record_destructive(format!("delete_role:{name}"));
        self.check_failure("delete_role")?;
        self.state.lock().unwrap().roles.remove(name);
        Ok(())
    }

    async fn list_attached_role_policies(&self, role: &str) -> AwsResult<Vec<AttachedPolicy>> {
        self.record(format!("list_attached_role_policies:{role}"));
        self.check_failure("list_attached_role_policies")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .role_policies
            .get(role)
            .cloned()
            .unwrap_or_default())
    }

    async fn attach_role_policy(&self, role: &str, policy_arn: &str) -> AwsResult<()> {
        self.record(format!("attach_role_policy:{role}/{policy_arn}"));
        self.check_failure("attach_role_policy")?;
        self.state
            .lock()
            .unwrap()
            .role_policies
            .entry(role.to_string())
            .or_default()
            .push(AttachedPolicy {
                name: policy_arn.rsplit('/').next().unwrap_or_default().to_string(),
                arn: policy_arn.to_string(),
            });
        Ok(())
    }

    async fn detach_role_policy(&self, role: &str, policy_arn: &str) -> AwsResult<()> {
        self.record_destructive(format!("detach_role_policy:{role}/{policy_arn}"));
        self.check_failure("detach_role_policy")?;
        if let Some(policies) = self.state.lock().unwrap().role_policies.get_mut(role) {
            policies.retain(|p| p.arn != policy_arn);
        }
        Ok(())
    }

    async fn put_role_policy(&self, role: &str, policy_name: &str, _document: &str) -> AwsResult<()> {
        self.record(format!("put_role_policy:{role}/{policy_name}"));
        self.check_failure("put_role_policy")
    }

    async fn create_user(&self, name: &str) -> AwsResult<()> {
        self.record(format!("create_user:{name}"));
        self.check_failure("create_user")?;
        self.state.lock().unwrap().users.push(name.to_string());
        Ok(())
    }

    async fn delete_user(&self, name: &str) -> AwsResult<()> {
        self.record_destructive(format!("delete_user:{name}"));
        self.check_failure("delete_user")?;
        self.state.lock().unwrap().users.retain(|u| u != name);
        Ok(())
    }

    async fn list_users(&self) -> AwsResult<Vec<String>> {
        self.record("list_users");
        self.check_failure("list_users")?;
        Ok(self.state.lock().unwrap().users.clone())
    }

    async fn tag_user(&self, name: &str, key: &str, value: &str) -> AwsResult<()> {
        self.record(format!("tag_user:{name}/{key}={value}"));
        self.check_failure("tag_user")
    }

    async fn attach_user_policy(&self, user: &str, policy_arn: &str) -> AwsResult<()> {
        self.record(format!("attach_user_policy:{user}/{policy_arn}"));
        self.check_failure("attach_user_policy")
    }

    async fn create_access_key(&self, user: &str) -> AwsResult<AccessKey> {
        self.record(format!("create_access_key:{user}"));
        self.check_failure("create_access_key")?;
        let mut state = self.state.lock().unwrap();
        let keys = state.access_keys.entry(user.to_string()).or_default();
        let key_id = format!("AKIAMOCK{}", keys.len());
        keys.push(key_id.clone());
        Ok(AccessKey {
            access_key_id: key_id,
            secret_access_key: "mock-user-secret".to_string(),
        })
    }

    async fn list_access_keys(&self, user: &str) -> AwsResult<Vec<String>> {
        self.record(format!("list_access_keys:{user}"));
        self.check_failure("list_access_keys")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .access_keys
            .get(user)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_access_key(&self, user: &str, key_id: &str) -> AwsResult<()> {
        self.record_destructive(format!("delete_access_key:{user}/{key_id}"));
        self.check_failure("delete_access_key")?;
        if let Some(keys) = self.state.lock().unwrap().access_keys.get_mut(user) {
            keys.retain(|k| k != key_id);
        }
        Ok(())
    }

    async fn find_image(&self, owner: &str) -> AwsResult<Option<String>> {
        self.record(format!("find_image:{owner}"));
        self.check_failure("find_image")?;
        Ok(Some("ami-mock".to_string()))
    }

    async fn run_instance(&self, _ami: &str, _instance_type: &str) -> AwsResult<String> {
        self.record("run_instance");
        self.check_failure("run_instance")?;
        let mut state = self.state.lock().unwrap();
        state.instance_counter += 1;
        let id = format!("i-mock{}", state.instance_counter);
        state.instances.insert(id.clone(), InstanceRunState::Running);
        Ok(id)
    }

    async fn describe_instance_state(&self, instance_id: &str) -> AwsResult<InstanceRunState> {
        self.record(format!("describe_instance_state:{instance_id}"));
        self.check_failure("describe_instance_state")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .instances
            .get(instance_id)
            .copied()
            .unwrap_or(InstanceRunState::Terminated))
    }

    async fn terminate_instance(&self, instance_id: &str) -> AwsResult<()> {
        self.record_destructive(format!("terminate_instance:{instance_id}"));
        self.check_failure("terminate_instance")?;
        self.state
            .lock()
            .unwrap()
            .instances
            .insert(instance_id.to_string(), InstanceRunState::Terminated);
        Ok(())
    }

    async fn list_volumes(&self) -> AwsResult<Vec<String>> {
        self.record("list_volumes");
        self.check_failure("list_volumes")?;
        Ok(self.state.lock().unwrap().volumes.clone())
    }

    async fn delete_volume(&self, volume_id: &str) -> AwsResult<()> {
        self.record_destructive(format!("delete_volume:{volume_id}"));
        self.check_failure("delete_volume")?;
        self.state.lock().unwrap().volumes.retain(|v| v != volume_id);
        Ok(())
    }

    async fn list_snapshots(&self, owner: &str) -> AwsResult<Vec<String>> {
        self.record(format!("list_snapshots:{owner}"));
        self.check_failure("list_snapshots")?;
        Ok(self.state.lock().unwrap().snapshots.clone())
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> AwsResult<()> {
        self.record_destructive(format!("delete_snapshot:{snapshot_id}"));
        self.check_failure("delete_snapshot")?;
        self.state
            .lock()
            .unwrap()
            .snapshots
            .retain(|s| s != snapshot_id);
        Ok(())
    }

    async fn list_endpoint_service_configurations(&self) -> AwsResult<Vec<String>> {
        self.record("list_endpoint_service_configurations");
        self.check_failure("list_endpoint_service_configurations")?;
        Ok(self.state.lock().unwrap().endpoint_services.clone())
    }

    async fn delete_endpoint_service_configurations(&self, service_ids: &[String]) -> AwsResult<()> {
        self.record_destructive(format!(
            "delete_endpoint_service_configurations:{}",
            service_ids.join(",")
        ));
        self.check_failure("delete_endpoint_service_configurations")?;
        self.state
            .lock()
            .unwrap()
            .endpoint_services
            .retain(|s| !service_ids.contains(s));
        Ok(())
    }

    async fn list_buckets(&self) -> AwsResult<Vec<String>> {
        self.record("list_buckets");
        self.check_failure("list_buckets")?;
        let mut buckets: Vec<String> = self.state.lock().unwrap().buckets.keys().cloned().collect();
        buckets.sort();
        Ok(buckets)
    }

    async fn list_objects(&self, bucket: &str, _continuation: Option<&str>) -> AwsResult<ObjectPage> {
        self.record(format!("list_objects:{bucket}"));
        self.check_failure("list_objects")?;
        Ok(ObjectPage {
            keys: self
                .state
                .lock()
                .unwrap()
                .buckets
                .get(bucket)
                .cloned()
                .unwrap_or_default(),
            next_token: None,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> AwsResult<()> {
        self.record_destructive(format!("delete_object:{bucket}/{key}"));
        self.check_failure("delete_object")?;
        if let Some(keys) = self.state.lock().unwrap().buckets.get_mut(bucket) {
            keys.retain(|k| k != key);
        }
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> AwsResult<()> {
        self.record_destructive(format!("delete_bucket:{bucket}"));
        self.check_failure("delete_bucket")?;
        self.state.lock().unwrap().buckets.remove(bucket);
        Ok(())
    }

    async fn list_hosted_zones(&self) -> AwsResult<Vec<HostedZone>> {
        self.record("list_hosted_zones");
        self.check_failure("list_hosted_zones")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .zones
            .iter()
            .map(|(z, _)| z.clone())
            .collect())
    }

    async fn list_record_sets(&self, zone_id: &str) -> AwsResult<Vec<RecordSet>> {
        self.record(format!("list_record_sets:{zone_id}"));
        self.check_failure("list_record_sets")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .zones
            .iter()
            .find(|(z, _)| z.id == zone_id)
            .map(|(_, records)| records.clone())
            .unwrap_or_default())
    }

    async fn delete_record_set(&self, zone_id: &str, record: &RecordSet) -> AwsResult<()> {
        self.record_destructive(format!("delete_record_set:{zone_id}/{}", record.name));
        self.check_failure("delete_record_set")?;
        let mut state = self.state.lock().unwrap();
        if let Some((_, records)) = state.zones.iter_mut().find(|(z, _)| z.id == zone_id) {
            records.retain(|r| !(r.name == record.name && r.record_type == record.record_type));
        }
        Ok(())
    }

    async fn delete_hosted_zone(&self, zone_id: &str) -> AwsResult<()> {
        self.record_destructive(format!("delete_hosted_zone:{zone_id}"));
        self.check_failure("delete_hosted_zone")?;
        self.state.lock().unwrap().zones.retain(|(z, _)| z.id != zone_id);
        Ok(())
    }

    async fn enable_region(&self, region: &str) -> AwsResult<()> {
        self.record(format!("enable_region:{region}"));
        self.check_failure("enable_region")?;
        let mut state = self.state.lock().unwrap();
        state
            .region_status
            .entry(region.to_string())
            .or_insert_with(|| VecDeque::from(vec![RegionOptStatus::Enabled]));
        Ok(())
    }

    async fn get_region_opt_status(&self, region: &str) -> AwsResult<RegionOptStatus> {
        self.record(format!("get_region_opt_status:{region}"));
        self.check_failure("get_region_opt_status")?;
        let mut state = self.state.lock().unwrap();
        match state.region_status.get_mut(region) {
            Some(queue) if queue.len() > 1 => Ok(queue.pop_front().unwrap()),
            Some(queue) => Ok(queue.front().copied().unwrap_or(RegionOptStatus::Disabled)),
            None => Ok(RegionOptStatus::Disabled),
        }
    }

    async fn get_service_quota(&self, service_code: &str, quota_code: &str) -> AwsResult<f64> {
        self.record(format!("get_service_quota:{service_code}/{quota_code}"));
        self.check_failure("get_service_quota")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .quota_values
            .get(&(service_code.to_string(), quota_code.to_string()))
            .copied()
            .unwrap_or(256.0))
    }

    async fn request_quota_increase(
        &self,
        service_code: &str,
        quota_code: &str,
        _desired: f64,
    ) -> AwsResult<String> {
        self.record(format!("request_quota_increase:{service_code}/{quota_code}"));
        self.check_failure("request_quota_increase")?;
        let mut state = self.state.lock().unwrap();
        let id = format!("quota-req-mock-{}", state.quota_requests.len() + 1);
        state.quota_requests.push(QuotaRequest {
            id: id.clone(),
            quota_code: quota_code.to_string(),
            status: "PENDING".to_string(),
        });
        Ok(id)
    }

    async fn list_quota_request_history(&self, service_code: &str) -> AwsResult<Vec<QuotaRequest>> {
        self.record(format!("list_quota_request_history:{service_code}"));
        self.check_failure("list_quota_request_history")?;
        Ok(self.state.lock().unwrap().quota_requests.clone())
    }

    async fn create_support_case(&self, _subject: &str, _body: &str) -> AwsResult<String> {
        self.record("create_support_case");
        self.check_failure("create_support_case")?;
        let mut state = self.state.lock().unwrap();
        state.case_counter += 1;
        Ok(format!("case-mock-{}", state.case_counter))
    }

    async fn case_resolved(&self, case_id: &str) -> AwsResult<bool> {
        self.record(format!("case_resolved:{case_id}"));
        self.check_failure("case_resolved")?;
        Ok(!self
            .state
            .lock()
            .unwrap()
            .unresolved_cases
            .iter()
            .any(|c| c == case_id))
    }
}

/// Builder returning the shared mock for every credential scope.
#[derive(Clone, Default)]
pub struct MockBuilder {
    api: MockAws,
}

impl From<MockAws> for MockBuilder {
    fn from(api: MockAws) -> Self {
        Self { api }
    }
}

impl MockBuilder {
    pub fn api(&self) -> &MockAws {
        &self.api
    }
}

impl ClientBuilder for MockBuilder {
    type Api = MockAws;

    async fn operator_api(&self, _region: &str) -> AwsResult<MockAws> {
        Ok(self.api.clone())
    }

    async fn from_credentials(
        &self,
        _creds: &AssumedCredentials,
        _region: &str,
    ) -> AwsResult<MockAws> {
        Ok(self.api.clone())
    }

    async fn from_secret(&self, _secret: &SecretRef, _region: &str) -> AwsResult<MockAws> {
        Ok(self.api.clone())
    }
}

/// Control-plane wrapper that fails a configured number of account updates
/// with a conflict, for exercising stale-write retry paths.
#[derive(Clone)]
pub struct ConflictingStore<S> {
    inner: S,
    account_update_conflicts: Arc<AtomicU32>,
}

impl<S> ConflictingStore<S> {
    pub fn new(inner: S, conflicts: u32) -> Self {
        Self {
            inner,
            account_update_conflicts: Arc::new(AtomicU32::new(conflicts)),
        }
    }

    fn should_conflict(&self) -> bool {
        self.account_update_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl<S: ControlPlane> ControlPlane for ConflictingStore<S> {
    async fn get_account(&self, key: &Key) -> StoreResult<Account> {
        self.inner.get_account(key).await
    }

    async fn list_accounts(&self, namespace: &str) -> StoreResult<Vec<Account>> {
        self.inner.list_accounts(namespace).await
    }

    async fn create_account(&self, account: &Account) -> StoreResult<Account> {
        self.inner.create_account(account).await
    }

    async fn update_account(&self, account: &Account) -> StoreResult<Account> {
        if self.should_conflict() {
            return Err(StoreError::Conflict {
                kind: crate::store::EntityKind::Account,
                key: account.key(),
            });
        }
        self.inner.update_account(account).await
    }

    async fn update_account_status(&self, account: &Account) -> StoreResult<Account> {
        self.inner.update_account_status(account).await
    }

    async fn delete_account(&self, key: &Key) -> StoreResult<()> {
        self.inner.delete_account(key).await
    }

    async fn get_claim(&self, key: &Key) -> StoreResult<AccountClaim> {
        self.inner.get_claim(key).await
    }

    async fn list_claims(&self, namespace: &str) -> StoreResult<Vec<AccountClaim>> {
        self.inner.list_claims(namespace).await
    }

    async fn create_claim(&self, claim: &AccountClaim) -> StoreResult<AccountClaim> {
        self.inner.create_claim(claim).await
    }

    async fn update_claim(&self, claim: &AccountClaim) -> StoreResult<AccountClaim> {
        self.inner.update_claim(claim).await
    }

    async fn update_claim_status(&self, claim: &AccountClaim) -> StoreResult<AccountClaim> {
        self.inner.update_claim_status(claim).await
    }

    async fn delete_claim(&self, key: &Key) -> StoreResult<()> {
        self.inner.delete_claim(key).await
    }

    async fn get_pool(&self, key: &Key) -> StoreResult<AccountPool> {
        self.inner.get_pool(key).await
    }

    async fn list_pools(&self, namespace: &str) -> StoreResult<Vec<AccountPool>> {
        self.inner.list_pools(namespace).await
    }

    async fn create_pool(&self, pool: &AccountPool) -> StoreResult<AccountPool> {
        self.inner.create_pool(pool).await
    }

    async fn update_pool_status(&self, pool: &AccountPool) -> StoreResult<AccountPool> {
        self.inner.update_pool_status(pool).await
    }
}
