//! AWS SDK implementation of the provider boundary
//!
//! `SdkApi` holds one client per service, all built from a shared
//! [`AwsContext`], and maps every SDK error through the typed classifier.

use crate::aws::api::{
    AccessKey, AccountCreation, AssumedCredentials, AttachedPolicy, AwsApi, AwsResult,
    ClientBuilder, CreationState, HostedZone, InstanceRunState, ObjectPage, QuotaRequest,
    RecordSet, RegionOptStatus, RoleInfo,
};
use crate::aws::context::AwsContext;
use crate::aws::error::{classify_sdk_error, AwsError};
use crate::secrets::{SecretStore, SecretError};
use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use shepherd_common::SecretRef;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Build-error helper for SDK type builders with required fields.
fn build_err(err: impl std::fmt::Display) -> AwsError {
    AwsError::Sdk {
        code: None,
        message: format!("failed building SDK input: {err}"),
    }
}

/// One credential scope's worth of service clients.
#[derive(Clone)]
pub struct SdkApi {
    sts: aws_sdk_sts::Client,
    organizations: aws_sdk_organizations::Client,
    iam: aws_sdk_iam::Client,
    ec2: aws_sdk_ec2::Client,
    s3: aws_sdk_s3::Client,
    route53: aws_sdk_route53::Client,
    support: aws_sdk_support::Client,
    servicequotas: aws_sdk_servicequotas::Client,
    account: aws_sdk_account::Client,
}

impl SdkApi {
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            sts: ctx.sts_client(),
            organizations: ctx.organizations_client(),
            iam: ctx.iam_client(),
            ec2: ctx.ec2_client(),
            s3: ctx.s3_client(),
            route53: ctx.route53_client(),
            support: ctx.support_client(),
            servicequotas: ctx.servicequotas_client(),
            account: ctx.account_client(),
        }
    }
}

impl std::fmt::Debug for SdkApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkApi").finish_non_exhaustive()
    }
}

fn smithy_time_to_chrono(time: &aws_smithy_types::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}

impl AwsApi for SdkApi {
    async fn create_account(&self, name: &str, email: &str) -> AwsResult<String> {
        info!(account = %name, "requesting provider account creation");

        // Organizations rejects concurrent mutations and throttles hard;
        // both settle quickly, so retry them here instead of failing the
        // whole reconciliation
        let output = (|| async {
            self.organizations
                .create_account()
                .account_name(name)
                .email(email)
                .send()
                .await
                .map_err(|e| classify_sdk_error(&e))
        })
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(10))
                .with_max_times(5),
        )
        .when(AwsError::is_retryable)
        .notify(|err, delay| {
            warn!(delay = ?delay, error = %err, "account creation rejected, retrying");
        })
        .await?;

        output
            .create_account_status()
            .and_then(|s| s.id())
            .map(|id| id.to_string())
            .ok_or_else(|| AwsError::Sdk {
                code: None,
                message: "no creation request ID in response".to_string(),
            })
    }

    async fn describe_create_account_status(&self, request_id: &str) -> AwsResult<AccountCreation> {
        let output = self
            .organizations
            .describe_create_account_status()
            .create_account_request_id(request_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let status = output.create_account_status().ok_or_else(|| AwsError::Sdk {
            code: None,
            message: "no creation status in response".to_string(),
        })?;

        use aws_sdk_organizations::types::CreateAccountState as S;
        let state = match status.state() {
            Some(S::Succeeded) => CreationState::Succeeded,
            Some(S::Failed) => CreationState::Failed,
            _ => CreationState::InProgress,
        };

        Ok(AccountCreation {
            request_id: request_id.to_string(),
            state,
            account_id: status.account_id().map(|s| s.to_string()),
            failure_reason: status.failure_reason().map(|r| r.as_str().to_string()),
        })
    }

    async fn tag_account(&self, account_id: &str, key: &str, value: &str) -> AwsResult<()> {
        let tag = aws_sdk_organizations::types::Tag::builder()
            .key(key)
            .value(value)
            .build()
            .map_err(build_err)?;
        self.organizations
            .tag_resource()
            .resource_id(account_id)
            .tags(tag)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn assume_role(
        &self,
        role_arn: &str,
        external_id: Option<&str>,
        session_name: &str,
        duration_secs: i32,
    ) -> AwsResult<AssumedCredentials> {
        let mut request = self
            .sts
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .duration_seconds(duration_secs);
        if let Some(id) = external_id {
            request = request.external_id(id);
        }

        let output = request.send().await.map_err(|e| classify_sdk_error(&e))?;

        let creds = output.credentials().ok_or_else(|| AwsError::Sdk {
            code: None,
            message: "no credentials in assume-role response".to_string(),
        })?;
        let assumed_role_id = output
            .assumed_role_user()
            .map(|u| u.assumed_role_id().to_string())
            .unwrap_or_default();

        Ok(AssumedCredentials {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().to_string(),
            expiry: smithy_time_to_chrono(creds.expiration()),
            assumed_role_id,
        })
    }

    async fn get_caller_identity(&self) -> AwsResult<String> {
        let output = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        output
            .account()
            .map(|s| s.to_string())
            .ok_or_else(|| AwsError::Sdk {
                code: None,
                message: "no account in caller identity".to_string(),
            })
    }

    async fn create_role(
        &self,
        name: &str,
        trust_policy: &str,
        description: &str,
    ) -> AwsResult<String> {
        info!(role = %name, "creating IAM role");
        let output = self
            .iam
            .create_role()
            .role_name(name)
            .assume_role_policy_document(trust_policy)
            .description(description)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        output
            .role()
            .map(|r| r.role_id().to_string())
            .ok_or_else(|| AwsError::Sdk {
                code: None,
                message: "no role in create-role response".to_string(),
            })
    }

    async fn get_role(&self, name: &str) -> AwsResult<Option<RoleInfo>> {
        match self.iam.get_role().role_name(name).send().await {
            Ok(output) => Ok(output.role().map(|r| RoleInfo {
                name: r.role_name().to_string(),
                role_id: r.role_id().to_string(),
                arn: r.arn().to_string(),
            })),
            Err(e) => {
                let classified = classify_sdk_error(&e);
                if classified.is_not_found() {
                    Ok(None)
                } else {
                    Err(classified)
                }
            }
        }
    }

    async fn delete_role(&self, name: &str) -> AwsResult<()> {
        info!(role = %name, "deleting IAM role");
        self.iam
            .delete_role()
            .role_name(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn list_attached_role_policies(&self, role: &str) -> AwsResult<Vec<AttachedPolicy>> {
        let output = self
            .iam
            .list_attached_role_policies()
            .role_name(role)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(output
            .attached_policies()
            .iter()
            .map(|p| AttachedPolicy {
                name: p.policy_name().unwrap_or_default().to_string(),
                arn: p.policy_arn().unwrap_or_default().to_string(),
            })
            .collect())
    }

    async fn attach_role_policy(&self, role: &str, policy_arn: &str) -> AwsResult<()> {
        self.iam
            .attach_role_policy()
            .role_name(role)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn detach_role_policy(&self, role: &str, policy_arn: &str) -> AwsResult<()> {
        debug!(role = %role, policy = %policy_arn, "detaching role policy");
        self.iam
            .detach_role_policy()
            .role_name(role)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn put_role_policy(&self, role: &str, policy_name: &str, document: &str) -> AwsResult<()> {
        self.iam
            .put_role_policy()
            .role_name(role)
            .policy_name(policy_name)
            .policy_document(document)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn create_user(&self, name: &str) -> AwsResult<()> {
        info!(user = %name, "creating IAM user");
        self.iam
            .create_user()
            .user_name(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn delete_user(&self, name: &str) -> AwsResult<()> {
        info!(user = %name, "deleting IAM user");
        self.iam
            .delete_user()
            .user_name(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn list_users(&self) -> AwsResult<Vec<String>> {
        let output = self
            .iam
            .list_users()
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(output
            .users()
            .iter()
            .map(|u| u.user_name().to_string())
            .collect())
    }

    async fn tag_user(&self, name: &str, key: &str, value: &str) -> AwsResult<()> {
        let tag = aws_sdk_iam::types::Tag::builder()
            .key(key)
            .value(value)
            .build()
            .map_err(build_err)?;
        self.iam
            .tag_user()
            .user_name(name)
            .tags(tag)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn attach_user_policy(&self, user: &str, policy_arn: &str) -> AwsResult<()> {
        self.iam
            .attach_user_policy()
            .user_name(user)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn create_access_key(&self, user: &str) -> AwsResult<AccessKey> {
        let output = self
            .iam
            .create_access_key()
            .user_name(user)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        let key = output.access_key().ok_or_else(|| AwsError::Sdk {
            code: None,
            message: "no access key in response".to_string(),
        })?;
        Ok(AccessKey {
            access_key_id: key.access_key_id().to_string(),
            secret_access_key: key.secret_access_key().to_string(),
        })
    }

    async fn list_access_keys(&self, user: &str) -> AwsResult<Vec<String>> {
        let output = self
            .iam
            .list_access_keys()
            .user_name(user)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(output
            .access_key_metadata()
            .iter()
            .filter_map(|k| k.access_key_id().map(|s| s.to_string()))
            .collect())
    }

    async fn delete_access_key(&self, user: &str, key_id: &str) -> AwsResult<()> {
        self.iam
            .delete_access_key()
            .user_name(user)
            .access_key_id(key_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn find_image(&self, owner: &str) -> AwsResult<Option<String>> {
        let output = self
            .ec2
            .describe_images()
            .owners(owner)
            .filters(
                aws_sdk_ec2::types::Filter::builder()
                    .name("state")
                    .values("available")
                    .build(),
            )
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        // Latest image wins
        let mut images: Vec<_> = output.images().iter().collect();
        images.sort_by(|a, b| {
            b.creation_date()
                .unwrap_or_default()
                .cmp(a.creation_date().unwrap_or_default())
        });

        Ok(images
            .first()
            .and_then(|img| img.image_id())
            .map(|id| id.to_string()))
    }

    async fn run_instance(&self, ami: &str, instance_type: &str) -> AwsResult<String> {
        let instance_type_enum: aws_sdk_ec2::types::InstanceType =
            instance_type.parse().map_err(|_| AwsError::Sdk {
                code: None,
                message: format!("invalid instance type: {instance_type}"),
            })?;

        let output = self
            .ec2
            .run_instances()
            .image_id(ami)
            .instance_type(instance_type_enum)
            .min_count(1)
            .max_count(1)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        let instance_id = output
            .instances()
            .first()
            .and_then(|i| i.instance_id())
            .ok_or_else(|| AwsError::Sdk {
                code: None,
                message: "no instance returned".to_string(),
            })?;
        info!(instance_id = %instance_id, "instance launched");
        Ok(instance_id.to_string())
    }

    async fn describe_instance_state(&self, instance_id: &str) -> AwsResult<InstanceRunState> {
        let output = self
            .ec2
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        use aws_sdk_ec2::types::InstanceStateName as S;
        let state = output
            .reservations()
            .first()
            .and_then(|r| r.instances().first())
            .and_then(|i| i.state())
            .and_then(|s| s.name());

        Ok(match state {
            Some(S::Running) => InstanceRunState::Running,
            Some(S::ShuttingDown) => InstanceRunState::ShuttingDown,
            Some(S::Terminated) => InstanceRunState::Terminated,
            Some(S::Stopped) | Some(S::Stopping) => InstanceRunState::Stopped,
            _ => InstanceRunState::Pending,
        })
    }

    async fn terminate_instance(&self, instance_id: &str) -> AwsResult<()> {
        info!(instance_id = %instance_id, "terminating instance");
        self.ec2
            .terminate_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn list_volumes(&self) -> AwsResult<Vec<String>> {
        let output = self
            .ec2
            .describe_volumes()
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(output
            .volumes()
            .iter()
            .filter_map(|v| v.volume_id().map(|s| s.to_string()))
            .collect())
    }

    async fn delete_volume(&self, volume_id: &str) -> AwsResult<()> {
        debug!(volume_id = %volume_id, "deleting volume");
        self.ec2
            .delete_volume()
            .volume_id(volume_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn list_snapshots(&self, owner: &str) -> AwsResult<Vec<String>> {
        let output = self
            .ec2
            .describe_snapshots()
            .owner_ids(owner)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(output
            .snapshots()
            .iter()
            .filter_map(|s| s.snapshot_id().map(|id| id.to_string()))
            .collect())
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> AwsResult<()> {
        debug!(snapshot_id = %snapshot_id, "deleting snapshot");
        self.ec2
            .delete_snapshot()
            .snapshot_id(snapshot_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn list_endpoint_service_configurations(&self) -> AwsResult<Vec<String>> {
        let output = self
            .ec2
            .describe_vpc_endpoint_service_configurations()
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(output
            .service_configurations()
            .iter()
            .filter_map(|c| c.service_id().map(|s| s.to_string()))
            .collect())
    }

    async fn delete_endpoint_service_configurations(&self, service_ids: &[String]) -> AwsResult<()> {
        if service_ids.is_empty() {
            return Ok(());
        }
        self.ec2
            .delete_vpc_endpoint_service_configurations()
            .set_service_ids(Some(service_ids.to_vec()))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn list_buckets(&self) -> AwsResult<Vec<String>> {
        let output = self
            .s3
            .list_buckets()
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(|s| s.to_string()))
            .collect())
    }

    async fn list_objects(&self, bucket: &str, continuation: Option<&str>) -> AwsResult<ObjectPage> {
        let mut request = self.s3.list_objects_v2().bucket(bucket);
        if let Some(token) = continuation {
            request = request.continuation_token(token);
        }
        let output = request.send().await.map_err(|e| classify_sdk_error(&e))?;

        let keys = output
            .contents()
            .iter()
            .filter_map(|o| o.key().map(|k| k.to_string()))
            .collect();
        let next_token = if output.is_truncated() == Some(true) {
            output.next_continuation_token().map(|s| s.to_string())
        } else {
            None
        };
        Ok(ObjectPage { keys, next_token })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> AwsResult<()> {
        debug!(bucket = %bucket, key = %key, "deleting object");
        self.s3
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> AwsResult<()> {
        info!(bucket = %bucket, "deleting bucket");
        self.s3
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn list_hosted_zones(&self) -> AwsResult<Vec<HostedZone>> {
        let output = self
            .route53
            .list_hosted_zones()
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(output
            .hosted_zones()
            .iter()
            .map(|z| HostedZone {
                id: z.id().to_string(),
                name: z.name().to_string(),
            })
            .collect())
    }

    async fn list_record_sets(&self, zone_id: &str) -> AwsResult<Vec<RecordSet>> {
        let mut records = Vec::new();
        let mut start_name: Option<String> = None;
        let mut start_type: Option<aws_sdk_route53::types::RrType> = None;

        loop {
            let mut request = self
                .route53
                .list_resource_record_sets()
                .hosted_zone_id(zone_id);
            if let Some(name) = &start_name {
                request = request.start_record_name(name);
            }
            if let Some(rtype) = &start_type {
                request = request.start_record_type(rtype.clone());
            }

            let output = request.send().await.map_err(|e| classify_sdk_error(&e))?;

            records.extend(output.resource_record_sets().iter().map(|rs| RecordSet {
                name: rs.name().to_string(),
                record_type: rs.r#type().as_str().to_string(),
                ttl: rs.ttl(),
                values: rs
                    .resource_records()
                    .iter()
                    .map(|r| r.value().to_string())
                    .collect(),
            }));

            if output.is_truncated() {
                start_name = output.next_record_name().map(|s| s.to_string());
                start_type = output.next_record_type().cloned();
            } else {
                break;
            }
        }

        Ok(records)
    }

    async fn delete_record_set(&self, zone_id: &str, record: &RecordSet) -> AwsResult<()> {
        use aws_sdk_route53::types::{
            Change, ChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType,
        };

        debug!(zone = %zone_id, record = %record.name, rtype = %record.record_type, "deleting record set");

        let mut rs = ResourceRecordSet::builder()
            .name(&record.name)
            .r#type(RrType::from(record.record_type.as_str()));
        if let Some(ttl) = record.ttl {
            rs = rs.ttl(ttl);
        }
        for value in &record.values {
            rs = rs.resource_records(
                ResourceRecord::builder()
                    .value(value)
                    .build()
                    .map_err(build_err)?,
            );
        }

        let change = Change::builder()
            .action(ChangeAction::Delete)
            .resource_record_set(rs.build().map_err(build_err)?)
            .build()
            .map_err(build_err)?;
        let batch = ChangeBatch::builder()
            .changes(change)
            .build()
            .map_err(build_err)?;

        self.route53
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn delete_hosted_zone(&self, zone_id: &str) -> AwsResult<()> {
        info!(zone = %zone_id, "deleting hosted zone");
        self.route53
            .delete_hosted_zone()
            .id(zone_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn enable_region(&self, region: &str) -> AwsResult<()> {
        info!(region = %region, "enabling opt-in region");
        self.account
            .enable_region()
            .region_name(region)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(())
    }

    async fn get_region_opt_status(&self, region: &str) -> AwsResult<RegionOptStatus> {
        let output = self
            .account
            .get_region_opt_status()
            .region_name(region)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;

        use aws_sdk_account::types::RegionOptStatus as S;
        Ok(match output.region_opt_status() {
            Some(S::Enabled) => RegionOptStatus::Enabled,
            Some(S::EnabledByDefault) => RegionOptStatus::EnabledByDefault,
            Some(S::Enabling) => RegionOptStatus::Enabling,
            Some(S::Disabling) => RegionOptStatus::Disabling,
            _ => RegionOptStatus::Disabled,
        })
    }

    async fn get_service_quota(&self, service_code: &str, quota_code: &str) -> AwsResult<f64> {
        let output = self
            .servicequotas
            .get_service_quota()
            .service_code(service_code)
            .quota_code(quota_code)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        output
            .quota()
            .and_then(|q| q.value())
            .ok_or_else(|| AwsError::Sdk {
                code: None,
                message: "no quota value in response".to_string(),
            })
    }

    async fn request_quota_increase(
        &self,
        service_code: &str,
        quota_code: &str,
        desired: f64,
    ) -> AwsResult<String> {
        info!(service = %service_code, quota = %quota_code, desired, "requesting quota increase");
        let output = self
            .servicequotas
            .request_service_quota_increase()
            .service_code(service_code)
            .quota_code(quota_code)
            .desired_value(desired)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        output
            .requested_quota()
            .and_then(|q| q.id())
            .map(|id| id.to_string())
            .ok_or_else(|| AwsError::Sdk {
                code: None,
                message: "no request ID in quota response".to_string(),
            })
    }

    async fn list_quota_request_history(&self, service_code: &str) -> AwsResult<Vec<QuotaRequest>> {
        let output = self
            .servicequotas
            .list_requested_service_quota_change_history()
            .service_code(service_code)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(output
            .requested_quotas()
            .iter()
            .map(|q| QuotaRequest {
                id: q.id().unwrap_or_default().to_string(),
                quota_code: q.quota_code().unwrap_or_default().to_string(),
                status: q
                    .status()
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn create_support_case(&self, subject: &str, body: &str) -> AwsResult<String> {
        info!(subject = %subject, "opening support case");
        let output = self
            .support
            .create_case()
            .subject(subject)
            .communication_body(body)
            .issue_type("customer-service")
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        output
            .case_id()
            .map(|id| id.to_string())
            .ok_or_else(|| AwsError::Sdk {
                code: None,
                message: "no case ID in response".to_string(),
            })
    }

    async fn case_resolved(&self, case_id: &str) -> AwsResult<bool> {
        let output = self
            .support
            .describe_cases()
            .case_id_list(case_id)
            .include_resolved_cases(true)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e))?;
        Ok(output
            .cases()
            .first()
            .and_then(|c| c.status())
            .map(|s| s == "resolved")
            .unwrap_or(false))
    }
}

/// Builds `SdkApi` clients for the operator and for assumed-role scopes.
#[derive(Clone)]
pub struct SdkBuilder<S: SecretStore> {
    secrets: S,
    operator_secret: SecretRef,
}

impl<S: SecretStore> SdkBuilder<S> {
    pub fn new(secrets: S, operator_secret: SecretRef) -> Self {
        Self {
            secrets,
            operator_secret,
        }
    }
}

impl From<SecretError> for AwsError {
    fn from(err: SecretError) -> Self {
        AwsError::Sdk {
            code: None,
            message: err.to_string(),
        }
    }
}

impl<S: SecretStore + Clone + 'static> ClientBuilder for SdkBuilder<S> {
    type Api = SdkApi;

    async fn operator_api(&self, region: &str) -> AwsResult<SdkApi> {
        let secret = self.operator_secret.clone();
        self.from_secret(&secret, region).await
    }

    async fn from_credentials(
        &self,
        creds: &AssumedCredentials,
        region: &str,
    ) -> AwsResult<SdkApi> {
        let ctx = AwsContext::with_static_credentials(
            region,
            &creds.access_key_id,
            &creds.secret_access_key,
            Some(&creds.session_token),
        )
        .await;
        Ok(SdkApi::from_context(&ctx))
    }

    async fn from_secret(&self, secret: &SecretRef, region: &str) -> AwsResult<SdkApi> {
        let creds = self.secrets.get_secret(secret).await?;
        let ctx = AwsContext::with_static_credentials(
            region,
            &creds.access_key_id,
            &creds.secret_access_key,
            None,
        )
        .await;
        Ok(SdkApi::from_context(&ctx))
    }
}
