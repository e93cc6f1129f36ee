//! Resource teardown before an account returns to the pool
//!
//! Enumerates and deletes the leftovers a workload can strand in an
//! account: storage buckets and their contents, DNS hosted zones and their
//! record sets, compute volumes and snapshots, and endpoint-service
//! configurations. Each category is independent: a failure in one is
//! collected and does not stop the others, but the account is only released
//! once a run reports zero failures. Retried on the next reconciliation,
//! never looped internally.

use crate::aws::api::{AwsApi, AwsResult};
use crate::aws::error::ignore_not_found;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Independent teardown categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownCategory {
    Buckets,
    HostedZones,
    Volumes,
    Snapshots,
    EndpointServices,
}

impl TeardownCategory {
    pub const ALL: [TeardownCategory; 5] = [
        TeardownCategory::Buckets,
        TeardownCategory::HostedZones,
        TeardownCategory::Volumes,
        TeardownCategory::Snapshots,
        TeardownCategory::EndpointServices,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TeardownCategory::Buckets => "buckets",
            TeardownCategory::HostedZones => "hosted-zones",
            TeardownCategory::Volumes => "volumes",
            TeardownCategory::Snapshots => "snapshots",
            TeardownCategory::EndpointServices => "endpoint-services",
        }
    }
}

impl fmt::Display for TeardownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated result of one teardown run.
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Categories that failed, with the captured error message
    pub failures: Vec<(TeardownCategory, String)>,
    /// Destructive calls issued
    pub deleted: usize,
}

impl TeardownReport {
    /// True when every category completed without error. Only a clean run
    /// releases the account.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Teardown engine scoped to one account's client.
pub struct TeardownEngine<'a, A: AwsApi> {
    api: &'a A,
    /// Used to scope the snapshot listing to snapshots the account owns
    account_id: &'a str,
}

impl<'a, A: AwsApi> TeardownEngine<'a, A> {
    pub fn new(api: &'a A, account_id: &'a str) -> Self {
        Self { api, account_id }
    }

    /// Run every category, collecting failures instead of stopping early.
    pub async fn run(&self, cancel: &CancellationToken) -> TeardownReport {
        let mut report = TeardownReport::default();

        for category in TeardownCategory::ALL {
            if cancel.is_cancelled() {
                report
                    .failures
                    .push((category, "teardown cancelled".to_string()));
                continue;
            }

            let result = match category {
                TeardownCategory::Buckets => self.cleanup_buckets().await,
                TeardownCategory::HostedZones => self.cleanup_hosted_zones().await,
                TeardownCategory::Volumes => self.cleanup_volumes().await,
                TeardownCategory::Snapshots => self.cleanup_snapshots().await,
                TeardownCategory::EndpointServices => self.cleanup_endpoint_services().await,
            };

            match result {
                Ok(deleted) => {
                    if deleted > 0 {
                        info!(category = %category, deleted, "teardown category cleaned");
                    }
                    report.deleted += deleted;
                }
                Err(err) => {
                    warn!(category = %category, error = %err, "teardown category failed");
                    report.failures.push((category, err.to_string()));
                }
            }
        }

        report
    }

    /// Empty and delete every bucket. A bucket is ready to delete once the
    /// object listing comes back empty.
    async fn cleanup_buckets(&self) -> AwsResult<usize> {
        let mut deleted = 0;
        for bucket in self.api.list_buckets().await? {
            let mut token: Option<String> = None;
            loop {
                let page = self.api.list_objects(&bucket, token.as_deref()).await?;
                if page.keys.is_empty() && token.is_none() {
                    break;
                }
                for key in &page.keys {
                    ignore_not_found(self.api.delete_object(&bucket, key).await)?;
                    deleted += 1;
                }
                match page.next_token {
                    Some(next) => token = Some(next),
                    None => break,
                }
            }

            ignore_not_found(self.api.delete_bucket(&bucket).await)?;
            deleted += 1;
        }
        Ok(deleted)
    }

    /// Delete every hosted zone, removing its non-apex record sets first.
    async fn cleanup_hosted_zones(&self) -> AwsResult<usize> {
        let mut deleted = 0;
        for zone in self.api.list_hosted_zones().await? {
            for record in self.api.list_record_sets(&zone.id).await? {
                if record.is_apex(&zone.name) {
                    continue;
                }
                ignore_not_found(self.api.delete_record_set(&zone.id, &record).await)?;
                deleted += 1;
            }
            ignore_not_found(self.api.delete_hosted_zone(&zone.id).await)?;
            deleted += 1;
        }
        Ok(deleted)
    }

    async fn cleanup_volumes(&self) -> AwsResult<usize> {
        let mut deleted = 0;
        for volume_id in self.api.list_volumes().await? {
            ignore_not_found(self.api.delete_volume(&volume_id).await)?;
            deleted += 1;
        }
        Ok(deleted)
    }

    async fn cleanup_snapshots(&self) -> AwsResult<usize> {
        let mut deleted = 0;
        for snapshot_id in self.api.list_snapshots(self.account_id).await? {
            ignore_not_found(self.api.delete_snapshot(&snapshot_id).await)?;
            deleted += 1;
        }
        Ok(deleted)
    }

    async fn cleanup_endpoint_services(&self) -> AwsResult<usize> {
        let service_ids = self.api.list_endpoint_service_configurations().await?;
        if service_ids.is_empty() {
            return Ok(0);
        }
        let count = service_ids.len();
        ignore_not_found(
            self.api
                .delete_endpoint_service_configurations(&service_ids)
                .await,
        )?;
        Ok(count)
    }
}
