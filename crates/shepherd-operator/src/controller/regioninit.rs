//! Region activation
//!
//! A fresh account's regions only become fully usable after compute has run
//! in them once. For every supported region we launch a minimal instance
//! with the account's credentials and terminate it again, concurrently
//! across regions. A region answering "opt-in required" is transient and
//! requeues the account instead of failing it.

use crate::aws::api::{AwsApi, ClientBuilder, InstanceRunState};
use crate::aws::error::AwsError;
use crate::aws::AssumedCredentials;
use crate::retry::Sleep;
use futures::future::join_all;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Poll attempts while waiting for an instance to reach running
const RUNNING_POLL_ATTEMPTS: u32 = 60;
/// Poll attempts while waiting for an instance to terminate
const TERMINATED_POLL_ATTEMPTS: u32 = 36;
const POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RegionInitError {
    /// At least one region needs opt-in; requeue, do not fail the account
    #[error("region {0} requires opt-in")]
    OptInRequired(String),

    #[error("region {region} initialization failed: {source}")]
    Aws {
        region: String,
        #[source]
        source: AwsError,
    },

    #[error("region initialization cancelled")]
    Cancelled,
}

impl RegionInitError {
    pub fn is_opt_in_required(&self) -> bool {
        matches!(self, RegionInitError::OptInRequired(_))
    }
}

/// Activate every supported region using the given account credentials.
pub async fn initialize_regions<B: ClientBuilder, S: Sleep>(
    builder: &B,
    creds: &AssumedCredentials,
    regions: &[String],
    ami_owner: &str,
    instance_type: &str,
    sleeper: &S,
    cancel: &CancellationToken,
) -> Result<(), RegionInitError> {
    info!(regions = regions.len(), "initializing account regions");

    let tasks = regions.iter().map(|region| async {
        if cancel.is_cancelled() {
            return Err(RegionInitError::Cancelled);
        }
        let api = builder
            .from_credentials(creds, region)
            .await
            .map_err(|source| classify(region, source))?;
        initialize_region(&api, region, ami_owner, instance_type, sleeper, cancel).await
    });

    let mut opt_in: Option<RegionInitError> = None;
    for result in join_all(tasks).await {
        match result {
            Ok(()) => {}
            Err(err) if err.is_opt_in_required() => {
                // keep going; the other regions can still make progress
                opt_in = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    match opt_in {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn classify(region: &str, source: AwsError) -> RegionInitError {
    if matches!(source, AwsError::OptInRequired) {
        RegionInitError::OptInRequired(region.to_string())
    } else {
        RegionInitError::Aws {
            region: region.to_string(),
            source,
        }
    }
}

/// Launch and terminate one instance in one region.
async fn initialize_region<A: AwsApi, S: Sleep>(
    api: &A,
    region: &str,
    ami_owner: &str,
    instance_type: &str,
    sleeper: &S,
    cancel: &CancellationToken,
) -> Result<(), RegionInitError> {
    let ami = api
        .find_image(ami_owner)
        .await
        .map_err(|e| classify(region, e))?
        .ok_or_else(|| RegionInitError::Aws {
            region: region.to_string(),
            source: AwsError::NotFound {
                resource_type: "image",
                resource_id: format!("owner {ami_owner}"),
            },
        })?;

    let instance_id = api
        .run_instance(&ami, instance_type)
        .await
        .map_err(|e| classify(region, e))?;
    debug!(region = %region, instance_id = %instance_id, "activation instance launched");

    // Wait until the instance actually runs; activation needs the compute
    // to have been scheduled, not merely requested.
    let mut running = false;
    for _ in 0..RUNNING_POLL_ATTEMPTS {
        if cancel.is_cancelled() {
            return Err(RegionInitError::Cancelled);
        }
        match api
            .describe_instance_state(&instance_id)
            .await
            .map_err(|e| classify(region, e))?
        {
            InstanceRunState::Running => {
                running = true;
                break;
            }
            InstanceRunState::Pending => sleeper.sleep(POLL_INTERVAL).await,
            other => {
                warn!(region = %region, instance_id = %instance_id, state = ?other, "unexpected instance state");
                break;
            }
        }
    }

    api.terminate_instance(&instance_id)
        .await
        .map_err(|e| classify(region, e))?;

    if !running {
        return Err(RegionInitError::Aws {
            region: region.to_string(),
            source: AwsError::Sdk {
                code: None,
                message: format!("instance {instance_id} never reached running"),
            },
        });
    }

    // Best-effort wait for termination; a slow shutdown is not a failure.
    for _ in 0..TERMINATED_POLL_ATTEMPTS {
        if cancel.is_cancelled() {
            break;
        }
        match api.describe_instance_state(&instance_id).await {
            Ok(InstanceRunState::Terminated) => break,
            Ok(_) => sleeper.sleep(POLL_INTERVAL).await,
            Err(err) if err.is_not_found() => break,
            Err(err) => {
                debug!(region = %region, error = %err, "error polling termination");
                break;
            }
        }
    }

    info!(region = %region, "region activated");
    Ok(())
}
