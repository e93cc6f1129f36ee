//! Cross-account credential chaining
//!
//! Exchanges the operator's credentials for scoped-down temporary
//! credentials in a target account, with the retries that cover IAM
//! eventual consistency: a freshly created role may take tens of seconds to
//! become assumable, and a freshly *replaced* role can briefly hand out the
//! stale role ID.

use crate::aws::api::{role_arn, AssumedCredentials, AwsApi, AwsResult, ClientBuilder};
use crate::aws::error::AwsError;
use crate::retry::{RetryPolicy, Sleep};
use shepherd_common::defaults::{OPERATOR_SESSION_NAME, STS_SESSION_DURATION_SECS};
use tracing::{info, warn};

/// Assume `role_arn`, retrying on any error until the policy is exhausted.
///
/// Covers propagation delay of freshly created roles and policies; the
/// last error is surfaced when every attempt fails.
pub async fn assume_role<A: AwsApi, S: Sleep>(
    api: &A,
    sleeper: &S,
    role_arn: &str,
    external_id: Option<&str>,
    session_name: &str,
) -> AwsResult<AssumedCredentials> {
    info!(role_arn = %role_arn, "creating STS credentials");

    let policy = RetryPolicy::assume_role();
    let result = policy
        .run(sleeper, |_| {
            api.assume_role(
                role_arn,
                external_id,
                session_name,
                STS_SESSION_DURATION_SECS,
            )
        })
        .await;

    if let Err(err) = &result {
        warn!(role_arn = %role_arn, error = %err, "timed out assuming role");
    }
    result
}

/// Parameters for the common two-hop assumption: operator credentials into
/// an account-specific role.
#[derive(Debug, Clone)]
pub struct RoleAssumptionRequest<'a> {
    pub account_id: &'a str,
    pub role_name: &'a str,
    pub region: &'a str,
    pub external_id: Option<&'a str>,
    /// When set (BYOC/CCS), the assumed-role ID returned must contain this
    /// role ID; a stale cached role definition fails the match.
    pub expected_role_id: Option<&'a str>,
}

/// Assume an account role and build a client scoped to it.
///
/// When `expected_role_id` is set, the whole assume-role call is re-run
/// with a linearly increasing sleep until the returned assumed-role ID
/// matches; exhausting those attempts surfaces a mismatch error rather
/// than proceeding on stale credentials.
pub async fn handle_role_assumption<B: ClientBuilder, S: Sleep>(
    builder: &B,
    setup_api: &B::Api,
    sleeper: &S,
    request: RoleAssumptionRequest<'_>,
) -> AwsResult<(B::Api, AssumedCredentials)> {
    let arn = role_arn(request.account_id, request.role_name);
    let policy = RetryPolicy::role_id_match();

    let mut attempt = 0;
    let creds = loop {
        let creds = assume_role(
            setup_api,
            sleeper,
            &arn,
            request.external_id,
            OPERATOR_SESSION_NAME,
        )
        .await?;

        match request.expected_role_id {
            Some(expected)
                if !expected.is_empty() && !creds.assumed_role_id.contains(expected) =>
            {
                warn!(
                    assumed_role_id = %creds.assumed_role_id,
                    expected = %expected,
                    attempt,
                    "assumed role ID does not match expected role"
                );
                match policy.delay_after(attempt) {
                    Some(delay) => {
                        sleeper.sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        return Err(AwsError::RoleIdMismatch {
                            expected: expected.to_string(),
                            actual: creds.assumed_role_id,
                        })
                    }
                }
            }
            _ => break creds,
        }
    };

    let api = builder.from_credentials(&creds, request.region).await?;
    Ok((api, creds))
}

/// Chain through the SRE jump role into a customer-held role: operator
/// credentials assume the jump role, and the jump role's credentials
/// assume the customer role with its external ID.
pub async fn chain_through_jump_role<B: ClientBuilder, S: Sleep>(
    builder: &B,
    operator_api: &B::Api,
    sleeper: &S,
    jump_role_arn: &str,
    customer_role_arn: &str,
    external_id: Option<&str>,
    region: &str,
) -> AwsResult<(B::Api, AssumedCredentials)> {
    let jump_creds =
        assume_role(operator_api, sleeper, jump_role_arn, None, OPERATOR_SESSION_NAME).await?;
    let jump_api = builder.from_credentials(&jump_creds, region).await?;

    let customer_creds = assume_role(
        &jump_api,
        sleeper,
        customer_role_arn,
        external_id,
        "Account-Initialization",
    )
    .await?;
    let customer_api = builder.from_credentials(&customer_creds, region).await?;

    Ok((customer_api, customer_creds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockAws, MockBuilder, NoopSleep};

    #[tokio::test]
    async fn assume_role_retries_then_succeeds() {
        let mock = MockAws::new();
        mock.fail_assume_role_times(3);

        let creds = assume_role(
            &mock,
            &NoopSleep,
            "arn:aws:iam::123456789012:role/OrganizationAccountAccessRole",
            None,
            "accountShepherd",
        )
        .await
        .unwrap();

        assert_eq!(creds.access_key_id, "ASIAMOCK");
        assert_eq!(mock.count("assume_role"), 4);
    }

    #[tokio::test]
    async fn assume_role_exhaustion_returns_last_error() {
        let mock = MockAws::new();
        mock.fail_assume_role_times(1000);

        let err = assume_role(
            &mock,
            &NoopSleep,
            "arn:aws:iam::123456789012:role/OrganizationAccountAccessRole",
            None,
            "accountShepherd",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AwsError::Throttled));
        assert_eq!(mock.count("assume_role"), 100);
    }

    #[tokio::test]
    async fn role_id_mismatch_reruns_whole_call() {
        let mock = MockAws::new();
        mock.set_assumed_role_ids(vec![
            "AROASTALE:session".to_string(),
            "AROASTALE:session".to_string(),
            "AROAFRESH:session".to_string(),
        ]);
        let builder = MockBuilder::from(mock.clone());

        let (_, creds) = handle_role_assumption(
            &builder,
            &mock,
            &NoopSleep,
            RoleAssumptionRequest {
                account_id: "123456789012",
                role_name: "CustomerAdminAccess",
                region: "us-east-1",
                external_id: None,
                expected_role_id: Some("AROAFRESH"),
            },
        )
        .await
        .unwrap();

        assert_eq!(creds.assumed_role_id, "AROAFRESH:session");
        assert_eq!(mock.count("assume_role"), 3);
    }

    #[tokio::test]
    async fn role_id_mismatch_exhaustion_is_an_error() {
        let mock = MockAws::new();
        mock.set_assumed_role_ids(vec!["AROASTALE:session".to_string(); 64]);
        let builder = MockBuilder::from(mock.clone());

        let err = handle_role_assumption(
            &builder,
            &mock,
            &NoopSleep,
            RoleAssumptionRequest {
                account_id: "123456789012",
                role_name: "CustomerAdminAccess",
                region: "us-east-1",
                external_id: None,
                expected_role_id: Some("AROAFRESH"),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AwsError::RoleIdMismatch { .. }));
    }

    #[tokio::test]
    async fn no_expected_role_skips_verification() {
        let mock = MockAws::new();
        let builder = MockBuilder::from(mock.clone());

        let (_, creds) = handle_role_assumption(
            &builder,
            &mock,
            &NoopSleep,
            RoleAssumptionRequest {
                account_id: "123456789012",
                role_name: "OrganizationAccountAccessRole",
                region: "us-east-1",
                external_id: None,
                expected_role_id: None,
            },
        )
        .await
        .unwrap();

        assert!(!creds.access_key_id.is_empty());
        assert_eq!(mock.count("assume_role"), 1);
    }

    #[tokio::test]
    async fn jump_role_chain_makes_two_hops() {
        let mock = MockAws::new();
        let builder = MockBuilder::from(mock.clone());

        let (_, creds) = chain_through_jump_role(
            &builder,
            &mock,
            &NoopSleep,
            "arn:aws:iam::999999999999:role/SREJumpRole",
            "arn:aws:iam::123456789012:role/CustomerRole",
            Some("external-123"),
            "us-east-1",
        )
        .await
        .unwrap();

        assert!(!creds.session_token.is_empty());
        assert_eq!(mock.count("assume_role"), 2);
    }
}
