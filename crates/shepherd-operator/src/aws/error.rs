//! AWS error classification
//!
//! Provides typed errors for AWS SDK operations using the `.code()` method
//! instead of string matching on Debug format. Controllers route on the
//! predicates, never on raw code strings.

use thiserror::Error;

/// AWS error categories for retry, capacity, and failure handling
#[derive(Debug, Clone, Error)]
pub enum AwsError {
    /// Resource was not found (safe to skip in teardown)
    #[error("Resource not found: {resource_type} '{resource_id}'")]
    NotFound {
        resource_type: &'static str,
        resource_id: String,
    },

    /// Resource already exists (safe to ignore in create operations)
    #[error("Resource already exists")]
    AlreadyExists,

    /// Rate limit exceeded (retryable with backoff)
    #[error("Rate limit exceeded")]
    Throttled,

    /// Concurrent modification on the provider side (retryable)
    #[error("Concurrent modification")]
    ConcurrentModification,

    /// Account or quota ceiling reached (capacity, requeue after cooldown)
    #[error("Account limit exceeded")]
    AccountLimitExceeded,

    /// Service quota exhausted (capacity, requeue after cooldown)
    #[error("Service quota exceeded")]
    QuotaExceeded,

    /// Region requires explicit opt-in before use (transient during init)
    #[error("Region opt-in required")]
    OptInRequired,

    /// Provider-side internal failure (terminal for the entity)
    #[error("Provider internal failure: {0}")]
    InternalFailure(String),

    /// Assumed-role ID did not match the expected role after replacement
    #[error("Assumed role ID '{actual}' does not match expected '{expected}'")]
    RoleIdMismatch { expected: String, actual: String },

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, AwsError::AlreadyExists)
    }

    /// Transient errors: retried with bounded backoff, never surfaced as a
    /// terminal failure on first occurrence.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AwsError::Throttled
                | AwsError::ConcurrentModification
                | AwsError::OptInRequired
                | AwsError::RoleIdMismatch { .. }
        )
    }

    /// Capacity errors: reported as a condition, requeued after a cooldown.
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            AwsError::AccountLimitExceeded | AwsError::QuotaExceeded
        )
    }

    /// Terminal errors: the entity moves to Failed and is skipped.
    pub fn is_terminal(&self) -> bool {
        !self.is_retryable() && !self.is_capacity() && !self.is_not_found()
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "NoSuchEntity",
    "NoSuchEntityException",
    "NoSuchBucket",
    "NoSuchKey",
    "NoSuchHostedZone",
    "InvalidInstanceID.NotFound",
    "InvalidVolume.NotFound",
    "InvalidSnapshot.NotFound",
    "InvalidVpcEndpointServiceId.NotFound",
];

/// Known AWS error codes for "already exists" conditions
const ALREADY_EXISTS_CODES: &[&str] = &[
    "EntityAlreadyExists",
    "EntityAlreadyExistsException",
    "BucketAlreadyOwnedByYou",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
];

/// Organizations failure reasons and codes for capacity exhaustion
const LIMIT_CODES: &[&str] = &[
    "ACCOUNT_LIMIT_EXCEEDED",
    "ConstraintViolationException",
    "LimitExceededException",
];

/// Provider-internal failure codes, terminal for the entity
const INTERNAL_CODES: &[&str] = &["INTERNAL_FAILURE", "ServiceException", "InternalFailure"];

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound {
            resource_type: "resource",
            resource_id: message,
        },
        Some(c) if ALREADY_EXISTS_CODES.contains(&c) => AwsError::AlreadyExists,
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        Some(c) if LIMIT_CODES.contains(&c) => AwsError::AccountLimitExceeded,
        Some(c) if INTERNAL_CODES.contains(&c) => AwsError::InternalFailure(message),
        Some("ConcurrentModificationException") => AwsError::ConcurrentModification,
        Some("OptInRequired") => AwsError::OptInRequired,
        Some("AuthFailure") if message.contains("opt-in") => AwsError::OptInRequired,
        Some("QuotaExceededException") | Some("ServiceQuotaExceededException") => {
            AwsError::QuotaExceeded
        }
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify any AWS SDK service error via its `ProvideErrorMetadata` impl.
///
/// All aws-sdk operation errors and `SdkError` wrappers implement the trait,
/// so one generic function covers every service client.
pub fn classify_sdk_error<E>(err: &E) -> AwsError
where
    E: aws_sdk_sts::error::ProvideErrorMetadata,
{
    let meta = err.meta();
    classify_aws_error(meta.code(), meta.message())
}

/// Treat "not found" as success; used throughout teardown where an absent
/// resource means the work is already done.
pub fn ignore_not_found(result: Result<(), AwsError>) -> Result<(), AwsError> {
    match result {
        Err(err) if err.is_not_found() => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        for code in NOT_FOUND_CODES {
            let err = classify_aws_error(Some(code), Some("some message"));
            assert!(err.is_not_found(), "Expected NotFound for code: {code}");
            assert!(!err.is_terminal());
        }
    }

    #[test]
    fn already_exists_codes() {
        for code in ALREADY_EXISTS_CODES {
            let err = classify_aws_error(Some(code), Some("msg"));
            assert!(
                err.is_already_exists(),
                "Expected AlreadyExists for code: {code}"
            );
        }
    }

    #[test]
    fn throttling_codes() {
        for code in THROTTLING_CODES {
            let err = classify_aws_error(Some(code), Some("msg"));
            assert!(err.is_retryable(), "Expected retryable for code: {code}");
            assert!(matches!(err, AwsError::Throttled));
        }
    }

    #[test]
    fn capacity_codes() {
        for code in LIMIT_CODES {
            let err = classify_aws_error(Some(code), Some("msg"));
            assert!(err.is_capacity(), "Expected capacity for code: {code}");
            assert!(!err.is_terminal());
        }
        assert!(classify_aws_error(Some("QuotaExceededException"), None).is_capacity());
    }

    #[test]
    fn internal_failure_is_terminal() {
        for code in INTERNAL_CODES {
            let err = classify_aws_error(Some(code), Some("boom"));
            assert!(err.is_terminal(), "Expected terminal for code: {code}");
        }
    }

    #[test]
    fn concurrent_modification_is_retryable() {
        let err = classify_aws_error(Some("ConcurrentModificationException"), Some("busy"));
        assert!(err.is_retryable());
        assert!(matches!(err, AwsError::ConcurrentModification));
    }

    #[test]
    fn opt_in_required_is_retryable_not_terminal() {
        let err = classify_aws_error(Some("OptInRequired"), Some("enable the region first"));
        assert!(matches!(err, AwsError::OptInRequired));
        assert!(err.is_retryable());
        assert!(!err.is_terminal());
    }

    #[test]
    fn unknown_and_missing_codes() {
        let err = classify_aws_error(Some("SomeNewError"), Some("details"));
        assert!(matches!(err, AwsError::Sdk { .. }));
        assert!(err.is_terminal());

        let err2 = classify_aws_error(None, Some("something failed"));
        assert!(matches!(err2, AwsError::Sdk { code: None, .. }));
    }

    #[test]
    fn role_id_mismatch_is_retryable() {
        let err = AwsError::RoleIdMismatch {
            expected: "AROA123".to_string(),
            actual: "AROA999:session".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn ignore_not_found_passes_other_errors() {
        assert!(ignore_not_found(Err(AwsError::NotFound {
            resource_type: "bucket",
            resource_id: "b".to_string(),
        }))
        .is_ok());
        assert!(ignore_not_found(Err(AwsError::Throttled)).is_err());
        assert!(ignore_not_found(Ok(())).is_ok());
    }
}
