//! Reconcilers for the three entity types
//!
//! Each reconciler handles one entity per invocation: read current state,
//! act through the AWS boundary, write the new state back. Coordination
//! between entities happens only through the store.

pub mod account;
pub mod claim;
pub mod matcher;
pub mod optin;
pub mod pool;
pub mod provision;
pub mod regioninit;
pub mod verification;

pub use account::AccountReconciler;
pub use claim::ClaimReconciler;
pub use pool::PoolReconciler;

use crate::aws::error::AwsError;
use crate::secrets::SecretError;
use crate::store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// What the caller should do after a reconciliation returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing further to do until the next change notification
    Done,
    /// Run again immediately
    Requeue,
    /// Run again after the delay
    RequeueAfter(Duration),
}

impl ReconcileOutcome {
    pub fn requeue_secs(secs: u64) -> Self {
        ReconcileOutcome::RequeueAfter(Duration::from_secs(secs))
    }
}

/// Errors surfaced by reconcilers. Conflicts are retried by requeueing;
/// everything else lands as a condition on the entity as well.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Aws(#[from] AwsError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error("{0}")]
    Validation(String),

    #[error("account CR modified during reset: Conflict")]
    ResetConflict,
}

impl ControllerError {
    /// Stale-write conflicts are retried from a fresh read, never fatal.
    pub fn is_conflict(&self) -> bool {
        match self {
            ControllerError::Store(err) => err.is_conflict(),
            ControllerError::ResetConflict => true,
            _ => false,
        }
    }
}

pub type ReconcileResult = Result<ReconcileOutcome, ControllerError>;
