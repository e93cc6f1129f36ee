//! Control-plane boundary
//!
//! A store of versioned objects supporting get/create/update/delete with
//! optimistic concurrency, finalizers, and change notifications. The engine
//! only ever talks to [`ControlPlane`]; the in-memory implementation in
//! [`memory`] backs the operator loop and every test.

pub mod memory;

pub use memory::MemoryStore;

use shepherd_common::{Account, AccountClaim, AccountPool, Key};
use std::fmt;
use std::future::Future;
use thiserror::Error;

/// Which entity an event or error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Account,
    Claim,
    Pool,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Account => "account",
            EntityKind::Claim => "accountclaim",
            EntityKind::Pool => "accountpool",
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: EntityKind, key: Key },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: EntityKind, key: Key },

    /// The stored resource version changed since the caller's read. Always
    /// retried from a fresh read, never fatal.
    #[error("{kind} {key} modified since read: Conflict")]
    Conflict { kind: EntityKind, key: Key },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A change notification that triggers one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreEvent {
    pub kind: EntityKind,
    pub key: Key,
}

/// The persisted-resource control plane.
///
/// Writes are rejected with [`StoreError::Conflict`] when the stored
/// resource version differs from the one the caller read. Successful writes
/// return the stored object, including its new version.
pub trait ControlPlane: Send + Sync {
    // ── Accounts ─────────────────────────────────────────────────────────
    fn get_account(&self, key: &Key) -> impl Future<Output = StoreResult<Account>> + Send;
    fn list_accounts(&self, namespace: &str)
        -> impl Future<Output = StoreResult<Vec<Account>>> + Send;
    fn create_account(&self, account: &Account)
        -> impl Future<Output = StoreResult<Account>> + Send;
    fn update_account(&self, account: &Account)
        -> impl Future<Output = StoreResult<Account>> + Send;
    fn update_account_status(
        &self,
        account: &Account,
    ) -> impl Future<Output = StoreResult<Account>> + Send;
    fn delete_account(&self, key: &Key) -> impl Future<Output = StoreResult<()>> + Send;

    // ── Claims ───────────────────────────────────────────────────────────
    fn get_claim(&self, key: &Key) -> impl Future<Output = StoreResult<AccountClaim>> + Send;
    fn list_claims(
        &self,
        namespace: &str,
    ) -> impl Future<Output = StoreResult<Vec<AccountClaim>>> + Send;
    fn create_claim(
        &self,
        claim: &AccountClaim,
    ) -> impl Future<Output = StoreResult<AccountClaim>> + Send;
    fn update_claim(
        &self,
        claim: &AccountClaim,
    ) -> impl Future<Output = StoreResult<AccountClaim>> + Send;
    fn update_claim_status(
        &self,
        claim: &AccountClaim,
    ) -> impl Future<Output = StoreResult<AccountClaim>> + Send;
    fn delete_claim(&self, key: &Key) -> impl Future<Output = StoreResult<()>> + Send;

    // ── Pools ────────────────────────────────────────────────────────────
    fn get_pool(&self, key: &Key) -> impl Future<Output = StoreResult<AccountPool>> + Send;
    fn list_pools(
        &self,
        namespace: &str,
    ) -> impl Future<Output = StoreResult<Vec<AccountPool>>> + Send;
    fn create_pool(
        &self,
        pool: &AccountPool,
    ) -> impl Future<Output = StoreResult<AccountPool>> + Send;
    fn update_pool_status(
        &self,
        pool: &AccountPool,
    ) -> impl Future<Output = StoreResult<AccountPool>> + Send;
}
