//! The AccountPool entity: declarative desired pool size plus aggregates

use crate::meta::{Key, ObjectMeta};
use serde::{Deserialize, Serialize};

/// Desired state of a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSpec {
    /// Number of ready, unclaimed accounts to keep available
    pub pool_size: u32,
}

/// Aggregate counts refreshed by the pool observer. Read-only for every
/// other component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatus {
    pub claimed_accounts: u32,
    pub unclaimed_accounts: u32,
    /// Ready and unclaimed
    pub available_accounts: u32,
    /// Accounts still moving toward Ready
    pub accounts_progressing: u32,
    /// Tracked accounts vs. the configured creation ceiling
    pub aws_limit_delta: i64,
}

/// A named bucket of accounts with a desired size.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountPool {
    pub meta: ObjectMeta,
    pub spec: PoolSpec,
    pub status: PoolStatus,
}

impl AccountPool {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, size: u32) -> Self {
        Self {
            meta: ObjectMeta::new(name, namespace),
            spec: PoolSpec { pool_size: size },
            status: PoolStatus::default(),
        }
    }

    pub fn key(&self) -> Key {
        self.meta.key()
    }

    /// How many accounts are missing relative to the desired size.
    pub fn shortfall(&self) -> u32 {
        self.spec
            .pool_size
            .saturating_sub(self.status.unclaimed_accounts)
    }
}
