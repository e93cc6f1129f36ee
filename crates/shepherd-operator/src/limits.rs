//! Account-creation budget
//!
//! The number of provider accounts the operator may create is capped by
//! configuration. The watcher holds a periodically refreshed snapshot of
//! tracked accounts against that ceiling; the reconciliation path consults
//! it and never mutates it.

use std::sync::{Arc, RwLock};
use tracing::debug;

/// One refresh's worth of budget data.
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetSnapshot {
    /// Accounts currently tracked by the operator
    pub tracked: u32,
    /// Configured ceiling on total accounts
    pub ceiling: u32,
}

impl BudgetSnapshot {
    pub fn can_create(&self) -> bool {
        self.tracked < self.ceiling
    }

    /// Remaining headroom; negative when over the ceiling.
    pub fn delta(&self) -> i64 {
        i64::from(self.ceiling) - i64::from(self.tracked)
    }
}

/// Shared, read-mostly budget state. Cloned into every reconciler; the
/// wiring refreshes it out-of-band.
#[derive(Debug, Clone, Default)]
pub struct BudgetWatcher {
    snapshot: Arc<RwLock<BudgetSnapshot>>,
}

impl BudgetWatcher {
    pub fn new(ceiling: u32) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(BudgetSnapshot {
                tracked: 0,
                ceiling,
            })),
        }
    }

    /// Replace the tracked-account count from a fresh listing.
    pub fn refresh(&self, tracked: u32) {
        let mut snapshot = self.snapshot.write().expect("budget lock poisoned");
        snapshot.tracked = tracked;
        debug!(tracked, ceiling = snapshot.ceiling, "account budget refreshed");
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        *self.snapshot.read().expect("budget lock poisoned")
    }

    pub fn can_create(&self) -> bool {
        self.snapshot().can_create()
    }
}
