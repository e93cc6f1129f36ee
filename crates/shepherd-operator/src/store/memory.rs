//! In-memory versioned object store
//!
//! Backs the operator loop and the tests. Every successful write bumps the
//! object's resource version; an update carrying a stale version is rejected
//! as a conflict. Deleting an object with finalizers only marks it; the
//! write that removes the last finalizer performs the physical delete.

use super::{ControlPlane, EntityKind, StoreError, StoreEvent, StoreResult};
use chrono::Utc;
use shepherd_common::{Account, AccountClaim, AccountPool, Key, ObjectMeta};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
struct Inner {
    accounts: HashMap<Key, Account>,
    claims: HashMap<Key, AccountClaim>,
    pools: HashMap<Key, AccountPool>,
}

/// In-memory control plane with change notifications.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    events_tx: UnboundedSender<StoreEvent>,
    events_rx: Arc<Mutex<Option<UnboundedReceiver<StoreEvent>>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            events_tx: tx,
            events_rx: Arc::new(Mutex::new(Some(rx))),
        }
    }

    /// Take the change-notification receiver. Can be called once; the
    /// dispatcher owns the stream for the life of the process.
    pub async fn take_events(&self) -> Option<UnboundedReceiver<StoreEvent>> {
        self.events_rx.lock().await.take()
    }

    fn notify(&self, kind: EntityKind, key: Key) {
        // Receiver may be gone in tests that drive reconciles directly
        let _ = self.events_tx.send(StoreEvent { kind, key });
    }
}

/// Shared create/update/delete mechanics over one entity map.
fn create_in<T: Clone>(
    map: &mut HashMap<Key, T>,
    kind: EntityKind,
    key: Key,
    mut obj: T,
    meta: fn(&mut T) -> &mut ObjectMeta,
) -> StoreResult<T> {
    if map.contains_key(&key) {
        return Err(StoreError::AlreadyExists { kind, key });
    }
    {
        let m = meta(&mut obj);
        m.resource_version = 1;
        if m.creation_timestamp.is_none() {
            m.creation_timestamp = Some(Utc::now());
        }
    }
    map.insert(key, obj.clone());
    Ok(obj)
}

fn update_in<T: Clone>(
    map: &mut HashMap<Key, T>,
    kind: EntityKind,
    key: Key,
    mut obj: T,
    meta: fn(&mut T) -> &mut ObjectMeta,
) -> StoreResult<Option<T>> {
    let stored_version = {
        let stored = map.get_mut(&key).ok_or_else(|| StoreError::NotFound {
            kind,
            key: key.clone(),
        })?;
        meta(stored).resource_version
    };

    let incoming_version = meta(&mut obj).resource_version;
    if incoming_version != stored_version {
        return Err(StoreError::Conflict { kind, key });
    }

    let remove = {
        let m = meta(&mut obj);
        m.resource_version += 1;
        m.is_pending_deletion() && m.finalizers.is_empty()
    };

    if remove {
        map.remove(&key);
        Ok(None)
    } else {
        map.insert(key, obj.clone());
        Ok(Some(obj))
    }
}

fn delete_in<T: Clone>(
    map: &mut HashMap<Key, T>,
    kind: EntityKind,
    key: &Key,
    meta: fn(&mut T) -> &mut ObjectMeta,
) -> StoreResult<()> {
    let stored = map.get_mut(key).ok_or_else(|| StoreError::NotFound {
        kind,
        key: key.clone(),
    })?;
    let m = meta(stored);
    if m.finalizers.is_empty() {
        map.remove(key);
    } else if m.deletion_timestamp.is_none() {
        m.deletion_timestamp = Some(Utc::now());
        m.resource_version += 1;
    }
    Ok(())
}

impl ControlPlane for MemoryStore {
    async fn get_account(&self, key: &Key) -> StoreResult<Account> {
        self.inner
            .read()
            .await
            .accounts
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: EntityKind::Account,
                key: key.clone(),
            })
    }

    async fn list_accounts(&self, namespace: &str) -> StoreResult<Vec<Account>> {
        let inner = self.inner.read().await;
        let mut accounts: Vec<Account> = inner
            .accounts
            .values()
            .filter(|a| a.meta.namespace == namespace)
            .cloned()
            .collect();
        // Listing order is stable by name; ranking rules break ties above it
        accounts.sort_by(|a, b| a.meta.name.cmp(&b.meta.name));
        Ok(accounts)
    }

    async fn create_account(&self, account: &Account) -> StoreResult<Account> {
        let key = account.key();
        let created = create_in(
            &mut self.inner.write().await.accounts,
            EntityKind::Account,
            key.clone(),
            account.clone(),
            |a| &mut a.meta,
        )?;
        self.notify(EntityKind::Account, key);
        Ok(created)
    }

    async fn update_account(&self, account: &Account) -> StoreResult<Account> {
        let key = account.key();
        let updated = update_in(
            &mut self.inner.write().await.accounts,
            EntityKind::Account,
            key.clone(),
            account.clone(),
            |a| &mut a.meta,
        )?;
        self.notify(EntityKind::Account, key);
        // Physically removed object still reports its final form
        Ok(updated.unwrap_or_else(|| account.clone()))
    }

    async fn update_account_status(&self, account: &Account) -> StoreResult<Account> {
        self.update_account(account).await
    }

    async fn delete_account(&self, key: &Key) -> StoreResult<()> {
        delete_in(
            &mut self.inner.write().await.accounts,
            EntityKind::Account,
            key,
            |a| &mut a.meta,
        )?;
        self.notify(EntityKind::Account, key.clone());
        Ok(())
    }

    async fn get_claim(&self, key: &Key) -> StoreResult<AccountClaim> {
        self.inner
            .read()
            .await
            .claims
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: EntityKind::Claim,
                key: key.clone(),
            })
    }

    async fn list_claims(&self, namespace: &str) -> StoreResult<Vec<AccountClaim>> {
        let inner = self.inner.read().await;
        let mut claims: Vec<AccountClaim> = inner
            .claims
            .values()
            .filter(|c| c.meta.namespace == namespace)
            .cloned()
            .collect();
        claims.sort_by(|a, b| a.meta.name.cmp(&b.meta.name));
        Ok(claims)
    }

    async fn create_claim(&self, claim: &AccountClaim) -> StoreResult<AccountClaim> {
        let key = claim.key();
        let created = create_in(
            &mut self.inner.write().await.claims,
            EntityKind::Claim,
            key.clone(),
            claim.clone(),
            |c| &mut c.meta,
        )?;
        self.notify(EntityKind::Claim, key);
        Ok(created)
    }

    async fn update_claim(&self, claim: &AccountClaim) -> StoreResult<AccountClaim> {
        let key = claim.key();
        let updated = update_in(
            &mut self.inner.write().await.claims,
            EntityKind::Claim,
            key.clone(),
            claim.clone(),
            |c| &mut c.meta,
        )?;
        self.notify(EntityKind::Claim, key);
        Ok(updated.unwrap_or_else(|| claim.clone()))
    }

    async fn update_claim_status(&self, claim: &AccountClaim) -> StoreResult<AccountClaim> {
        self.update_claim(claim).await
    }

    async fn delete_claim(&self, key: &Key) -> StoreResult<()> {
        delete_in(
            &mut self.inner.write().await.claims,
            EntityKind::Claim,
            key,
            |c| &mut c.meta,
        )?;
        self.notify(EntityKind::Claim, key.clone());
        Ok(())
    }

    async fn get_pool(&self, key: &Key) -> StoreResult<AccountPool> {
        self.inner
            .read()
            .await
            .pools
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: EntityKind::Pool,
                key: key.clone(),
            })
    }

    async fn list_pools(&self, namespace: &str) -> StoreResult<Vec<AccountPool>> {
        let inner = self.inner.read().await;
        let mut pools: Vec<AccountPool> = inner
            .pools
            .values()
            .filter(|p| p.meta.namespace == namespace)
            .cloned()
            .collect();
        pools.sort_by(|a, b| a.meta.name.cmp(&b.meta.name));
        Ok(pools)
    }

    async fn create_pool(&self, pool: &AccountPool) -> StoreResult<AccountPool> {
        let key = pool.key();
        let created = create_in(
            &mut self.inner.write().await.pools,
            EntityKind::Pool,
            key.clone(),
            pool.clone(),
            |p| &mut p.meta,
        )?;
        self.notify(EntityKind::Pool, key);
        Ok(created)
    }

    async fn update_pool_status(&self, pool: &AccountPool) -> StoreResult<AccountPool> {
        let key = pool.key();
        let updated = update_in(
            &mut self.inner.write().await.pools,
            EntityKind::Pool,
            key.clone(),
            pool.clone(),
            |p| &mut p.meta,
        )?;
        self.notify(EntityKind::Pool, key);
        Ok(updated.unwrap_or_else(|| pool.clone()))
    }
}
