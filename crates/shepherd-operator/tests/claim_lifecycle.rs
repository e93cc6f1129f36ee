//! Claim deletion and release: teardown, account reset, conflict retry.

use shepherd_common::defaults::CLAIM_FINALIZER;
use shepherd_common::{Account, AccountClaim, AccountState, Key, LegalEntity};
use shepherd_operator::aws::AwsError;
use shepherd_operator::config::OperatorConfig;
use shepherd_operator::controller::ClaimReconciler;
use shepherd_operator::store::{ControlPlane, MemoryStore};
use shepherd_operator::testing::{ConflictingStore, MockAws, MockBuilder, NoopSleep};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const NAMESPACE: &str = "shepherd";

fn bound_pair() -> (Account, AccountClaim) {
    let entity = LegalEntity::new("LegalCorp. Inc.", "abcdefg123456");

    let mut account = Account::new("osd-creds-mgmt-aaabbb", NAMESPACE);
    account.spec.aws_account_id = "100000000001".to_string();
    account.spec.legal_entity = entity.clone();
    account.status.state = AccountState::Ready;
    account.bind_claim("test-claim", "tenant");

    let mut claim = AccountClaim::new("test-claim", "tenant");
    claim.spec.legal_entity = entity;
    claim.spec.account_link = account.meta.name.clone();
    claim.meta.add_finalizer(CLAIM_FINALIZER);

    (account, claim)
}

fn reconciler(
    store: MemoryStore,
    mock: MockAws,
) -> ClaimReconciler<MemoryStore, MockBuilder, NoopSleep> {
    ClaimReconciler::new(
        store,
        MockBuilder::from(mock),
        NoopSleep,
        Arc::new(OperatorConfig::default()),
    )
}

#[tokio::test]
async fn deleting_a_claim_resets_the_account_and_finalizes() {
    let store = MemoryStore::new();
    let mock = MockAws::new();
    let reconciler = reconciler(store.clone(), mock.clone());

    let (account, claim) = bound_pair();
    let account_key = store.create_account(&account).await.unwrap().key();
    let claim_key = store.create_claim(&claim).await.unwrap().key();

    store.delete_claim(&claim_key).await.unwrap();
    reconciler
        .reconcile(&CancellationToken::new(), &claim_key)
        .await
        .unwrap();

    // Teardown ran (assume-role plus the category listings)
    assert!(mock.count("assume_role") >= 1);
    assert_eq!(mock.count("list_buckets"), 1);
    assert_eq!(mock.count("list_hosted_zones"), 1);
    assert_eq!(mock.count("list_volumes"), 1);
    assert_eq!(mock.count("list_snapshots"), 1);
    assert_eq!(mock.count("list_endpoint_service_configurations"), 1);

    // The account went back to the pool, reset and reusable
    let account = store.get_account(&account_key).await.unwrap();
    assert!(account.spec.claim_link.is_empty());
    assert!(account.spec.claim_link_namespace.is_empty());
    assert!(!account.status.claimed);
    assert_eq!(account.status.state, AccountState::Ready);
    assert!(account.status.reused);

    // The claim object itself is gone
    assert!(store.get_claim(&claim_key).await.is_err());
}

#[tokio::test]
async fn reset_conflict_keeps_the_finalizer_and_retries() {
    let store = MemoryStore::new();
    let mock = MockAws::new();
    let conflicting = ConflictingStore::new(store.clone(), 1);
    let reconciler = ClaimReconciler::new(
        conflicting,
        MockBuilder::from(mock.clone()),
        NoopSleep,
        Arc::new(OperatorConfig::default()),
    );

    let (account, claim) = bound_pair();
    let account_key = store.create_account(&account).await.unwrap().key();
    let claim_key = store.create_claim(&claim).await.unwrap().key();

    store.delete_claim(&claim_key).await.unwrap();

    // First pass: the reset write is rejected as a conflict
    let err = reconciler
        .reconcile(&CancellationToken::new(), &claim_key)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "account CR modified during reset: Conflict");
    assert!(err.is_conflict());

    // Finalizer still held; nothing was finalized
    let claim = store.get_claim(&claim_key).await.unwrap();
    assert!(claim.meta.has_finalizer(CLAIM_FINALIZER));

    // Retry converges
    reconciler
        .reconcile(&CancellationToken::new(), &claim_key)
        .await
        .unwrap();
    let account = store.get_account(&account_key).await.unwrap();
    assert!(account.status.reused);
    assert!(store.get_claim(&claim_key).await.is_err());
}

#[tokio::test]
async fn teardown_failure_blocks_release() {
    let store = MemoryStore::new();
    let mock = MockAws::new();
    mock.fail_operation("list_hosted_zones", AwsError::Throttled);
    let reconciler = reconciler(store.clone(), mock.clone());

    let (account, claim) = bound_pair();
    let account_key = store.create_account(&account).await.unwrap().key();
    let claim_key = store.create_claim(&claim).await.unwrap().key();

    store.delete_claim(&claim_key).await.unwrap();
    let result = reconciler
        .reconcile(&CancellationToken::new(), &claim_key)
        .await;
    assert!(result.is_err());

    // Finalizer held, account untouched: the claim is not released until a
    // teardown attempt reports zero category failures
    let claim = store.get_claim(&claim_key).await.unwrap();
    assert!(claim.meta.has_finalizer(CLAIM_FINALIZER));
    let account = store.get_account(&account_key).await.unwrap();
    assert!(account.status.claimed);
    assert!(!account.status.reused);

    // Clearing the fault lets the next reconciliation finish the release
    mock.clear_failure("list_hosted_zones");
    reconciler
        .reconcile(&CancellationToken::new(), &claim_key)
        .await
        .unwrap();
    let account = store.get_account(&account_key).await.unwrap();
    assert!(account.status.reused);
    assert!(store.get_claim(&claim_key).await.is_err());
}

#[tokio::test]
async fn byoc_claim_deletion_deletes_the_account_object() {
    let store = MemoryStore::new();
    let mock = MockAws::new();
    let reconciler = reconciler(store.clone(), mock.clone());

    let (mut account, mut claim) = bound_pair();
    account.spec.byoc = true;
    claim.spec.byoc = Some(shepherd_common::ByocConfig {
        aws_account_id: account.spec.aws_account_id.clone(),
        ..Default::default()
    });

    let account_key = store.create_account(&account).await.unwrap().key();
    let claim_key = store.create_claim(&claim).await.unwrap().key();

    store.delete_claim(&claim_key).await.unwrap();
    reconciler
        .reconcile(&CancellationToken::new(), &claim_key)
        .await
        .unwrap();

    // No teardown through the org role for customer accounts; the object
    // is simply dropped
    assert_eq!(mock.count("list_buckets"), 0);
    assert!(store.get_account(&account_key).await.is_err());
    assert!(store.get_claim(&claim_key).await.is_err());
}

#[tokio::test]
async fn extra_finalizers_defer_claim_cleanup() {
    let store = MemoryStore::new();
    let mock = MockAws::new();
    let reconciler = reconciler(store.clone(), mock.clone());

    let (account, mut claim) = bound_pair();
    claim.meta.add_finalizer("another.blocking.finalizer");
    store.create_account(&account).await.unwrap();
    let claim_key = store.create_claim(&claim).await.unwrap().key();

    store.delete_claim(&claim_key).await.unwrap();
    reconciler
        .reconcile(&CancellationToken::new(), &claim_key)
        .await
        .unwrap();

    // Nothing happened: no teardown, both finalizers still present
    assert_eq!(mock.count("assume_role"), 0);
    let claim = store.get_claim(&claim_key).await.unwrap();
    assert!(claim.meta.has_finalizer(CLAIM_FINALIZER));
    assert!(claim.meta.has_finalizer("another.blocking.finalizer"));
}

#[tokio::test]
async fn released_account_is_reclaimed_by_the_next_matching_claim() {
    let store = MemoryStore::new();
    let mock = MockAws::new();
    let reconciler = reconciler(store.clone(), mock.clone());
    let cancel = CancellationToken::new();

    let (account, claim) = bound_pair();
    let account_key = store.create_account(&account).await.unwrap().key();
    let claim_key = store.create_claim(&claim).await.unwrap().key();

    // Release
    store.delete_claim(&claim_key).await.unwrap();
    reconciler.reconcile(&cancel, &claim_key).await.unwrap();

    // A new claim for the same legal entity reclaims the reused account
    let mut next = AccountClaim::new("next-claim", "tenant");
    next.spec.legal_entity = LegalEntity::new("LegalCorp. Inc.", "abcdefg123456");
    let next_key = store.create_claim(&next).await.unwrap().key();
    for _ in 0..3 {
        let _ = reconciler.reconcile(&cancel, &next_key).await;
    }

    let account = store.get_account(&account_key).await.unwrap();
    assert!(account.status.claimed);
    assert_eq!(account.spec.claim_link, "next-claim");
    assert!(account.status.reused);
}
