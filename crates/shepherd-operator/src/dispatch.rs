//! Reconciliation dispatch
//!
//! Change notifications fan out to a bounded worker pool. Reconciliations
//! for distinct entities run in parallel; reconciliations for the same
//! entity are serialized by key. An event arriving while its key is being
//! worked coalesces into a single follow-up run.

use crate::store::StoreEvent;
use shepherd_common::defaults::MAX_CONCURRENT_RECONCILES;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Feed of events into the dispatcher; cloneable for requeue use.
pub type EventSender = UnboundedSender<StoreEvent>;

/// Runs the dispatch loop until cancelled.
pub struct Dispatcher {
    max_workers: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(MAX_CONCURRENT_RECONCILES)
    }
}

impl Dispatcher {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    /// Drain `events`, invoking `handler` per event with per-key
    /// serialization and at most `max_workers` concurrent invocations.
    pub async fn run<H, Fut>(
        &self,
        mut events: UnboundedReceiver<StoreEvent>,
        cancel: CancellationToken,
        handler: H,
    ) where
        H: Fn(StoreEvent) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut inflight: HashSet<StoreEvent> = HashSet::new();
        let mut queued: HashSet<StoreEvent> = HashSet::new();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<StoreEvent>();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("dispatcher shutting down");
                    return;
                }
                maybe_event = events.recv() => {
                    let Some(event) = maybe_event else { return };
                    if inflight.contains(&event) {
                        // same-key work in progress; coalesce
                        queued.insert(event);
                        continue;
                    }
                    inflight.insert(event.clone());
                    spawn_worker(event, handler.clone(), semaphore.clone(), done_tx.clone());
                }
                finished = done_rx.recv() => {
                    let Some(event) = finished else { return };
                    inflight.remove(&event);
                    if queued.remove(&event) {
                        inflight.insert(event.clone());
                        spawn_worker(event, handler.clone(), semaphore.clone(), done_tx.clone());
                    }
                }
            }
        }
    }
}

fn spawn_worker<H, Fut>(
    event: StoreEvent,
    handler: H,
    semaphore: Arc<Semaphore>,
    done_tx: UnboundedSender<StoreEvent>,
) where
    H: Fn(StoreEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        // Closed only at shutdown; treat as a no-op then
        let Ok(_permit) = semaphore.acquire().await else {
            return;
        };
        handler(event.clone()).await;
        let _ = done_tx.send(event);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EntityKind;
    use shepherd_common::Key;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn event(name: &str) -> StoreEvent {
        StoreEvent {
            kind: EntityKind::Account,
            key: Key::new(name, "shepherd"),
        }
    }

    #[tokio::test]
    async fn same_key_events_are_serialized() {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));

        let handler = {
            let active = active.clone();
            let max_active = max_active.clone();
            let runs = runs.clone();
            move |_event: StoreEvent| {
                let active = active.clone();
                let max_active = max_active.clone();
                let runs = runs.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    runs.fetch_add(1, Ordering::SeqCst);
                }
            }
        };

        for _ in 0..5 {
            tx.send(event("same")).unwrap();
        }

        let dispatcher = Dispatcher::new(8);
        let cancel_clone = cancel.clone();
        let run = tokio::spawn(async move {
            dispatcher.run(rx, cancel_clone, handler).await;
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        run.await.unwrap();

        // Never two concurrent runs for one key; bursts coalesce
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        let total = runs.load(Ordering::SeqCst);
        assert!(total >= 1 && total <= 2, "got {total} runs");
    }

    #[tokio::test]
    async fn distinct_keys_run_concurrently_up_to_the_ceiling() {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let handler = {
            let active = active.clone();
            let max_active = max_active.clone();
            move |_event: StoreEvent| {
                let active = active.clone();
                let max_active = max_active.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    max_active.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                }
            }
        };

        for i in 0..10 {
            tx.send(event(&format!("key-{i}"))).unwrap();
        }

        let dispatcher = Dispatcher::new(3);
        let cancel_clone = cancel.clone();
        let run = tokio::spawn(async move {
            dispatcher.run(rx, cancel_clone, handler).await;
        });

        tokio::time::sleep(Duration::from_millis(400)).await;
        cancel.cancel();
        run.await.unwrap();

        let peak = max_active.load(Ordering::SeqCst);
        assert!(peak <= 3, "worker ceiling exceeded: {peak}");
        assert!(peak >= 2, "expected concurrency, got {peak}");
    }
}
