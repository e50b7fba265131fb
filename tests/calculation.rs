//! Calculation task behaviour against in-memory and deliberately faulty stores.

use async_trait::async_trait;
use live_tally::db::{
    Counts, MemoryResultStore, MemoryVoteStore, ResultStore, Tally, Vote, VoteStore,
};
use live_tally::error::StoreError;
use live_tally::realtime::{Broadcaster, SubscriptionRegistry};
use live_tally::tally::Calculator;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

fn counts(pairs: &[(&str, u64)]) -> Counts {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

async fn seed(votes: &dyn VoteStore, event_id: &str, options: &[&str]) {
    let voter = Uuid::new_v4();
    for option in options {
        votes.insert(Vote::new(voter, event_id, *option)).await.unwrap();
    }
}

struct Harness {
    votes: Arc<MemoryVoteStore>,
    results: Arc<MemoryResultStore>,
    registry: Arc<SubscriptionRegistry>,
    calculator: Calculator,
}

fn harness() -> Harness {
    let votes = Arc::new(MemoryVoteStore::new());
    let results = Arc::new(MemoryResultStore::new());
    let registry = Arc::new(SubscriptionRegistry::new(16));
    let calculator = Calculator::new(
        votes.clone(),
        results.clone(),
        Broadcaster::new(registry.clone()),
    );
    Harness {
        votes,
        results,
        registry,
        calculator,
    }
}

#[tokio::test]
async fn test_repeated_calculation_is_idempotent() {
    let h = harness();
    seed(h.votes.as_ref(), "e1", &["A", "A", "B"]).await;

    let first = h.calculator.run("e1").await.unwrap();
    let second = h.calculator.run("e1").await.unwrap();

    assert_eq!(first.counts, second.counts);
    assert!(second.computed_at >= first.computed_at);
    assert_eq!(h.results.len().await, 1);
}

#[tokio::test]
async fn test_scheduled_run_stores_and_publishes() {
    let h = harness();
    seed(h.votes.as_ref(), "e1", &["red", "blue", "red"]).await;
    let (observer, mut updates) = h.registry.connect().await;
    h.registry.join(observer, "e1").await;

    h.calculator.schedule("e1").await.unwrap();

    let stored = h.results.find("e1").await.unwrap().unwrap();
    assert_eq!(stored.counts, counts(&[("red", 2), ("blue", 1)]));

    let pushed = updates.try_recv().expect("update should already be queued");
    assert_eq!(*pushed, stored);
}

#[tokio::test]
async fn test_observer_of_other_event_sees_nothing() {
    let h = harness();
    seed(h.votes.as_ref(), "E1", &["x"]).await;
    let (watcher, mut updates) = h.registry.connect().await;
    h.registry.join(watcher, "E2").await;

    h.calculator.run("E1").await.unwrap();

    assert!(updates.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_runs_store_a_valid_snapshot() {
    let before = counts(&[("A", 2), ("B", 1)]);
    let after = counts(&[("A", 2), ("B", 1), ("C", 1)]);

    for _ in 0..200 {
        let h = harness();
        seed(h.votes.as_ref(), "e1", &["A", "A", "B"]).await;
        let (observer, mut updates) = h.registry.connect().await;
        h.registry.join(observer, "e1").await;

        let first = h.calculator.schedule("e1");
        let second = h.calculator.schedule("e1");
        let votes = h.votes.clone();
        let late_vote = tokio::spawn(async move {
            votes.insert(Vote::new(Uuid::new_v4(), "e1", "C")).await.unwrap();
        });

        first.await.unwrap();
        second.await.unwrap();
        late_vote.await.unwrap();

        let stored = h.results.find("e1").await.unwrap().unwrap();
        assert!(
            stored.counts == before || stored.counts == after,
            "stored tally {:?} matches no read snapshot",
            stored.counts
        );
        assert_eq!(h.results.len().await, 1);

        for _ in 0..2 {
            let pushed = tokio::time::timeout(Duration::from_secs(1), updates.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(
                pushed.counts == before || pushed.counts == after,
                "pushed tally {:?} matches no read snapshot",
                pushed.counts
            );
        }
    }
}

/// Vote store whose next read takes its snapshot and then parks until released.
struct GatedVoteStore {
    inner: MemoryVoteStore,
    hold_next: AtomicBool,
    snapshot_taken: Notify,
    release: Notify,
}

#[async_trait]
impl VoteStore for GatedVoteStore {
    async fn insert(&self, vote: Vote) -> Result<Uuid, StoreError> {
        self.inner.insert(vote).await
    }

    async fn find(&self, event_id: &str) -> Result<Vec<Vote>, StoreError> {
        let votes = self.inner.find(event_id).await?;
        if self.hold_next.swap(false, Ordering::SeqCst) {
            self.snapshot_taken.notify_one();
            self.release.notified().await;
        }
        Ok(votes)
    }
}

#[tokio::test]
async fn test_racing_runs_are_last_write_wins_not_freshest_read() {
    let votes = Arc::new(GatedVoteStore {
        inner: MemoryVoteStore::new(),
        hold_next: AtomicBool::new(true),
        snapshot_taken: Notify::new(),
        release: Notify::new(),
    });
    let results = Arc::new(MemoryResultStore::new());
    let registry = Arc::new(SubscriptionRegistry::new(4));
    let calculator = Calculator::new(
        votes.clone(),
        results.clone(),
        Broadcaster::new(registry.clone()),
    );
    seed(votes.as_ref(), "e1", &["A", "A", "B"]).await;
    let (observer, mut updates) = registry.connect().await;
    registry.join(observer, "e1").await;

    // The first run reads {A, A, B} and stalls before writing.
    let stale = calculator.schedule("e1");
    votes.snapshot_taken.notified().await;

    seed(votes.as_ref(), "e1", &["C"]).await;
    let fresh = calculator.run("e1").await.unwrap();
    assert_eq!(fresh.counts, counts(&[("A", 2), ("B", 1), ("C", 1)]));
    assert_eq!(fresh.total_votes(), 4);

    votes.release.notify_one();
    stale.await.unwrap();

    // Runs are not serialized per event: the stale read landed last and wins.
    let stored = results.find("e1").await.unwrap().unwrap();
    assert_eq!(stored.counts, counts(&[("A", 2), ("B", 1)]));

    // Observers see both snapshots in completion order.
    let first_push = updates.recv().await.unwrap();
    let second_push = updates.recv().await.unwrap();
    assert_eq!(first_push.counts, counts(&[("A", 2), ("B", 1), ("C", 1)]));
    assert_eq!(second_push.counts, counts(&[("A", 2), ("B", 1)]));
}

struct UnavailableVoteStore;

#[async_trait]
impl VoteStore for UnavailableVoteStore {
    async fn insert(&self, _vote: Vote) -> Result<Uuid, StoreError> {
        Err(StoreError::Unavailable("vote store offline".to_string()))
    }

    async fn find(&self, _event_id: &str) -> Result<Vec<Vote>, StoreError> {
        Err(StoreError::Unavailable("vote store offline".to_string()))
    }
}

struct UnavailableResultStore;

#[async_trait]
impl ResultStore for UnavailableResultStore {
    async fn upsert(&self, _tally: &Tally) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("result store offline".to_string()))
    }

    async fn find(&self, _event_id: &str) -> Result<Option<Tally>, StoreError> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_failed_read_aborts_without_write_or_push() {
    let results = Arc::new(MemoryResultStore::new());
    let registry = Arc::new(SubscriptionRegistry::new(4));
    let calculator = Calculator::new(
        Arc::new(UnavailableVoteStore),
        results.clone(),
        Broadcaster::new(registry.clone()),
    );
    let (observer, mut updates) = registry.connect().await;
    registry.join(observer, "e1").await;

    assert!(matches!(
        calculator.run("e1").await,
        Err(StoreError::Unavailable(_))
    ));

    // The scheduled form swallows the error; the task still finishes cleanly.
    tokio::time::timeout(Duration::from_secs(2), calculator.schedule("e1"))
        .await
        .expect("task should finish")
        .expect("task should not panic");

    assert!(results.find("e1").await.unwrap().is_none());
    assert!(updates.try_recv().is_err());
}

#[tokio::test]
async fn test_failed_write_is_not_broadcast() {
    let votes = Arc::new(MemoryVoteStore::new());
    seed(votes.as_ref(), "e1", &["A"]).await;
    let registry = Arc::new(SubscriptionRegistry::new(4));
    let calculator = Calculator::new(
        votes,
        Arc::new(UnavailableResultStore),
        Broadcaster::new(registry.clone()),
    );
    let (observer, mut updates) = registry.connect().await;
    registry.join(observer, "e1").await;

    calculator.schedule("e1").await.unwrap();

    assert!(updates.try_recv().is_err());
}

#[tokio::test]
async fn test_publish_to_departed_observer_does_not_fail_the_run() {
    let h = harness();
    seed(h.votes.as_ref(), "e1", &["A"]).await;
    let (observer, updates) = h.registry.connect().await;
    h.registry.join(observer, "e1").await;
    drop(updates);

    let tally = h.calculator.run("e1").await.unwrap();
    assert_eq!(tally.counts, counts(&[("A", 1)]));
    assert_eq!(h.registry.room_size("e1").await, 0);
}
