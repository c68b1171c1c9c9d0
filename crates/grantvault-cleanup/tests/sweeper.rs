//! Sweeper timing and failure handling on tokio's paused clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use grantvault_cleanup::{CleanupState, TokenCleanup};
use grantvault_db_memory::InMemoryStoreFactory;
use grantvault_storage::{
    Grant, GrantFilter, GrantStore, GrantStoreFactory, GrantType, ManualClock, PartitionScope,
    StoreError, StoreResult,
};
use time::OffsetDateTime;
use time::macros::datetime;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

const NOW: OffsetDateTime = datetime!(2024-05-01 12:00 UTC);

/// Counts ERROR events.
#[derive(Clone, Default)]
struct ErrorCounter(Arc<AtomicUsize>);

impl ErrorCounter {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Store double: every call either fails or reports one candidate, and
/// counts `remove_expired` calls.
#[derive(Default)]
struct StubState {
    fail: bool,
    /// Time each `remove_expired` call takes.
    sweep_time: Option<Duration>,
    remove_expired_calls: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct StubStore(Arc<StubState>);

impl StubStore {
    fn check(&self) -> StoreResult<()> {
        if self.0.fail {
            Err(StoreError::backend("connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl GrantStore for StubStore {
    fn query(&self, _scope: PartitionScope) -> BoxStream<'_, StoreResult<Grant>> {
        stream::iter(self.check().err().map(Err)).boxed()
    }

    async fn find(&self, _filter: &GrantFilter) -> StoreResult<Vec<Grant>> {
        self.check().map(|()| Vec::new())
    }

    async fn count(&self, _filter: &GrantFilter) -> StoreResult<u64> {
        self.check().map(|()| 1)
    }

    async fn add(&self, _grant: &Grant) -> StoreResult<()> {
        self.check()
    }

    async fn update(&self, _grant: &Grant) -> StoreResult<()> {
        self.check()
    }

    async fn remove(&self, _grant: &Grant) -> StoreResult<()> {
        self.check()
    }

    async fn update_where(&self, _filter: &GrantFilter, _grant: &Grant) -> StoreResult<()> {
        self.check()
    }

    async fn remove_where(&self, _filter: &GrantFilter) -> StoreResult<u64> {
        self.check().map(|()| 0)
    }

    async fn remove_expired(&self) -> StoreResult<u64> {
        self.0.remove_expired_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.0.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if let Some(sweep_time) = self.0.sweep_time {
            tokio::time::sleep(sweep_time).await;
        }

        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.check().map(|()| 1)
    }
}

struct StubFactory(Arc<StubState>);

#[async_trait]
impl GrantStoreFactory for StubFactory {
    async fn open(&self) -> StoreResult<Box<dyn GrantStore>> {
        Ok(Box::new(StubStore(Arc::clone(&self.0))))
    }
}

fn grant(key: &str, expiration: OffsetDateTime) -> Grant {
    Grant::new(key, GrantType::REFRESH_TOKEN, "alice", "web")
        .with_creation_time(NOW - time::Duration::hours(1))
        .with_expiration(expiration)
}

#[tokio::test(start_paused = true)]
async fn one_tick_removes_only_expired_grants() {
    let clock = Arc::new(ManualClock::new(NOW));
    let factory = Arc::new(InMemoryStoreFactory::with_clock(clock));
    {
        let store = factory.open().await.unwrap();
        store
            .add(&grant("old", NOW - time::Duration::seconds(10)))
            .await
            .unwrap();
        store
            .add(&grant("just", NOW - time::Duration::seconds(1)))
            .await
            .unwrap();
        store
            .add(&grant("later", NOW + time::Duration::seconds(100)))
            .await
            .unwrap();
    }

    let cleanup = TokenCleanup::new(factory.clone(), Duration::from_secs(1)).unwrap();
    cleanup.start().unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;

    let store = factory.open_store();
    assert!(store.get("alice", "old").is_none());
    assert!(store.get("alice", "just").is_none());
    assert!(store.get("alice", "later").is_some());

    let stats = cleanup.stats();
    assert_eq!(stats.ticks, 1);
    assert_eq!(stats.sweeps, 1);
    assert_eq!(stats.removed, 2);
    assert_eq!(stats.failures, 0);

    cleanup.shutdown().await.unwrap();
    drop(store);
    assert_eq!(factory.open_sessions(), 0);
}

#[tokio::test(start_paused = true)]
async fn expiry_follows_the_store_clock() {
    // The store's clock is decades ahead of the wall clock.
    let clock = Arc::new(ManualClock::new(datetime!(2100-01-01 00:00 UTC)));
    let factory = Arc::new(InMemoryStoreFactory::with_clock(clock));
    {
        let store = factory.open().await.unwrap();
        store
            .add(&grant("past-for-store", datetime!(2050-01-01 00:00 UTC)))
            .await
            .unwrap();
        store
            .add(&grant("future-for-store", datetime!(2150-01-01 00:00 UTC)))
            .await
            .unwrap();
    }

    let cleanup = TokenCleanup::new(factory.clone(), Duration::from_secs(1)).unwrap();
    cleanup.start().unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let store = factory.open_store();
    assert!(store.get("alice", "past-for-store").is_none());
    assert!(store.get("alice", "future-for-store").is_some());
    assert_eq!(cleanup.stats().removed, 1);

    cleanup.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn restart_waits_for_the_sweep_in_flight() {
    let state = Arc::new(StubState {
        sweep_time: Some(Duration::from_secs(5)),
        ..Default::default()
    });
    let cleanup =
        TokenCleanup::new(Arc::new(StubFactory(state.clone())), Duration::from_secs(1)).unwrap();
    cleanup.start().unwrap();

    // First sweep runs from t=1s to t=6s.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(state.in_flight.load(Ordering::SeqCst), 1);

    cleanup.stop().unwrap();
    cleanup.start().unwrap();

    // The new loop waits for t=6s, then one interval, so its first sweep
    // runs from t=7s to t=12s.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(state.remove_expired_calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(state.remove_expired_calls.load(Ordering::SeqCst), 2);
    assert_eq!(state.max_in_flight.load(Ordering::SeqCst), 1);

    cleanup.shutdown().await.unwrap();
    assert_eq!(cleanup.stats().sweeps, 2);
}

#[tokio::test(start_paused = true)]
async fn failing_backend_keeps_loop_running() {
    let errors = ErrorCounter::default();
    let subscriber = tracing_subscriber::registry().with(errors.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let state = Arc::new(StubState {
        fail: true,
        ..Default::default()
    });
    let cleanup =
        TokenCleanup::new(Arc::new(StubFactory(state.clone())), Duration::from_secs(1)).unwrap();
    cleanup.start().unwrap();

    tokio::time::sleep(Duration::from_millis(3500)).await;

    assert_eq!(cleanup.state(), CleanupState::Running);
    let stats = cleanup.stats();
    assert_eq!(stats.ticks, 3);
    assert_eq!(stats.failures, 3);
    assert_eq!(stats.sweeps, 0);
    assert_eq!(errors.count(), 3);

    cleanup.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn no_removal_after_stop() {
    let state = Arc::new(StubState::default());
    let cleanup =
        TokenCleanup::new(Arc::new(StubFactory(state.clone())), Duration::from_secs(1)).unwrap();
    cleanup.start().unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(state.remove_expired_calls.load(Ordering::SeqCst), 2);

    cleanup.stop().unwrap();
    assert_eq!(cleanup.state(), CleanupState::Stopped);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(state.remove_expired_calls.load(Ordering::SeqCst), 2);
    assert_eq!(cleanup.stats().ticks, 2);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_the_wait_promptly() {
    let cleanup = TokenCleanup::new(
        Arc::new(InMemoryStoreFactory::new()),
        Duration::from_secs(3600),
    )
    .unwrap();

    let started = tokio::time::Instant::now();
    cleanup.start().unwrap();
    cleanup.shutdown().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(cleanup.stats().ticks, 0);
}

#[tokio::test(start_paused = true)]
async fn lifecycle_misuse_is_invalid_state() {
    let cleanup =
        TokenCleanup::new(Arc::new(InMemoryStoreFactory::new()), Duration::from_secs(5)).unwrap();

    assert!(cleanup.stop().unwrap_err().is_invalid_state());
    assert!(cleanup.shutdown().await.unwrap_err().is_invalid_state());

    cleanup.start().unwrap();
    assert!(cleanup.start().unwrap_err().is_invalid_state());
    assert_eq!(cleanup.state(), CleanupState::Running);

    cleanup.stop().unwrap();
    assert!(cleanup.stop().unwrap_err().is_invalid_state());

    // Restart after a stop is allowed.
    cleanup.start().unwrap();
    assert_eq!(cleanup.state(), CleanupState::Running);
    cleanup.shutdown().await.unwrap();
    assert_eq!(cleanup.state(), CleanupState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn handles_are_released_between_ticks() {
    let factory = Arc::new(InMemoryStoreFactory::new());
    let cleanup = TokenCleanup::new(factory.clone(), Duration::from_secs(1)).unwrap();
    cleanup.start().unwrap();

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(factory.open_sessions(), 0);
    }

    cleanup.shutdown().await.unwrap();
    assert!(cleanup.stats().ticks >= 2);
}
