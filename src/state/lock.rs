//! Per-actor advisory locks.
//!
//! At most one pipeline runs per sending user at a time. The lock is
//! optimistic: a contender backs off once and then drops its event instead
//! of queueing. Entries carry the acquisition timestamp and age out of the
//! store after the lock TTL, which is the recovery path for a pipeline that
//! died without releasing.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::clock::Clock;
use crate::state::store::TtlStore;

#[derive(Clone)]
pub struct ActorLocks {
    store: Arc<dyn TtlStore>,
    clock: Arc<dyn Clock>,
    retry_backoff: Duration,
}

impl ActorLocks {
    pub fn new(store: Arc<dyn TtlStore>, clock: Arc<dyn Clock>, retry_backoff: Duration) -> Self {
        Self {
            store,
            clock,
            retry_backoff,
        }
    }

    /// Run `action` while holding the lock for `actor_id`.
    ///
    /// On contention, waits one backoff interval and tries again; if the
    /// lock is still held the event is skipped and `None` comes back. The
    /// lock is released once `action` completes, whatever it returned.
    pub async fn with_actor_lock<F, Fut, T>(&self, actor_id: &str, action: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.try_acquire(actor_id).await {
            debug!(actor = %actor_id, "Actor busy, backing off once");
            self.clock.sleep(self.retry_backoff).await;
            if !self.try_acquire(actor_id).await {
                info!(actor = %actor_id, "Actor still busy after backoff, skipping event");
                return None;
            }
        }

        let result = action().await;
        self.store.delete(actor_id).await;
        Some(result)
    }

    async fn try_acquire(&self, actor_id: &str) -> bool {
        self.store.set_if_absent(actor_id, self.clock.now()).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use tokio::sync::Notify;

    use super::*;
    use crate::clock::MockClock;
    use crate::state::store::MemoryTtlStore;

    const LOCK_TTL_SECS: i64 = 60;
    const BACKOFF: Duration = Duration::from_millis(250);

    fn locks_on(clock: Arc<dyn Clock>) -> (ActorLocks, Arc<MemoryTtlStore>) {
        let store = Arc::new(MemoryTtlStore::new(
            chrono::Duration::seconds(LOCK_TTL_SECS),
            clock.clone(),
        ));
        (
            ActorLocks::new(store.clone(), clock, BACKOFF),
            store,
        )
    }

    #[tokio::test]
    async fn lock_is_released_after_the_action() {
        let clock = MockClock::new();
        let (locks, _store) = locks_on(Arc::new(clock));

        let first = locks.with_actor_lock("u1", || async { 1 }).await;
        let second = locks.with_actor_lock("u1", || async { 2 }).await;
        assert_eq!(first, Some(1));
        assert_eq!(second, Some(2));
    }

    #[tokio::test]
    async fn concurrent_calls_for_one_actor_run_exactly_once() {
        let clock = MockClock::new();
        let (locks, _store) = locks_on(Arc::new(clock));
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let holder = {
            let locks = locks.clone();
            let started = started.clone();
            let release = release.clone();
            tokio::spawn(async move {
                locks
                    .with_actor_lock("u1", || async move {
                        started.notify_one();
                        release.notified().await;
                        "held"
                    })
                    .await
            })
        };

        started.notified().await;

        // Contender backs off (no-op under the mock clock) and gives up.
        let contender = locks.with_actor_lock("u1", || async { "contender" }).await;
        assert_eq!(contender, None);

        release.notify_one();
        assert_eq!(holder.await.unwrap(), Some("held"));

        // Completion released the lock; the actor is free again.
        let after = locks.with_actor_lock("u1", || async { "after" }).await;
        assert_eq!(after, Some("after"));
    }

    #[tokio::test]
    async fn abandoned_lock_is_reclaimed_after_the_ttl() {
        let clock = MockClock::new();
        let (locks, store) = locks_on(Arc::new(clock.clone()));

        // A holder that never released.
        assert!(store.set_if_absent("u1", clock.now()).await);
        assert_eq!(locks.with_actor_lock("u1", || async { 1 }).await, None);

        clock.advance(Duration::from_secs(61));
        assert_eq!(locks.with_actor_lock("u1", || async { 1 }).await, Some(1));
    }

    #[tokio::test]
    async fn retry_succeeds_when_the_holder_expires_during_backoff() {
        // This clock advances on sleep, so the backoff itself pushes the
        // stale entry past its TTL.
        #[derive(Clone)]
        struct SleepAdvances(MockClock);

        #[async_trait::async_trait]
        impl Clock for SleepAdvances {
            fn now(&self) -> DateTime<Utc> {
                self.0.now()
            }

            async fn sleep(&self, duration: Duration) {
                self.0.advance(duration);
            }
        }

        let inner = MockClock::new();
        let clock = Arc::new(SleepAdvances(inner.clone()));
        let (locks, store) = locks_on(clock);

        assert!(store.set_if_absent("u1", inner.now()).await);
        inner.advance(Duration::from_millis(59_900));

        // First try contends, the 250ms backoff crosses the 60s TTL, the
        // retry wins.
        let got = locks.with_actor_lock("u1", || async { "ran" }).await;
        assert_eq!(got, Some("ran"));
    }

    #[tokio::test]
    async fn different_actors_never_contend() {
        let clock = MockClock::new();
        let (locks, store) = locks_on(Arc::new(clock.clone()));

        assert!(store.set_if_absent("u1", clock.now()).await);
        let got = locks.with_actor_lock("u2", || async { "free" }).await;
        assert_eq!(got, Some("free"));
    }

    #[tokio::test]
    async fn failing_action_still_releases_the_lock() {
        let clock = MockClock::new();
        let (locks, _store) = locks_on(Arc::new(clock));

        let failed: Option<Result<(), &str>> = locks
            .with_actor_lock("u1", || async { Err("downstream broke") })
            .await;
        assert_eq!(failed, Some(Err("downstream broke")));

        let next = locks.with_actor_lock("u1", || async { Ok::<(), &str>(()) }).await;
        assert_eq!(next, Some(Ok(())));
    }
}
