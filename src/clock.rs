//! Clock abstraction for mocking time in tests.
//!
//! - `SystemClock`: delegates to `Utc::now` and real `tokio::time`
//! - `MockClock`: returns a controllable timestamp, `sleep()` is a no-op

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Abstraction over the wall clock.
/// Implement this trait to control time in tests.
#[async_trait::async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Return the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Sleep for the given duration (no-op in mock implementations).
    async fn sleep(&self, duration: Duration);
}

/// Live implementation: real time, real sleeps.
#[derive(Clone, Default)]
pub struct SystemClock;

#[async_trait::async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Mock clock for tests.
/// - `now()` returns a fixed timestamp that moves only when you call `advance()`
/// - `sleep()` is a no-op (returns immediately without real delay)
#[derive(Clone)]
pub struct MockClock {
    inner: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a mock clock fixed at `Utc::now()` at construction time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Create a mock clock fixed at the given timestamp.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the mock clock by `duration`.
    /// Subsequent `now()` calls will reflect the new time.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.inner.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.inner.lock().unwrap()
    }

    async fn sleep(&self, _duration: Duration) {
        // No-op: tests advance time explicitly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_advances_only_on_demand() {
        let clock = MockClock::new();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);

        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.now(), t0 + chrono::Duration::seconds(90));
    }

    #[tokio::test]
    async fn mock_sleep_returns_immediately() {
        let clock = MockClock::new();
        let t0 = clock.now();
        clock.sleep(Duration::from_secs(3600)).await;
        // Sleeping neither blocks nor moves the mocked time.
        assert_eq!(clock.now(), t0);
    }
}
