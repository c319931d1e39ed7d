//! TTL map seam shared by dedup records, actor locks, and menu state.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::clock::Clock;

/// Backend-agnostic TTL map: string keys, timestamp values, one fixed TTL
/// per map. Entries older than the TTL count as absent and are evicted on
/// access; there is no background sweeper.
///
/// `MemoryTtlStore` is the single-process implementation. Deployments that
/// run more than one instance swap in a shared backend behind this trait.
#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Get the live value stored under `key`, if any.
    async fn get(&self, key: &str) -> Option<DateTime<Utc>>;

    /// Insert `value` under `key` only when no live entry exists.
    /// Returns true when the insert happened.
    async fn set_if_absent(&self, key: &str, value: DateTime<Utc>) -> bool;

    /// Remove `key` regardless of age.
    async fn delete(&self, key: &str);
}

/// In-memory `TtlStore` over a tokio `RwLock`ed map.
pub struct MemoryTtlStore {
    entries: RwLock<HashMap<String, DateTime<Utc>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl MemoryTtlStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    fn prune(entries: &mut HashMap<String, DateTime<Utc>>, now: DateTime<Utc>, ttl: Duration) {
        entries.retain(|_, stored| now.signed_duration_since(*stored) < ttl);
    }
}

#[async_trait]
impl TtlStore for MemoryTtlStore {
    async fn get(&self, key: &str) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        Self::prune(&mut entries, now, self.ttl);
        entries.get(key).copied()
    }

    async fn set_if_absent(&self, key: &str, value: DateTime<Utc>) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        Self::prune(&mut entries, now, self.ttl);
        match entries.entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}
