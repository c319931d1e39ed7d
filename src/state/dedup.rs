//! Duplicate-delivery suppression.
//!
//! Meta redelivers webhook events on timeout and on subscription overlap.
//! Each event is remembered by key for a bounded window; a repeat sighting
//! inside the window is dropped without touching the stored first-seen
//! timestamp, so the window never slides.

use std::sync::Arc;

use crate::clock::Clock;
use crate::state::store::TtlStore;

pub struct EventDeduper {
    store: Arc<dyn TtlStore>,
    clock: Arc<dyn Clock>,
}

impl EventDeduper {
    pub fn new(store: Arc<dyn TtlStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Record a sighting of `key`. Returns true when the key was already
    /// seen inside the TTL window (the event is a duplicate).
    pub async fn observe(&self, key: &str) -> bool {
        let now = self.clock.now();
        !self.store.set_if_absent(key, now).await
    }
}
