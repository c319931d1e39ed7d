//! Shared TTL-bounded state — dedup records, per-actor locks, menu timestamps.

pub mod dedup;
pub mod lock;
pub mod menu;
pub mod store;

pub use dedup::EventDeduper;
pub use lock::ActorLocks;
pub use menu::{MenuLedger, MenuPhase};
pub use store::{MemoryTtlStore, TtlStore};
