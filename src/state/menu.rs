//! Per-actor menu state.
//!
//! The only durable conversation state is one timestamp per actor: when the
//! options menu was last shown. The phase is derived from that timestamp on
//! every read, so state "decays" back to `MenuDue` after the TTL without
//! anyone writing anything.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::state::store::TtlStore;

/// Where an actor stands in the menu flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuPhase {
    /// No menu inside the TTL window; the next general message gets one.
    MenuDue,
    /// Menu shown at `since`; follow-ups are read as option picks.
    MenuShown { since: DateTime<Utc> },
}

impl MenuPhase {
    /// Derive the phase from the stored timestamp. Pure.
    pub fn from_last_shown(
        last_shown: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        match last_shown {
            Some(since) if now.signed_duration_since(since) < ttl => MenuPhase::MenuShown { since },
            _ => MenuPhase::MenuDue,
        }
    }

    pub fn is_due(&self) -> bool {
        matches!(self, MenuPhase::MenuDue)
    }
}

impl std::fmt::Display for MenuPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MenuDue => "menu_due",
            Self::MenuShown { .. } => "menu_shown",
        };
        write!(f, "{s}")
    }
}

/// Reads and writes the per-actor menu timestamp.
pub struct MenuLedger {
    store: Arc<dyn TtlStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl MenuLedger {
    pub fn new(store: Arc<dyn TtlStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    /// Current phase for an actor.
    pub async fn phase_for(&self, actor_id: &str) -> MenuPhase {
        let last_shown = self.store.get(actor_id).await;
        MenuPhase::from_last_shown(last_shown, self.clock.now(), self.ttl)
    }

    /// Record that the menu went out to this actor just now.
    pub async fn mark_shown(&self, actor_id: &str) {
        // The store only exposes set-if-absent, so clear any dead entry first.
        self.store.delete(actor_id).await;
        self.store.set_if_absent(actor_id, self.clock.now()).await;
    }
}
