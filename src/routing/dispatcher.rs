//! Dispatcher — turns one webhook delivery into replies and escalations.
//!
//! A delivery carries many events; each one is processed independently and
//! failures stay contained to it. DMs run the stateful path (classify →
//! dedup → actor lock → menu phase → decision); comments are stateless
//! one-shots gated only by dedup.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::classify::{Category, KeywordClassifier};
use crate::clock::Clock;
use crate::config::{ReplyCatalog, RoutingConfig};
use crate::event::{self, ChannelKind, InboundEvent, WebhookPayload};
use crate::gateway::{Escalation, MessageGateway, Notifier};
use crate::routing::flow::{self, FlowDecision};
use crate::routing::menu::MenuCatalog;
use crate::state::{ActorLocks, EventDeduper, MemoryTtlStore, MenuLedger};

/// Everything the dispatcher needs, wired once at startup.
pub struct RoutingDeps {
    pub classifier: KeywordClassifier,
    pub menu: MenuCatalog,
    pub replies: ReplyCatalog,
    pub deduper: EventDeduper,
    pub locks: ActorLocks,
    pub menu_ledger: MenuLedger,
    pub gateway: Arc<dyn MessageGateway>,
    /// `None` disables escalation email (skipped with a warning).
    pub notifier: Option<Arc<dyn Notifier>>,
    pub clock: Arc<dyn Clock>,
}

impl RoutingDeps {
    /// Stock classifier/menu/replies plus fresh in-memory TTL stores sized
    /// from `cfg`, everything sharing one clock. Fields stay public so
    /// callers can swap any piece afterwards.
    pub fn with_config(
        cfg: &RoutingConfig,
        gateway: Arc<dyn MessageGateway>,
        notifier: Option<Arc<dyn Notifier>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            classifier: KeywordClassifier::default_keywords(),
            menu: MenuCatalog::default_menu(),
            replies: ReplyCatalog::default(),
            deduper: EventDeduper::new(
                Arc::new(MemoryTtlStore::new(cfg.dedup_ttl, clock.clone())),
                clock.clone(),
            ),
            locks: ActorLocks::new(
                Arc::new(MemoryTtlStore::new(cfg.lock_ttl, clock.clone())),
                clock.clone(),
                cfg.lock_retry_backoff,
            ),
            menu_ledger: MenuLedger::new(
                Arc::new(MemoryTtlStore::new(cfg.menu_ttl, clock.clone())),
                clock.clone(),
                cfg.menu_ttl,
            ),
            gateway,
            notifier,
            clock,
        }
    }
}

pub struct Dispatcher {
    deps: RoutingDeps,
}

impl Dispatcher {
    pub fn new(deps: RoutingDeps) -> Self {
        Self { deps }
    }

    /// Process one webhook delivery end to end.
    ///
    /// Never fails: by the time this runs the HTTP surface has already
    /// answered 200, so every error is logged where it happens and the
    /// remaining events still get their turn.
    pub async fn handle_delivery(&self, payload: WebhookPayload) {
        let delivery = Uuid::new_v4();
        let events = event::flatten(&payload, self.deps.clock.now());
        info!(
            delivery = %delivery,
            object = payload.object.as_deref().unwrap_or("page"),
            entries = payload.entry.len(),
            events = events.len(),
            "Webhook delivery received"
        );

        for event in &events {
            self.process_event(event, delivery).await;
        }
    }

    async fn process_event(&self, event: &InboundEvent, delivery: Uuid) {
        let key = event.dedup_key();
        if self.deps.deduper.observe(&key).await {
            debug!(delivery = %delivery, key = %key, "Duplicate event suppressed");
            return;
        }

        match event.channel {
            ChannelKind::Dm => self.process_dm(event, delivery).await,
            ChannelKind::Comment => self.process_comment(event, delivery).await,
        }
    }

    // ── DM path ─────────────────────────────────────────────────────

    async fn process_dm(&self, event: &InboundEvent, delivery: Uuid) {
        let category = self.deps.classifier.classify(&event.text);

        let ran = self
            .deps
            .locks
            .with_actor_lock(&event.actor_id, || {
                self.run_dm_pipeline(event, category, delivery)
            })
            .await;

        if ran.is_none() {
            info!(
                delivery = %delivery,
                actor = %event.actor_id,
                "Dropped DM, another pipeline holds the actor lock"
            );
        }
    }

    async fn run_dm_pipeline(&self, event: &InboundEvent, category: Category, delivery: Uuid) {
        let phase = self.deps.menu_ledger.phase_for(&event.actor_id).await;
        let decision = flow::next_step(phase, category, &event.text, &self.deps.menu);
        info!(
            delivery = %delivery,
            actor = %event.actor_id,
            category = %category,
            phase = %phase,
            decision = decision.label(),
            "DM routed"
        );

        match decision {
            FlowDecision::Escalate { category } => {
                self.send_dm(event, self.deps.replies.reply_for(category))
                    .await;
                self.notify(Escalation {
                    category,
                    source: event.channel.as_source(),
                    text: event.text.clone(),
                    metadata: json!({
                        "senderId": event.actor_id,
                        "entryId": event.entry_id,
                        "object": event.object.as_str(),
                    }),
                })
                .await;
            }
            FlowDecision::ShowMenu => {
                self.send_dm(event, &self.deps.menu.render_menu()).await;
                self.deps.menu_ledger.mark_shown(&event.actor_id).await;
            }
            FlowDecision::Faq(option) => {
                debug!(actor = %event.actor_id, option = option.digit, "Menu pick parsed");
                self.send_dm(event, &option.faq_reply).await;
            }
            FlowDecision::Nudge => {
                self.send_dm(event, self.deps.menu.nudge()).await;
            }
        }
    }

    async fn send_dm(&self, event: &InboundEvent, text: &str) {
        match self
            .deps
            .gateway
            .send_dm(&event.actor_id, text, event.object)
            .await
        {
            Ok(()) => info!(actor = %event.actor_id, "DM reply sent"),
            Err(e) => error!(actor = %event.actor_id, error = %e, "DM reply failed"),
        }
    }

    // ── Comment path ────────────────────────────────────────────────

    async fn process_comment(&self, event: &InboundEvent, delivery: Uuid) {
        // Flattening drops id-less comments before they get here.
        let Some(comment_id) = event.event_id.as_deref() else {
            return;
        };

        let category = self.deps.classifier.classify(&event.text);
        info!(
            delivery = %delivery,
            comment = %comment_id,
            from = %event.display_name(),
            category = %category,
            "Comment routed"
        );

        // Liking an emergency would read badly; everything else gets one.
        if category != Category::Emergency {
            if let Err(e) = self.deps.gateway.like_comment(comment_id).await {
                warn!(comment = %comment_id, error = %e, "Comment like failed");
            }
        }

        let reply = if category.is_high_intent() {
            // Prices and contact details never go in a public thread.
            &self.deps.replies.comment_redirect
        } else {
            &self.deps.replies.comment_ack
        };
        match self.deps.gateway.reply_to_comment(comment_id, reply).await {
            Ok(()) => info!(comment = %comment_id, "Comment reply posted"),
            Err(e) => error!(comment = %comment_id, error = %e, "Comment reply failed"),
        }

        if category.is_high_intent() {
            self.notify(Escalation {
                category,
                source: event.channel.as_source(),
                text: event.text.clone(),
                metadata: json!({
                    "commentId": comment_id,
                    "from": event.display_name(),
                    "field": event.field,
                }),
            })
            .await;
        }
    }

    // ── Escalation ──────────────────────────────────────────────────

    async fn notify(&self, escalation: Escalation) {
        let Some(notifier) = &self.deps.notifier else {
            warn!(
                category = %escalation.category,
                "Escalation skipped, email not configured"
            );
            return;
        };

        if let Err(e) = notifier.notify(&escalation).await {
            error!(
                category = %escalation.category,
                error = %e,
                "Escalation notification failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::clock::MockClock;
    use crate::error::{GatewayError, NotifyError};
    use crate::event::ObjectKind;

    /// Gateway stub that records every call instead of hitting the network.
    #[derive(Default)]
    struct RecordingGateway {
        dms: Mutex<Vec<(String, String)>>,
        replies: Mutex<Vec<(String, String)>>,
        likes: Mutex<Vec<String>>,
        fail_dms: bool,
    }

    impl RecordingGateway {
        fn dms(&self) -> Vec<(String, String)> {
            self.dms.lock().unwrap().clone()
        }

        fn replies(&self) -> Vec<(String, String)> {
            self.replies.lock().unwrap().clone()
        }

        fn likes(&self) -> Vec<String> {
            self.likes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageGateway for RecordingGateway {
        async fn send_dm(
            &self,
            recipient_id: &str,
            text: &str,
            _object: ObjectKind,
        ) -> Result<(), GatewayError> {
            if self.fail_dms {
                return Err(GatewayError::RequestFailed {
                    path: "me/messages".into(),
                    reason: "stubbed failure".into(),
                });
            }
            self.dms
                .lock()
                .unwrap()
                .push((recipient_id.to_string(), text.to_string()));
            Ok(())
        }

        async fn reply_to_comment(
            &self,
            comment_id: &str,
            text: &str,
        ) -> Result<(), GatewayError> {
            self.replies
                .lock()
                .unwrap()
                .push((comment_id.to_string(), text.to_string()));
            Ok(())
        }

        async fn like_comment(&self, comment_id: &str) -> Result<(), GatewayError> {
            self.likes.lock().unwrap().push(comment_id.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        escalations: Mutex<Vec<Escalation>>,
    }

    impl RecordingNotifier {
        fn escalations(&self) -> Vec<Escalation> {
            self.escalations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, escalation: &Escalation) -> Result<(), NotifyError> {
            self.escalations.lock().unwrap().push(escalation.clone());
            Ok(())
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        gateway: Arc<RecordingGateway>,
        notifier: Arc<RecordingNotifier>,
        clock: MockClock,
    }

    fn harness() -> Harness {
        harness_with(RecordingGateway::default(), true)
    }

    fn harness_with(gateway: RecordingGateway, with_notifier: bool) -> Harness {
        let clock = MockClock::new();
        let gateway = Arc::new(gateway);
        let notifier = Arc::new(RecordingNotifier::default());

        let dispatcher = Dispatcher::new(RoutingDeps::with_config(
            &RoutingConfig::default(),
            gateway.clone(),
            with_notifier.then(|| notifier.clone() as Arc<dyn Notifier>),
            Arc::new(clock.clone()),
        ));

        Harness {
            dispatcher,
            gateway,
            notifier,
            clock,
        }
    }

    fn dm_payload(actor: &str, mid: &str, text: &str) -> WebhookPayload {
        serde_json::from_value(json!({
            "object": "instagram",
            "entry": [{
                "id": "e-1",
                "messaging": [{
                    "sender": { "id": actor },
                    "timestamp": 1_700_000_000_000i64,
                    "message": { "mid": mid, "text": text }
                }]
            }]
        }))
        .unwrap()
    }

    fn comment_payload(comment_id: &str, text: &str) -> WebhookPayload {
        serde_json::from_value(json!({
            "object": "instagram",
            "entry": [{
                "id": "e-1",
                "changes": [{
                    "field": "comments",
                    "value": {
                        "id": comment_id,
                        "text": text,
                        "from": { "id": "u-5", "username": "ana.perez" }
                    }
                }]
            }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn pricing_dm_gets_auto_reply_and_escalation() {
        let h = harness();

        h.dispatcher
            .handle_delivery(dm_payload("u-1", "mid.1", "cuanto cuesta el saco?"))
            .await;

        let dms = h.gateway.dms();
        assert_eq!(dms.len(), 1);
        assert_eq!(dms[0].0, "u-1");
        assert_eq!(dms[0].1, ReplyCatalog::default().pricing);

        let escalations = h.notifier.escalations();
        assert_eq!(escalations.len(), 1);
        assert_eq!(escalations[0].category, Category::Pricing);
        assert_eq!(escalations[0].source, "DM");
        assert_eq!(escalations[0].metadata["senderId"], "u-1");
        assert_eq!(escalations[0].metadata["object"], "instagram");
    }

    #[tokio::test]
    async fn first_general_dm_shows_the_menu_then_reads_picks() {
        let h = harness();

        h.dispatcher
            .handle_delivery(dm_payload("u-1", "mid.1", "hola, buenas"))
            .await;
        let dms = h.gateway.dms();
        assert_eq!(dms.len(), 1);
        assert!(dms[0].1.contains("1) "), "expected the menu, got {:?}", dms[0].1);

        // A follow-up digit is an option pick, not another menu.
        h.dispatcher
            .handle_delivery(dm_payload("u-1", "mid.2", "2"))
            .await;
        let dms = h.gateway.dms();
        assert_eq!(dms.len(), 2);
        let expected = MenuCatalog::default_menu()
            .parse_selection("2")
            .unwrap()
            .faq_reply
            .clone();
        assert_eq!(dms[1].1, expected);

        // Nothing here is high-intent, so no escalation.
        assert!(h.notifier.escalations().is_empty());
    }

    #[tokio::test]
    async fn unparseable_follow_up_gets_the_nudge() {
        let h = harness();

        h.dispatcher
            .handle_delivery(dm_payload("u-1", "mid.1", "buenas tardes"))
            .await;
        h.dispatcher
            .handle_delivery(dm_payload("u-1", "mid.2", "jajaja gracias"))
            .await;

        let dms = h.gateway.dms();
        assert_eq!(dms.len(), 2);
        assert_eq!(dms[1].1, MenuCatalog::default_menu().nudge());
    }

    #[tokio::test]
    async fn menu_comes_back_after_a_day_of_silence() {
        let h = harness();

        h.dispatcher
            .handle_delivery(dm_payload("u-1", "mid.1", "hola"))
            .await;
        h.clock.advance(StdDuration::from_secs(25 * 3600));
        h.dispatcher
            .handle_delivery(dm_payload("u-1", "mid.2", "buenas!"))
            .await;

        let dms = h.gateway.dms();
        assert_eq!(dms.len(), 2);
        assert!(dms[0].1.contains("1) "));
        assert!(dms[1].1.contains("1) "), "menu should be shown again after the TTL");
    }

    #[tokio::test]
    async fn high_intent_bypass_leaves_menu_state_alone() {
        let h = harness();

        h.dispatcher
            .handle_delivery(dm_payload("u-1", "mid.1", "hola"))
            .await;
        h.dispatcher
            .handle_delivery(dm_payload("u-1", "mid.2", "urgente, mi perro vomito!"))
            .await;

        let dms = h.gateway.dms();
        assert_eq!(dms.len(), 2);
        assert_eq!(dms[1].1, ReplyCatalog::default().emergency);
        assert_eq!(h.notifier.escalations()[0].category, Category::Emergency);

        // Still in the shown phase: a digit parses as a pick, not a menu.
        h.dispatcher
            .handle_delivery(dm_payload("u-1", "mid.3", "3"))
            .await;
        let dms = h.gateway.dms();
        assert!(!dms[2].1.contains("1) "));
    }

    #[tokio::test]
    async fn redelivered_event_is_processed_once() {
        let h = harness();

        let payload = dm_payload("u-1", "mid.1", "cuanto vale?");
        h.dispatcher.handle_delivery(payload.clone()).await;
        h.dispatcher.handle_delivery(payload).await;

        assert_eq!(h.gateway.dms().len(), 1);
        assert_eq!(h.notifier.escalations().len(), 1);
    }

    #[tokio::test]
    async fn general_comment_is_liked_and_acknowledged() {
        let h = harness();

        h.dispatcher
            .handle_delivery(comment_payload("c-1", "que lindo!"))
            .await;

        assert_eq!(h.gateway.likes(), vec!["c-1".to_string()]);
        let replies = h.gateway.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].1, ReplyCatalog::default().comment_ack);
        assert!(h.notifier.escalations().is_empty());
    }

    #[tokio::test]
    async fn pricing_comment_is_liked_redirected_and_escalated() {
        let h = harness();

        h.dispatcher
            .handle_delivery(comment_payload("c-2", "precio del grande?"))
            .await;

        assert_eq!(h.gateway.likes(), vec!["c-2".to_string()]);
        let replies = h.gateway.replies();
        assert_eq!(replies[0].1, ReplyCatalog::default().comment_redirect);

        let escalations = h.notifier.escalations();
        assert_eq!(escalations.len(), 1);
        assert_eq!(escalations[0].category, Category::Pricing);
        assert_eq!(escalations[0].source, "COMMENT");
        assert_eq!(escalations[0].metadata["commentId"], "c-2");
        assert_eq!(escalations[0].metadata["from"], "ana.perez");
        assert_eq!(escalations[0].metadata["field"], "comments");
    }

    #[tokio::test]
    async fn emergency_comment_is_never_liked() {
        let h = harness();

        h.dispatcher
            .handle_delivery(comment_payload("c-3", "emergencia, se comio algo toxico"))
            .await;

        assert!(h.gateway.likes().is_empty());
        let replies = h.gateway.replies();
        assert_eq!(replies[0].1, ReplyCatalog::default().comment_redirect);
        assert_eq!(h.notifier.escalations()[0].category, Category::Emergency);
    }

    #[tokio::test]
    async fn gateway_failure_does_not_stop_sibling_events() {
        let gateway = RecordingGateway {
            fail_dms: true,
            ..Default::default()
        };
        let h = harness_with(gateway, true);

        // One delivery with a failing DM and a healthy comment.
        let payload: WebhookPayload = serde_json::from_value(json!({
            "object": "instagram",
            "entry": [{
                "id": "e-1",
                "messaging": [{
                    "sender": { "id": "u-1" },
                    "message": { "mid": "mid.1", "text": "cuanto cuesta?" }
                }],
                "changes": [{
                    "field": "comments",
                    "value": { "id": "c-1", "text": "hola!", "from": { "id": "u-2" } }
                }]
            }]
        }))
        .unwrap();

        h.dispatcher.handle_delivery(payload).await;

        // The DM send failed but the escalation and the comment both ran.
        assert!(h.gateway.dms().is_empty());
        assert_eq!(h.notifier.escalations().len(), 1);
        assert_eq!(h.gateway.replies().len(), 1);
        assert_eq!(h.gateway.likes().len(), 1);
    }

    #[tokio::test]
    async fn missing_notifier_still_sends_the_reply() {
        let h = harness_with(RecordingGateway::default(), false);

        h.dispatcher
            .handle_delivery(dm_payload("u-1", "mid.1", "precio?"))
            .await;

        assert_eq!(h.gateway.dms().len(), 1);
        assert!(h.notifier.escalations().is_empty());
    }

    #[tokio::test]
    async fn distinct_actors_get_independent_menu_state() {
        let h = harness();

        h.dispatcher
            .handle_delivery(dm_payload("u-1", "mid.1", "hola"))
            .await;
        h.dispatcher
            .handle_delivery(dm_payload("u-2", "mid.2", "buenas"))
            .await;

        let dms = h.gateway.dms();
        assert_eq!(dms.len(), 2);
        assert!(dms[0].1.contains("1) "));
        assert!(dms[1].1.contains("1) "), "each actor gets their own first menu");
    }

    #[tokio::test]
    async fn dm_escalation_metadata_carries_entry_context() {
        let h = harness();

        h.dispatcher
            .handle_delivery(dm_payload("u-7", "mid.9", "quiero comprar 2 sacos"))
            .await;

        let escalations = h.notifier.escalations();
        assert_eq!(escalations[0].category, Category::Sales);
        let meta: &Value = &escalations[0].metadata;
        assert_eq!(meta["senderId"], "u-7");
        assert_eq!(meta["entryId"], "e-1");
    }
}
