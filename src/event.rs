//! Webhook payload parsing and flattening.
//!
//! Meta delivers batches: one POST body carries `entry[]`, each entry
//! carries `messaging[]` (DMs) and/or `changes[]` (comment events). This
//! module turns a body into a flat list of `InboundEvent`s and drops what
//! the pipeline never wants to see: echo messages, sender-less messages,
//! id-less comments, and messages with neither text nor attachments.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
    #[serde(default)]
    pub changes: Vec<ChangeEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingEvent {
    #[serde(default)]
    pub sender: Option<Party>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub message: Option<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Party {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePart {
    #[serde(default)]
    pub mid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_echo: bool,
    #[serde(default)]
    pub attachments: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeEvent {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: CommentValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentValue {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub from: CommentAuthor,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentAuthor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

// ── Domain event ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Dm,
    Comment,
}

impl ChannelKind {
    /// Label used in escalation emails.
    pub fn as_source(&self) -> &'static str {
        match self {
            ChannelKind::Dm => "DM",
            ChannelKind::Comment => "COMMENT",
        }
    }
}

/// Which platform surface the webhook body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Instagram,
    Page,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Instagram => "instagram",
            ObjectKind::Page => "page",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One platform event, flattened out of a webhook delivery.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub channel: ChannelKind,
    pub object: ObjectKind,
    /// DM sender id, or the comment author's id ("unknown" when omitted).
    pub actor_id: String,
    /// Message `mid` or comment id. Comments without one never get here.
    pub event_id: Option<String>,
    pub text: String,
    pub has_attachments: bool,
    /// Platform send time; receipt time when the wire had none.
    pub timestamp: DateTime<Utc>,
    /// Comment author's username, when the platform sent it.
    pub actor_name: Option<String>,
    /// Webhook entry id, carried into escalation metadata.
    pub entry_id: Option<String>,
    /// Change field for comments (`comments` or `live_comments`).
    pub field: Option<String>,
}

impl InboundEvent {
    /// Name shown to the team for this actor: username over raw id.
    pub fn display_name(&self) -> &str {
        self.actor_name.as_deref().unwrap_or(&self.actor_id)
    }

    /// Deduplication key: the platform event id, or a composite good
    /// enough to catch redeliveries when the id is missing.
    pub fn dedup_key(&self) -> String {
        match &self.event_id {
            Some(id) => id.clone(),
            None => {
                let prefix: String = self.text.chars().take(32).collect();
                format!(
                    "{}|{}|{}|{}",
                    self.object.as_str(),
                    self.actor_id,
                    self.timestamp.timestamp_millis(),
                    prefix
                )
            }
        }
    }
}

// ── Flattening ─────────────────────────────────────────────────────

/// Flatten a webhook body into pipeline events, dropping what can't or
/// shouldn't be routed. `now` backfills missing timestamps.
pub fn flatten(payload: &WebhookPayload, now: DateTime<Utc>) -> Vec<InboundEvent> {
    let object = match payload.object.as_deref() {
        Some("instagram") => ObjectKind::Instagram,
        Some("page") | None => ObjectKind::Page,
        Some(other) => {
            warn!(object = %other, "Unknown webhook object type, treating as page");
            ObjectKind::Page
        }
    };

    let mut events = Vec::new();

    for entry in &payload.entry {
        for m in &entry.messaging {
            let Some(message) = &m.message else {
                // Delivery/read receipts and reactions have no message body.
                debug!("Skipping messaging event without a message");
                continue;
            };
            if message.is_echo {
                debug!("Skipping echo of our own message");
                continue;
            }
            let Some(sender_id) = m.sender.as_ref().and_then(|s| s.id.clone()) else {
                debug!("Skipping messaging event without a sender id");
                continue;
            };

            let text = message.text.clone().unwrap_or_default();
            let has_attachments = !message.attachments.is_empty();
            if text.is_empty() && !has_attachments {
                debug!(sender = %sender_id, "Skipping message with no text and no attachments");
                continue;
            }

            events.push(InboundEvent {
                channel: ChannelKind::Dm,
                object,
                actor_id: sender_id,
                event_id: message.mid.clone(),
                text,
                has_attachments,
                timestamp: wire_timestamp(m.timestamp, now),
                actor_name: None,
                entry_id: entry.id.clone(),
                field: None,
            });
        }

        for change in &entry.changes {
            let field = change.field.as_deref().unwrap_or_default();
            if field != "comments" && field != "live_comments" {
                debug!(field = %field, "Skipping change event for unhandled field");
                continue;
            }
            let Some(comment_id) = change.value.id.clone() else {
                debug!("Skipping comment without an id");
                continue;
            };

            events.push(InboundEvent {
                channel: ChannelKind::Comment,
                object,
                actor_id: change
                    .value
                    .from
                    .id
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                event_id: Some(comment_id),
                text: change.value.text.clone().unwrap_or_default(),
                has_attachments: false,
                timestamp: now,
                actor_name: change.value.from.username.clone(),
                entry_id: entry.id.clone(),
                field: Some(field.to_string()),
            });
        }
    }

    events
}

fn wire_timestamp(millis: Option<i64>, now: DateTime<Utc>) -> DateTime<Utc> {
    millis
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or(now)
}
