//! Configuration, read from the environment at startup.

use std::time::Duration as StdDuration;

use chrono::Duration;
use secrecy::SecretString;

use crate::classify::Category;

/// Top-level settings for the responder.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Token Meta echoes back during webhook verification.
    pub verify_token: String,
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    pub graph: GraphSettings,
    /// `None` disables escalation email entirely.
    pub email: Option<EmailSettings>,
    pub routing: RoutingConfig,
    pub replies: ReplyCatalog,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            verify_token: env_or("META_VERIFY_TOKEN", "inbox_pilot_verify"),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            graph: GraphSettings::from_env(),
            email: EmailSettings::from_env(),
            routing: RoutingConfig::from_env(),
            replies: ReplyCatalog::default(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verify_token: "inbox_pilot_verify".into(),
            bind_addr: "0.0.0.0:8080".into(),
            graph: GraphSettings::default(),
            email: None,
            routing: RoutingConfig::default(),
            replies: ReplyCatalog::default(),
        }
    }
}

// ── Graph API ───────────────────────────────────────────────────────

/// Graph API client settings. The page token is the production token;
/// the Instagram token is an optional fallback for comment operations.
#[derive(Debug, Clone)]
pub struct GraphSettings {
    pub base_url: String,
    pub page_token: Option<SecretString>,
    pub ig_token: Option<SecretString>,
    /// Per-attempt request timeout.
    pub timeout: StdDuration,
    /// Retries after the first attempt.
    pub retries: u32,
    /// Base backoff between attempts, multiplied by the attempt number.
    pub backoff: StdDuration,
}

impl GraphSettings {
    pub fn from_env() -> Self {
        Self {
            base_url: env_or("GRAPH_API_BASE", "https://graph.facebook.com/v24.0"),
            page_token: secret_env("PAGE_ACCESS_TOKEN"),
            ig_token: secret_env("IG_ACCESS_TOKEN"),
            ..Self::default()
        }
    }
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            base_url: "https://graph.facebook.com/v24.0".into(),
            page_token: None,
            ig_token: None,
            timeout: StdDuration::from_secs(9),
            retries: 2,
            backoff: StdDuration::from_millis(400),
        }
    }
}

// ── Escalation email ────────────────────────────────────────────────

/// SMTP settings for escalation email, built from environment variables.
#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
    pub to_default: String,
    pub to_sales: String,
    pub to_pricing: String,
    pub to_emergency: String,
    /// Goes in square brackets at the front of every subject line.
    pub subject_tag: String,
}

impl EmailSettings {
    /// Build from environment variables.
    /// Returns `None` without credentials (escalation email disabled).
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("EMAIL_USERNAME")
            .ok()
            .filter(|v| !v.is_empty())?;
        let password = secret_env("EMAIL_PASSWORD")?;

        let to_default = env_or_else("EMAIL_TO_DEFAULT", || username.clone());

        Some(Self {
            smtp_host: env_or("EMAIL_SMTP_HOST", "smtp.gmail.com"),
            smtp_port: parsed_env("EMAIL_SMTP_PORT", 587),
            from_address: env_or_else("EMAIL_FROM", || username.clone()),
            to_sales: env_or_else("EMAIL_TO_SALES", || to_default.clone()),
            to_pricing: env_or_else("EMAIL_TO_PRICING", || to_default.clone()),
            to_emergency: env_or_else("EMAIL_TO_EMERGENCY", || to_default.clone()),
            subject_tag: env_or("EMAIL_SUBJECT_TAG", "Inbox Pilot"),
            username,
            password,
            to_default,
        })
    }

    /// Recipient for a given category; everything falls back to the
    /// default inbox.
    pub fn recipient_for(&self, category: Category) -> &str {
        match category {
            Category::Emergency => &self.to_emergency,
            Category::Pricing => &self.to_pricing,
            Category::Sales => &self.to_sales,
            Category::General => &self.to_default,
        }
    }
}

// ── Routing windows ─────────────────────────────────────────────────

/// TTLs and backoff for the stateful routing pieces.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    /// How long a seen event id suppresses redeliveries.
    pub dedup_ttl: Duration,
    /// How long a per-actor lock is honored before counting as abandoned.
    pub lock_ttl: Duration,
    /// Single wait before re-trying a contended lock.
    pub lock_retry_backoff: StdDuration,
    /// How long a shown menu suppresses re-sending it.
    pub menu_ttl: Duration,
}

impl RoutingConfig {
    pub fn from_env() -> Self {
        Self {
            dedup_ttl: Duration::seconds(parsed_env("DEDUP_TTL_SECS", 600)),
            lock_ttl: Duration::seconds(parsed_env("LOCK_TTL_SECS", 60)),
            lock_retry_backoff: StdDuration::from_millis(parsed_env("LOCK_RETRY_MS", 250)),
            menu_ttl: Duration::hours(parsed_env("MENU_TTL_HOURS", 24)),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            dedup_ttl: Duration::minutes(10),
            lock_ttl: Duration::seconds(60),
            lock_retry_backoff: StdDuration::from_millis(250),
            menu_ttl: Duration::hours(24),
        }
    }
}

// ── Reply copy ──────────────────────────────────────────────────────

/// Outbound copy for auto-replies. Data, not code: swap the texts without
/// touching the routing.
#[derive(Debug, Clone)]
pub struct ReplyCatalog {
    pub emergency: String,
    pub pricing: String,
    pub sales: String,
    /// Neutral public acknowledgement, also the reply for general comments.
    pub comment_ack: String,
    /// Public reply pointing a high-intent commenter to their DMs.
    pub comment_redirect: String,
}

impl ReplyCatalog {
    /// Auto-reply text for a category.
    pub fn reply_for(&self, category: Category) -> &str {
        match category {
            Category::Emergency => &self.emergency,
            Category::Pricing => &self.pricing,
            Category::Sales => &self.sales,
            Category::General => &self.comment_ack,
        }
    }
}

impl Default for ReplyCatalog {
    fn default() -> Self {
        Self {
            emergency: "¡Gracias por escribirnos! Por seguridad, si tu mascota presenta una situación urgente, contáctanos de inmediato por el canal de emergencias o llama a la clínica. Si puedes, envíanos: especie/edad, síntomas y desde cuándo inició.".into(),
            pricing: "¡Claro! Te ayudamos con precios. Para cotizar exacto, dime el producto/servicio que necesitas y tu ubicación (si aplica). En breve te respondemos con el detalle.".into(),
            sales: "¡Perfecto! Para ayudarte con tu compra, dime qué necesitas, cantidad y si es para entrega o recogida. Te respondemos con disponibilidad y pasos a seguir.".into(),
            comment_ack: "¡Gracias por tu comentario! 😊".into(),
            comment_redirect: "¡Gracias por escribirnos! 📩 Te respondemos por mensaje directo con todos los detalles.".into(),
        }
    }
}

// ── Env helpers ─────────────────────────────────────────────────────

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_or_else(name: &str, default: impl FnOnce() -> String) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(default)
}

fn parsed_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn secret_env(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
}
