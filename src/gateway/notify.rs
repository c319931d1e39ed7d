//! Escalation email notifier.
//!
//! High-intent events get forwarded to a per-category team inbox. Sending
//! is best-effort; the dispatcher logs failures and moves on, so a broken
//! SMTP setup never blocks replies.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use tracing::info;

use crate::classify::Category;
use crate::config::EmailSettings;
use crate::error::NotifyError;

/// A high-intent event on its way to the team.
#[derive(Debug, Clone)]
pub struct Escalation {
    pub category: Category,
    /// "DM" or "COMMENT".
    pub source: &'static str,
    pub text: String,
    /// Channel-specific context, pretty-printed into the email body.
    pub metadata: serde_json::Value,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, escalation: &Escalation) -> Result<(), NotifyError>;
}

/// SMTP notifier. The transport is rebuilt per send; escalations are rare
/// enough that holding a connection open buys nothing.
pub struct SmtpNotifier {
    settings: EmailSettings,
}

impl SmtpNotifier {
    pub fn new(settings: EmailSettings) -> Self {
        Self { settings }
    }

    fn subject(&self, escalation: &Escalation) -> String {
        format!(
            "[{}] {} - {}",
            self.settings.subject_tag,
            escalation.category.as_str().to_uppercase(),
            escalation.source
        )
    }

    fn body(&self, escalation: &Escalation) -> String {
        let text = if escalation.text.is_empty() {
            "(sin texto)"
        } else {
            &escalation.text
        };
        let meta = serde_json::to_string_pretty(&escalation.metadata)
            .unwrap_or_else(|_| "{}".to_string());

        format!(
            "Categoria: {}\nFuente: {}\n\nMensaje/Comentario:\n{}\n\nMeta:\n{}",
            escalation.category, escalation.source, text, meta
        )
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, escalation: &Escalation) -> Result<(), NotifyError> {
        let to = self.settings.recipient_for(escalation.category);

        let creds = Credentials::new(
            self.settings.username.clone(),
            self.settings.password.expose_secret().to_string(),
        );
        let transport = SmtpTransport::relay(&self.settings.smtp_host)
            .map_err(|e| NotifyError::BuildFailed(format!("SMTP relay error: {e}")))?
            .port(self.settings.smtp_port)
            .credentials(creds)
            .build();

        let email = Message::builder()
            .from(self.settings.from_address.parse().map_err(|e| {
                NotifyError::BuildFailed(format!("Invalid from address: {e}"))
            })?)
            .to(to
                .parse()
                .map_err(|e| NotifyError::BuildFailed(format!("Invalid to address: {e}")))?)
            .subject(self.subject(escalation))
            .body(self.body(escalation))
            .map_err(|e| NotifyError::BuildFailed(e.to_string()))?;

        transport
            .send(&email)
            .map_err(|e| NotifyError::SendFailed(e.to_string()))?;

        info!(
            to = %to,
            category = %escalation.category,
            source = %escalation.source,
            "Escalation email sent"
        );
        Ok(())
    }
}
