//! Graph API delivery gateway.
//!
//! One client for the three outbound actions: DMs via the Send API
//! (`POST me/messages`), public comment replies (`POST {id}/replies`),
//! and comment likes (`POST {id}/likes`). Every call gets a per-attempt
//! timeout and a bounded retry loop with linear backoff.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{error, warn};

use crate::clock::Clock;
use crate::config::GraphSettings;
use crate::error::GatewayError;
use crate::event::ObjectKind;

/// Outbound platform actions, as seen by the dispatcher.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Send a direct message to a user.
    async fn send_dm(
        &self,
        recipient_id: &str,
        text: &str,
        object: ObjectKind,
    ) -> Result<(), GatewayError>;

    /// Post a public reply under a comment.
    async fn reply_to_comment(&self, comment_id: &str, text: &str) -> Result<(), GatewayError>;

    /// Like a comment.
    async fn like_comment(&self, comment_id: &str) -> Result<(), GatewayError>;
}

/// Production gateway backed by the Graph API.
pub struct GraphClient {
    settings: GraphSettings,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl GraphClient {
    pub fn new(settings: GraphSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
            clock,
        }
    }

    /// Token for DM sends: the page token, with the Instagram token as a
    /// fallback for Instagram traffic.
    fn dm_token(&self, object: ObjectKind) -> Option<&SecretString> {
        match (&self.settings.page_token, object) {
            (Some(token), _) => Some(token),
            (None, ObjectKind::Instagram) => self.settings.ig_token.as_ref(),
            (None, ObjectKind::Page) => None,
        }
    }

    /// Token for comment operations: page token first, Instagram token
    /// second.
    fn comment_token(&self) -> Option<&SecretString> {
        self.settings
            .page_token
            .as_ref()
            .or(self.settings.ig_token.as_ref())
    }

    /// POST with retries. The backoff grows linearly with the attempt
    /// number, the way the platform docs suggest for transient errors.
    async fn post(
        &self,
        path: &str,
        payload: &serde_json::Value,
        token: &SecretString,
    ) -> Result<(), GatewayError> {
        let attempts = self.settings.retries + 1;
        let mut last_error = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                self.clock.sleep(self.settings.backoff * attempt).await;
            }
            match self.post_once(path, payload, token).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(path = %path, attempt, error = %e, "Graph API attempt failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(GatewayError::RetriesExhausted {
            path: path.to_string(),
            attempts,
            last_error,
        })
    }

    async fn post_once(
        &self,
        path: &str,
        payload: &serde_json::Value,
        token: &SecretString,
    ) -> Result<(), GatewayError> {
        let url = format!("{}/{}", self.settings.base_url, path);

        let resp = self
            .client
            .post(&url)
            .query(&[("access_token", token.expose_secret())])
            .json(payload)
            .timeout(self.settings.timeout)
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            error!(path = %path, status, body = %body, "Graph API error response");
            return Err(GatewayError::BadStatus {
                path: path.to_string(),
                status,
                body,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl MessageGateway for GraphClient {
    async fn send_dm(
        &self,
        recipient_id: &str,
        text: &str,
        object: ObjectKind,
    ) -> Result<(), GatewayError> {
        let Some(token) = self.dm_token(object) else {
            return Err(GatewayError::MissingToken {
                operation: "DM reply".to_string(),
            });
        };

        let payload = json!({
            "recipient": { "id": recipient_id },
            "message": { "text": text },
        });
        self.post("me/messages", &payload, token).await
    }

    async fn reply_to_comment(&self, comment_id: &str, text: &str) -> Result<(), GatewayError> {
        let Some(token) = self.comment_token() else {
            return Err(GatewayError::MissingToken {
                operation: "comment reply".to_string(),
            });
        };

        let payload = json!({ "message": text });
        self.post(&format!("{comment_id}/replies"), &payload, token)
            .await
    }

    async fn like_comment(&self, comment_id: &str) -> Result<(), GatewayError> {
        let Some(token) = self.comment_token() else {
            return Err(GatewayError::MissingToken {
                operation: "comment like".to_string(),
            });
        };

        self.post(&format!("{comment_id}/likes"), &json!({}), token)
            .await
    }
}
