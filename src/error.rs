//! Error types for inbox-pilot.
//!
//! The webhook surface always answers success, so errors never travel up
//! past the dispatcher; each collaborator surfaces its own enum and the
//! dispatcher logs them where they land.

/// Errors from the Graph API delivery gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("No access token configured for {operation}")]
    MissingToken { operation: String },

    #[error("Graph API request to {path} failed: {reason}")]
    RequestFailed { path: String, reason: String },

    #[error("Graph API returned {status} for {path}: {body}")]
    BadStatus {
        path: String,
        status: u16,
        body: String,
    },

    #[error("Graph API request to {path} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        path: String,
        attempts: u32,
        last_error: String,
    },
}

/// Errors from the escalation notifier.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to build escalation email: {0}")]
    BuildFailed(String),

    #[error("Failed to send escalation email: {0}")]
    SendFailed(String),
}
