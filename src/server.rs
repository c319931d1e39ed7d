//! Webhook HTTP surface.
//!
//! Two verbs on one route, the way Meta drives a webhook:
//! - `GET /webhook` is the subscription handshake: echo `hub.challenge`
//!   when `hub.verify_token` matches, 403 otherwise. The only route that
//!   ever answers non-success.
//! - `POST /webhook` is event delivery: parse leniently, hand the payload
//!   to a spawned pipeline task, and answer `200 {"ok":true}` immediately —
//!   even for garbage bodies, so the platform never retry-storms us.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::event::WebhookPayload;
use crate::routing::Dispatcher;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    /// Token Meta has to present during the GET handshake.
    pub verify_token: String,
}

/// Build the Axum router for the webhook surface.
pub fn webhook_routes(state: AppState) -> Router {
    Router::new()
        .route("/webhook", get(verify_webhook).post(receive_events))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "inbox-pilot"
    }))
}

// ── Verification handshake ──────────────────────────────────────────

// Query keys carry literal dots, so a map beats a derived struct here.
async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let mode = params.get("hub.mode").map(String::as_str).unwrap_or_default();
    let token = params
        .get("hub.verify_token")
        .map(String::as_str)
        .unwrap_or_default();
    let challenge = params.get("hub.challenge").cloned().unwrap_or_default();

    if mode == "subscribe" && token == state.verify_token {
        info!("Webhook verification succeeded");
        return (StatusCode::OK, challenge).into_response();
    }

    warn!(mode = %mode, "Webhook verification failed");
    (StatusCode::FORBIDDEN, "Verification failed").into_response()
}

// ── Event delivery ──────────────────────────────────────────────────

async fn receive_events(State(state): State<AppState>, body: String) -> impl IntoResponse {
    match serde_json::from_str::<WebhookPayload>(&body) {
        Ok(payload) => {
            // The platform wants its 200 within seconds; processing happens
            // off the request task and its failures stay in the logs.
            let dispatcher = Arc::clone(&state.dispatcher);
            tokio::spawn(async move {
                dispatcher.handle_delivery(payload).await;
            });
        }
        Err(e) => {
            warn!(error = %e, "Discarding unparseable webhook body");
        }
    }

    Json(json!({ "ok": true }))
}
