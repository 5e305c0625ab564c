//! HTTP surface.
//!
//! Three routes: the authenticated webhook ingress, a read-only view of
//! the current board snapshot, and a liveness probe. Signature
//! verification happens against the raw body before any parsing;
//! deliveries that fail it are rejected without being read.

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use secrecy::{ExposeSecret, SecretString};
use steward_core::AppContext;
use steward_core::handlers::{handle_issue_event, handle_label_event};
use steward_core::project::load_snapshot;
use steward_core::webhook::{
    EVENT_HEADER, IssueAction, IssueEvent, SIGNATURE_HEADER, WebhookError, verify_signature,
};
use tracing::{error, info, warn};

/// Shared server state.
#[derive(Clone)]
pub struct ServerState {
    /// Application context passed into handlers.
    pub ctx: AppContext,
    /// Delivery signing secret.
    pub webhook_secret: Arc<SecretString>,
}

/// Builds the daemon's router.
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/work", get(work))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn webhook(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let Some(signature) = signature else {
        warn!("delivery rejected: missing signature header");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let secret = state.webhook_secret.expose_secret().as_bytes();
    if let Err(error) = verify_signature(secret, &body, signature) {
        warn!(%error, "delivery rejected: signature verification failed");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let event_kind = headers
        .get(EVENT_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let event = match IssueEvent::from_delivery(event_kind, &body) {
        Ok(Some(event)) => event,
        Ok(None) => return StatusCode::NO_CONTENT.into_response(),
        Err(WebhookError::Payload(error)) => {
            warn!(%error, event_kind, "delivery rejected: unparseable payload");
            return StatusCode::BAD_REQUEST.into_response();
        },
        Err(error) => {
            warn!(%error, event_kind, "delivery rejected");
            return StatusCode::BAD_REQUEST.into_response();
        },
    };

    match event.action {
        IssueAction::Labeled | IssueAction::Unlabeled => {
            let outcome = handle_label_event(&state.ctx, &event).await;
            info!(
                repo = %event.repo,
                number = event.number,
                ?outcome,
                "label event handled"
            );
            StatusCode::OK.into_response()
        },
        _ => match handle_issue_event(&state.ctx, &event).await {
            Ok(outcome) => {
                info!(
                    repo = %event.repo,
                    number = event.number,
                    ?outcome,
                    "issue event handled"
                );
                StatusCode::OK.into_response()
            },
            Err(board_error) => {
                error!(
                    %board_error,
                    repo = %event.repo,
                    number = event.number,
                    "issue event aborted: board unavailable"
                );
                StatusCode::BAD_GATEWAY.into_response()
            },
        },
    }
}

async fn work(State(state): State<ServerState>) -> Response {
    let locator = state.ctx.config.current().board.clone();
    match load_snapshot(state.ctx.board.as_ref(), &locator).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(error) => {
            error!(%error, "board snapshot unavailable");
            StatusCode::BAD_GATEWAY.into_response()
        },
    }
}

async fn healthz() -> &'static str {
    "ok"
}
