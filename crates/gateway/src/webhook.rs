//! `/webhook`: subscription handshake and event intake.
//!
//! The POST path only authenticates, parses and enqueues. Everything else
//! happens on the routing workers after the 200 has gone out.

use {
    axum::{
        body::Bytes,
        extract::{Query, State},
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
    },
    handoff_messenger::{
        SIGNATURE_HEADER, Verification, VerificationQuery, WebhookEvent, verify_signature,
        verify_subscription,
    },
    handoff_metrics::{counter, labels, webhook as webhook_metrics},
    handoff_routing::Error as RoutingError,
    secrecy::ExposeSecret,
    tracing::{debug, error, info, warn},
};

use crate::state::AppState;

pub async fn verify_handler(
    State(state): State<AppState>,
    Query(query): Query<VerificationQuery>,
) -> Response {
    let expected = state
        .gateway
        .verify_token
        .as_ref()
        .map(|t| t.expose_secret().as_str())
        .unwrap_or_default();

    match verify_subscription(&query, expected) {
        Verification::Accepted(challenge) => {
            counter!(webhook_metrics::VERIFICATIONS_TOTAL, labels::SUCCESS => "true").increment(1);
            info!("webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        },
        Verification::MissingParams => {
            counter!(webhook_metrics::VERIFICATIONS_TOTAL, labels::SUCCESS => "false").increment(1);
            (StatusCode::BAD_REQUEST, "Missing parameters").into_response()
        },
        Verification::Forbidden => {
            counter!(webhook_metrics::VERIFICATIONS_TOTAL, labels::SUCCESS => "false").increment(1);
            warn!(mode = ?query.mode, "webhook verification refused");
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        },
    }
}

pub async fn event_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(secret) = state.gateway.app_secret.as_ref() else {
        error!("app secret not configured, refusing webhook");
        return reject("no_secret", StatusCode::UNAUTHORIZED, "Unauthorized");
    };

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    if let Err(e) = verify_signature(&body, signature, secret.expose_secret()) {
        warn!(reason = e.as_str(), "webhook signature rejected");
        return reject(e.as_str(), StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "malformed webhook body");
            return reject("malformed", StatusCode::BAD_REQUEST, "Invalid JSON");
        },
    };

    let entries = event.entry.len();
    let object = event.object.clone();
    match state.gateway.queue.try_submit(event) {
        Ok(()) => {
            counter!(webhook_metrics::ACCEPTED_TOTAL).increment(1);
            debug!(%object, entries, "webhook queued");
            (StatusCode::OK, "EVENT_RECEIVED").into_response()
        },
        Err(RoutingError::QueueFull) => {
            warn!(%object, entries, "processing queue full, asking for redelivery");
            reject("queue_full", StatusCode::SERVICE_UNAVAILABLE, "Busy")
        },
        Err(e) => {
            error!(error = %e, "failed to queue webhook");
            reject("queue_closed", StatusCode::SERVICE_UNAVAILABLE, "Unavailable")
        },
    }
}

fn reject(reason: &'static str, status: StatusCode, body: &'static str) -> Response {
    counter!(webhook_metrics::REJECTED_TOTAL, labels::REASON => reason).increment(1);
    (status, body).into_response()
}
