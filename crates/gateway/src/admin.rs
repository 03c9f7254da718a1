//! Endpoints called by the AI backend and the dashboard.

use {
    axum::{
        Json,
        extract::{Query, State},
        http::{HeaderMap, StatusCode, header},
        response::{IntoResponse, Response},
    },
    handoff_common::{ConversationKey, Platform},
    secrecy::ExposeSecret,
    serde::Deserialize,
    serde_json::json,
    tracing::{info, warn},
};

use crate::state::AppState;

/// Either `conversation_id=<pageID>-<userID>` or `page_id` + `thread_id`.
#[derive(Debug, Default, Deserialize)]
pub struct MarkBotQuery {
    pub conversation_id: Option<String>,
    pub page_id: Option<String>,
    pub thread_id: Option<String>,
}

impl MarkBotQuery {
    fn key(&self) -> Result<ConversationKey, &'static str> {
        if let (Some(page_id), Some(thread_id)) = (&self.page_id, &self.thread_id)
            && !page_id.is_empty()
            && !thread_id.is_empty()
        {
            return Ok(ConversationKey::new(Platform::Instagram, page_id, thread_id));
        }
        match self.conversation_id.as_deref() {
            None | Some("") => Err("Missing conversation_id parameter"),
            Some(joined) => ConversationKey::parse_joined(Platform::Instagram, joined)
                .map_err(|_| "Malformed conversation_id parameter"),
        }
    }
}

/// Pre-mark an upcoming Instagram reply as the bot's own.
pub async fn mark_bot_response_handler(
    State(state): State<AppState>,
    Query(query): Query<MarkBotQuery>,
) -> Response {
    let key = match query.key() {
        Ok(key) => key,
        Err(message) => return (StatusCode::BAD_REQUEST, message).into_response(),
    };
    state.gateway.echo_flags.mark(&key).await;
    info!(%key, "bot echo flag set by backend");
    Json(json!({
        "status": "success",
        "conversation_id": key.joined(),
        "message": "Bot flag set",
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub page_id: String,
    pub recipient_id: String,
    pub message: String,
    pub platform: Platform,
}

/// Deliver an operator-written message through the platform sender.
pub async fn send_message_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> Response {
    if let Some(token) = &state.gateway.admin_token
        && !bearer_matches(&headers, token.expose_secret())
    {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    let page = match state
        .gateway
        .pages
        .page_info(&req.page_id, req.platform)
        .await
    {
        Ok(page) => page,
        Err(handoff_store::Error::PageNotFound { .. }) => {
            return (StatusCode::NOT_FOUND, "Unknown page").into_response();
        },
        Err(e) => {
            warn!(page_id = %req.page_id, platform = %req.platform, error = %e, "page lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Error getting page info").into_response();
        },
    };

    if let Err(e) = state
        .gateway
        .sender
        .send(&page, &req.recipient_id, &req.message)
        .await
    {
        warn!(page_id = %req.page_id, platform = %req.platform, error = %e, "manual send failed");
        return (StatusCode::BAD_GATEWAY, format!("Error sending message: {e}")).into_response();
    }

    info!(page_id = %req.page_id, platform = %req.platform, recipient_id = %req.recipient_id, "manual message sent");
    Json(json!({"status": "success"})).into_response()
}

fn bearer_matches(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected)
}
