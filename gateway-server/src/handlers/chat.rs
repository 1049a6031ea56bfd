//! `POST /api/chat` · `/api/v1/chat` (§6): the synchronous chat turn. Auth
//! is required (`execute:query`); the request is handed straight to
//! `gateway-router`, which never raises, so this handler only ever maps a
//! policy rejection to an error — a completed turn is always a 200.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use gateway_audit::{Actor, EventType, NewEvent, Outcome, Severity};
use gateway_auth::Permission;
use gateway_router::{ChatMessage, ChatOutcome, ChatRequest, SelectionContext};
use serde::{Deserialize, Serialize};

use super::ApiResult;
use crate::error::GatewayError;
use crate::middleware::AuthContext;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ChatMessageBody {
    pub role: String,
    pub content: String,
}

#[derive(Deserialize)]
pub struct ChatRequestBody {
    pub content: String,
    #[serde(default)]
    pub conversation: Vec<ChatMessageBody>,
    #[serde(default)]
    pub stable_context: String,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub high_accuracy: bool,
    #[serde(default)]
    pub real_time: bool,
}

#[derive(Serialize)]
pub struct ChatResponseBody {
    pub content: String,
    pub variant: &'static str,
    pub cached: bool,
    pub fallback: bool,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    auth: AuthContext,
    Json(body): Json<ChatRequestBody>,
) -> ApiResult<ChatResponseBody> {
    if !auth.has_permission(Permission::Execute) {
        return Err(GatewayError::Auth(gateway_auth::AuthError::Forbidden));
    }
    if body.content.trim().is_empty() {
        return Err(GatewayError::Validation("content must not be empty".to_string()));
    }

    let request = ChatRequest {
        content: body.content.clone(),
        conversation: body.conversation.into_iter().map(|m| ChatMessage { role: m.role, content: m.content }).collect(),
        stable_context: body.stable_context,
        streaming: body.streaming,
        selection: SelectionContext { explicit_override: None, high_accuracy: body.high_accuracy, real_time: body.real_time },
    };

    let reply = state.router.chat(request).await;

    state.audit.log_event(
        EventType::DataQueryExecuted,
        "chat turn completed",
        Outcome::Success,
        Severity::Info,
        NewEvent {
            actor: Actor { user_id: Some(auth.user_id.as_str().to_string()), session_id: Some(auth.session_id.clone()), ..Default::default() },
            detail: serde_json::json!({ "variant": reply.variant.as_str(), "outcome": format!("{:?}", reply.outcome) }),
            ..Default::default()
        },
    );

    Ok(Json(ChatResponseBody {
        content: reply.content,
        variant: reply.variant.as_str(),
        cached: reply.outcome == ChatOutcome::CacheHit,
        fallback: reply.outcome == ChatOutcome::Fallback,
    }))
}
