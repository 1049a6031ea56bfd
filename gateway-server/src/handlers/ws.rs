//! `GET /ws/chat` (§4.6/§6): the bidirectional stream surface. Grounded on
//! the original service's `websocket_chat` handler — token passed as a
//! query parameter (a websocket upgrade carries no `Authorization`
//! header), `accept()` only after the token checks out, a welcome frame,
//! then a receive loop translating client frames into `gateway-router`/
//! `gateway-fabric` calls until the peer disconnects or sends something
//! unparseable enough to treat as a protocol violation.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use gateway_audit::{Actor, EventType, NewEvent, Outcome, Severity, Subject};
use gateway_fabric::Frame;
use gateway_router::{ChatMessage, ChatRequest, SelectionContext};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct WsQuery {
    pub token: String,
    #[serde(default)]
    pub compress: bool,
}

pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsQuery>,
) -> Response {
    let auth = state
        .auth
        .decode_token(&params.token)
        .and_then(|claims| state.auth.validate_session(&claims.session_id).map(|session| (claims, session)));

    let Ok((claims, session)) = auth else {
        return axum::http::StatusCode::UNAUTHORIZED.into_response();
    };

    let Ok(permit) = state.fabric.admit() else {
        return axum::http::StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    ws.on_upgrade(move |socket| async move {
        let _permit = permit;
        handle_socket(socket, state, claims.sub, session.session_id.as_str().to_string(), params.compress).await;
    })
}

/// Client-originated frame shapes (§6 schema). `#[serde(tag = "type")]`
/// keeps the match exhaustive instead of threading a free-form string
/// through the handler body.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Chat { message: String, #[serde(default)] stream: bool, #[serde(default)] context: Option<String> },
    QueryData { query: String },
    GetDatasetInfo,
    Heartbeat,
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: String, client_id: String, peer_supports_compression: bool) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    state.fabric_sender.register(&client_id, tx);

    let pump = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if ws_tx.send(message).await.is_err() {
                break;
            }
        }
    });

    let now = state.now();
    state.fabric.register_client(&client_id, peer_supports_compression, now);
    state.fabric.join_group(&client_id, "default");

    log_connection_event(&state, &user_id, &client_id, "stream connection opened");
    let _ = state
        .fabric
        .send_to(&client_id, Frame::new("connection", serde_json::json!({ "status": "connected" })).bypassing(), now)
        .await;

    while let Some(message) = ws_rx.next().await {
        let Ok(message) = message else { break };
        match message {
            Message::Text(text) => {
                let now = state.now();
                state.fabric.touch_activity(&client_id, now);
                handle_client_frame(&state, &client_id, &user_id, &text).await;
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
        }
    }

    state.fabric.disconnect(&client_id);
    state.fabric_sender.unregister(&client_id);
    pump.abort();
    log_connection_event(&state, &user_id, &client_id, "stream connection closed");
}

fn log_connection_event(state: &AppState, user_id: &str, client_id: &str, action: &str) {
    state.audit.log_event(
        EventType::DataRead,
        action,
        Outcome::Success,
        Severity::Info,
        NewEvent {
            actor: Actor { user_id: Some(user_id.to_string()), session_id: Some(client_id.to_string()), ..Default::default() },
            subject: Subject { resource_type: Some("ws_connection".to_string()), resource_id: Some(client_id.to_string()) },
            ..Default::default()
        },
    );
}

async fn handle_client_frame(state: &Arc<AppState>, client_id: &str, user_id: &str, raw: &str) {
    let now = state.now();
    let frame: Result<ClientFrame, _> = serde_json::from_str(raw);

    let outgoing = match frame {
        Ok(ClientFrame::Chat { message, stream, context }) => {
            let reply = state
                .router
                .chat(ChatRequest {
                    content: message,
                    conversation: Vec::<ChatMessage>::new(),
                    stable_context: context.unwrap_or_default(),
                    streaming: stream,
                    selection: SelectionContext::default(),
                })
                .await;
            Frame::new("response", serde_json::json!({ "content": reply.content, "variant": reply.variant.as_str() }))
        }
        Ok(ClientFrame::QueryData { query }) => match state.analytics.query(&query).await {
            Ok(data) => Frame::new("data_result", serde_json::json!({ "data": data })),
            Err(err) => Frame::new("error", serde_json::json!({ "message": err.to_string() })).bypassing(),
        },
        Ok(ClientFrame::GetDatasetInfo) => {
            Frame::new("dataset_info", serde_json::json!({ "workspace_id": state.config.analytics_workspace_id }))
        }
        Ok(ClientFrame::Heartbeat) => return,
        Err(err) => Frame::new("error", serde_json::json!({ "message": format!("malformed frame: {err}") })).bypassing(),
    };

    if state.fabric.send_to(client_id, outgoing, now).await.is_err() {
        state.fabric.disconnect(client_id);
        log_connection_event(state, user_id, client_id, "stream connection dropped after send failure");
    }
}
