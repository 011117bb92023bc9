//! Live chat channel (`GET /ws`).
//!
//! Each socket subscribes to its conversation's broadcast channel. Frames a
//! client sends are persisted and re-broadcast to every socket on the
//! conversation, the sender included.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use placement_shared::{ChatFrame, ConversationId, FrameKind, SenderRole};

use crate::api::AppState;
use crate::store::LiveSignal;

#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    conversation: String,
    role: Option<SenderRole>,
}

pub async fn live_channel(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<LiveQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query))
}

async fn handle_socket(socket: WebSocket, state: AppState, query: LiveQuery) {
    let _guard = state.backend.track_socket();
    let conversation = ConversationId::new(query.conversation);
    let role = query.role.unwrap_or(SenderRole::Subject);

    let mut live = state.backend.subscribe(&conversation).await;
    let (mut sender, mut receiver) = socket.split();

    info!(conversation = %conversation, role = %role, "Live socket opened");

    loop {
        tokio::select! {
            signal = live.recv() => match signal {
                Ok(LiveSignal::Frame(frame)) => {
                    let Ok(json) = frame.to_json() else { continue };
                    if sender.send(WsMessage::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Ok(LiveSignal::Disconnect) => {
                    let _ = sender.send(WsMessage::Close(None)).await;
                    break;
                }
                Ok(LiveSignal::Sever) => {
                    warn!(conversation = %conversation, "Dropping live socket without close");
                    break;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(conversation = %conversation, skipped, "Live socket lagged");
                }
                Err(RecvError::Closed) => break,
            },
            inbound = receiver.next() => match inbound {
                Some(Ok(WsMessage::Text(text))) => {
                    if let Some(reply) = handle_inbound(&state, &conversation, role, text.as_str()).await {
                        if sender.send(WsMessage::Text(reply.into())).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(conversation = %conversation, error = %e, "Live socket error");
                    break;
                }
            },
        }
    }

    info!(conversation = %conversation, "Live socket closed");
}

/// Persist an inbound frame. Returns an error frame to send back to the
/// originating socket when the frame is rejected.
async fn handle_inbound(
    state: &AppState,
    conversation: &ConversationId,
    role: SenderRole,
    raw: &str,
) -> Option<String> {
    let frame = match ChatFrame::parse(raw) {
        Ok(frame) => frame,
        Err(e) => return error_frame(conversation, role, format!("Malformed frame: {e}")),
    };

    if &frame.conversation_id != conversation {
        return error_frame(
            conversation,
            role,
            format!("Frame addressed to {}", frame.conversation_id),
        );
    }
    if frame.kind != FrameKind::Message || frame.body.trim().is_empty() {
        return error_frame(conversation, role, "Empty or non-message frame".to_string());
    }

    state
        .backend
        .append_message(conversation.clone(), role, frame.body, frame.correlation_id)
        .await;
    None
}

fn error_frame(conversation: &ConversationId, role: SenderRole, body: String) -> Option<String> {
    ChatFrame {
        conversation_id: conversation.clone(),
        sender_role: role,
        body,
        kind: FrameKind::Error,
        id: None,
        correlation_id: None,
        created_at: None,
    }
    .to_json()
    .ok()
}
