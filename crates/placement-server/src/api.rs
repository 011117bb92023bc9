use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, Method},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use placement_shared::constants::{DEFAULT_NOTIFICATION_PAGE_SIZE, MAX_NOTIFICATION_PAGE_SIZE};
use placement_shared::{
    ConversationId, CreateNotificationRequest, Envelope, MarkReadAck, Message, Notification,
    NotificationId, PostMessageRequest, SubjectId, UnreadCount,
};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::live;
use crate::store::Backend;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<Backend>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            backend: Arc::new(Backend::new(config.live_buffer)),
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/messages", get(message_history).post(post_message))
        .route(
            "/notifications/:key",
            get(list_notifications).post(create_notification),
        )
        .route("/notifications/:key/count", get(unread_count))
        .route("/notifications/:key/mark-read", post(mark_read))
        .route("/notifications/:key/mark-all-read", post(mark_all_read))
        .route("/ws", get(live::live_channel))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    name: String,
    version: &'static str,
}

#[derive(Deserialize)]
struct HistoryQuery {
    conversation: String,
}

#[derive(Deserialize)]
struct ListQuery {
    limit: Option<u32>,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn message_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Envelope<Vec<Message>>>, ServerError> {
    if query.conversation.trim().is_empty() {
        return Err(ServerError::BadRequest("conversation is required".into()));
    }
    let conversation = ConversationId::new(query.conversation);
    let messages = state.backend.history(&conversation).await;
    Ok(Json(Envelope::ok(messages)))
}

async fn post_message(
    State(state): State<AppState>,
    Json(req): Json<PostMessageRequest>,
) -> Result<Json<Envelope<Message>>, ServerError> {
    if req.body.trim().is_empty() {
        return Err(ServerError::BadRequest("message body is empty".into()));
    }
    let message = state
        .backend
        .append_message(req.conversation_id, req.sender_role, req.body, req.correlation_id)
        .await;
    info!(msg_id = %message.id, conversation = %message.conversation_id, "Message posted via HTTP");
    Ok(Json(Envelope::ok(message)))
}

async fn unread_count(
    State(state): State<AppState>,
    Path(subject): Path<String>,
) -> Json<Envelope<UnreadCount>> {
    let unread = state.backend.unread_count(&SubjectId::new(subject)).await;
    Json(Envelope::ok(UnreadCount { unread }))
}

async fn list_notifications(
    State(state): State<AppState>,
    Path(subject): Path<String>,
    Query(query): Query<ListQuery>,
) -> Json<Envelope<Vec<Notification>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_NOTIFICATION_PAGE_SIZE)
        .clamp(1, MAX_NOTIFICATION_PAGE_SIZE);
    let list = state
        .backend
        .list_notifications(&SubjectId::new(subject), limit as usize)
        .await;
    Json(Envelope::ok(list))
}

async fn create_notification(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(subject): Path<String>,
    Json(req): Json<CreateNotificationRequest>,
) -> Result<Json<Envelope<Notification>>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    if req.title.trim().is_empty() {
        return Err(ServerError::BadRequest("title is required".into()));
    }
    let notification = state
        .backend
        .create_notification(SubjectId::new(subject), req.title, req.body)
        .await;
    info!(id = %notification.id, subject = %notification.subject_id, "Notification created");
    Ok(Json(Envelope::ok(notification)))
}

async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<MarkReadAck>>, ServerError> {
    let id = NotificationId::new(id);
    let updated = state
        .backend
        .mark_read(&id)
        .await
        .ok_or_else(|| ServerError::NotificationNotFound(id.to_string()))?;
    Ok(Json(Envelope::ok(MarkReadAck { updated })))
}

async fn mark_all_read(
    State(state): State<AppState>,
    Path(subject): Path<String>,
) -> Json<Envelope<MarkReadAck>> {
    let subject = SubjectId::new(subject);
    let updated = state.backend.mark_all_read(&subject).await;
    info!(subject = %subject, updated, "Marked all notifications read");
    Json(Envelope::ok(MarkReadAck { updated }))
}

/// Guards `POST /notifications/{subject}`: only callers presenting the
/// configured `ADMIN_TOKEN` as a bearer token may publish notifications.
fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ServerError> {
    use subtle::ConstantTimeEq;

    let expected = config.admin_token.as_deref().ok_or_else(|| {
        ServerError::Forbidden("Publishing notifications is disabled (no ADMIN_TOKEN)".into())
    })?;
    let presented = bearer_token(headers).unwrap_or_default();

    let matches = presented.len() == expected.len()
        && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()));
    if !matches {
        warn!("Rejected notification publish with a bad admin token");
        return Err(ServerError::Forbidden("Invalid admin token".into()));
    }
    Ok(())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    Some(value.strip_prefix("Bearer ").unwrap_or(value).trim())
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Bind `addr` (use port 0 for an ephemeral port) and serve in a background
/// task. Returns the bound address.
pub async fn spawn(
    state: AppState,
    addr: SocketAddr,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    let app = build_router(state);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "HTTP server failed");
        }
    });

    info!(addr = %local, "HTTP API server spawned");
    Ok((local, handle))
}
