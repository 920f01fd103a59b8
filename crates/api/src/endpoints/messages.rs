//! Direct messaging endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shortloop_common::AppResult;
use shortloop_core::MessageView;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Create messages router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_conversations))
        .route("/unread/count", get(get_unread_count))
        .route("/{partner_id}", get(get_messages))
        .route("/{partner_id}", post(send_message))
}

/// Message response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub text: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<shortloop_db::entities::message::Model> for MessageResponse {
    fn from(msg: shortloop_db::entities::message::Model) -> Self {
        Self {
            id: msg.id,
            sender_id: msg.sender_id,
            recipient_id: msg.recipient_id,
            text: msg.text,
            is_read: msg.is_read,
            created_at: msg.created_at.into(),
        }
    }
}

/// Conversation summary response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub partner_id: String,
    pub partner_username: String,
    pub partner_avatar_url: Option<String>,
    pub last_message: MessageResponse,
    pub unread_count: u64,
}

/// List conversations for the authenticated user, most recent first.
async fn list_conversations(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<ConversationResponse>>> {
    let summaries = state.messaging_service.get_conversations(&user.id).await?;

    let conversations = summaries
        .into_iter()
        .map(|s| ConversationResponse {
            partner_id: s.partner_id,
            partner_username: s.partner_username,
            partner_avatar_url: s.partner_avatar_url,
            last_message: s.last_message.into(),
            unread_count: s.unread_count,
        })
        .collect();

    Ok(ApiResponse::ok(conversations))
}

/// Get messages with a partner, oldest first. Marks their messages read.
async fn get_messages(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
) -> AppResult<ApiResponse<Vec<MessageResponse>>> {
    let messages = state
        .messaging_service
        .get_messages(&user.id, &partner_id)
        .await?;

    Ok(ApiResponse::ok(messages.into_iter().map(Into::into).collect()))
}

/// Send message request.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

/// Send a message to another user. Returns the stored message with
/// both participants resolved.
async fn send_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(recipient_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<ApiResponse<MessageView>> {
    let msg = state
        .messaging_service
        .send_message(&user.id, &recipient_id, &req.text)
        .await?;

    Ok(ApiResponse::ok(msg))
}

/// Unread count response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub count: u64,
}

/// Count unread messages.
async fn get_unread_count(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UnreadCountResponse>> {
    let count = state.messaging_service.get_unread_count(&user.id).await?;
    Ok(ApiResponse::ok(UnreadCountResponse { count }))
}
