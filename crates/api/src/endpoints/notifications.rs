//! Notification endpoints.

use axum::{
    Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shortloop_common::AppResult;
use shortloop_core::notification::kind_str;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Create notifications router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/read-all", post(mark_all_as_read))
        .route("/unread/count", get(get_unread_count))
        .route("/{notification_id}/read", put(mark_as_read))
}

/// Notification response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub notification_type: &'static str,
    pub notifier_id: String,
    pub post_id: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<shortloop_db::entities::notification::Model> for NotificationResponse {
    fn from(n: shortloop_db::entities::notification::Model) -> Self {
        Self {
            id: n.id,
            notification_type: kind_str(n.notification_type),
            notifier_id: n.notifier_id,
            post_id: n.post_id,
            is_read: n.is_read,
            created_at: n.created_at.into(),
        }
    }
}

/// List notifications, newest first.
async fn list_notifications(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<NotificationResponse>>> {
    let notifications = state
        .notification_service
        .get_notifications(&user.id)
        .await?;

    Ok(ApiResponse::ok(
        notifications.into_iter().map(Into::into).collect(),
    ))
}

/// Read count response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedReadResponse {
    pub marked: u64,
}

/// Mark all notifications as read.
async fn mark_all_as_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<MarkedReadResponse>> {
    let marked = state.notification_service.mark_all_as_read(&user.id).await?;
    Ok(ApiResponse::ok(MarkedReadResponse { marked }))
}

/// Single mark-read response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadResponse {
    pub marked: bool,
}

/// Mark one notification as read. Only the owner's notifications match.
async fn mark_as_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
) -> AppResult<ApiResponse<MarkReadResponse>> {
    let marked = state
        .notification_service
        .mark_as_read(&user.id, &notification_id)
        .await?;
    Ok(ApiResponse::ok(MarkReadResponse { marked }))
}

/// Unread count response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub count: u64,
}

/// Count unread notifications.
async fn get_unread_count(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UnreadCountResponse>> {
    let count = state.notification_service.count_unread(&user.id).await?;
    Ok(ApiResponse::ok(UnreadCountResponse { count }))
}
