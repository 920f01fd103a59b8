//! Post and interaction endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shortloop_common::AppResult;
use shortloop_core::{CommentPage, CommentView, CreatePostInput, ReplyView, ToggleResult};

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Create posts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_post))
        .route("/feed", get(feed))
        .route("/{post_id}", get(get_post))
        .route("/{post_id}", delete(delete_post))
        .route("/{post_id}/like", post(like_toggle))
        .route("/{post_id}/save", post(save_toggle))
        .route("/{post_id}/share", post(share_post))
        .route("/{post_id}/view", post(increment_view))
        .route("/{post_id}/comments", get(get_comments))
        .route("/{post_id}/comments", post(add_comment))
        .route("/comments/{comment_id}", delete(delete_comment))
        .route("/comments/{comment_id}/like", post(like_comment))
        .route("/comments/{comment_id}/replies", post(reply_to_comment))
}

/// Post response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: String,
    pub user_id: String,
    pub video_url: String,
    pub thumbnail_url: Option<String>,
    pub caption: Option<String>,
    pub comments_count: i32,
    pub shares: i32,
    pub views: i64,
    pub allow_comments: bool,
    pub created_at: DateTime<Utc>,
}

impl From<shortloop_db::entities::post::Model> for PostResponse {
    fn from(p: shortloop_db::entities::post::Model) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            video_url: p.video_url,
            thumbnail_url: p.thumbnail_url,
            caption: p.caption,
            comments_count: p.comments_count,
            shares: p.shares,
            views: p.views,
            allow_comments: p.allow_comments,
            created_at: p.created_at.into(),
        }
    }
}

/// Create post request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub video_url: String,
    pub thumbnail_url: Option<String>,
    pub caption: Option<String>,
    #[serde(default = "default_allow_comments")]
    pub allow_comments: bool,
}

const fn default_allow_comments() -> bool {
    true
}

/// Create a new post.
async fn create_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<ApiResponse<PostResponse>> {
    let created = state
        .post_service
        .create_post(
            &user.id,
            CreatePostInput {
                video_url: req.video_url,
                thumbnail_url: req.thumbnail_url,
                caption: req.caption,
                allow_comments: req.allow_comments,
            },
        )
        .await?;

    Ok(ApiResponse::ok(created.into()))
}

/// Feed query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub until_id: Option<String>,
}

/// Get the global feed, newest first.
async fn feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> AppResult<ApiResponse<Vec<PostResponse>>> {
    let posts = state.post_service.get_feed(query.until_id.as_deref()).await?;
    Ok(ApiResponse::ok(posts.into_iter().map(Into::into).collect()))
}

/// Single post response: the post plus the viewer's interaction state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetailResponse {
    #[serde(flatten)]
    pub post: PostResponse,
    pub liked_by_me: bool,
    pub saved_by_me: bool,
}

/// Get a single post.
async fn get_post(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<PostDetailResponse>> {
    let viewer_id = user.as_ref().map(|u| u.id.as_str());
    let view = state.post_service.get_post_view(&post_id, viewer_id).await?;

    Ok(ApiResponse::ok(PostDetailResponse {
        post: view.post.into(),
        liked_by_me: view.liked_by_me,
        saved_by_me: view.saved_by_me,
    }))
}

/// Delete a post (owner only).
async fn delete_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state.post_service.delete_post(&user.id, &post_id).await?;
    Ok(ApiResponse::ok(()))
}

/// Toggle a like on a post.
async fn like_toggle(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<ToggleResult>> {
    let result = state.interaction_service.like_toggle(&user.id, &post_id).await?;
    Ok(ApiResponse::ok(result))
}

/// Toggle a save on a post.
async fn save_toggle(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<ToggleResult>> {
    let result = state.interaction_service.save_toggle(&user.id, &post_id).await?;
    Ok(ApiResponse::ok(result))
}

/// Share post request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharePostRequest {
    /// User to notify about the share, if any.
    pub shared_with: Option<String>,
}

/// Share count response.
#[derive(Debug, Serialize)]
pub struct SharesResponse {
    pub shares: i32,
}

/// Share a post.
async fn share_post(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(req): Json<SharePostRequest>,
) -> AppResult<ApiResponse<SharesResponse>> {
    let shares = state
        .interaction_service
        .share_post(&user.id, &post_id, req.shared_with.as_deref())
        .await?;
    Ok(ApiResponse::ok(SharesResponse { shares }))
}

/// Record a view on a post. No authentication required.
async fn increment_view(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state.interaction_service.increment_view(&post_id).await?;
    Ok(ApiResponse::ok(()))
}

/// Comments page query. Pages are 1-based.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentsQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

const fn default_page() -> u64 {
    1
}

const fn default_limit() -> u64 {
    20
}

/// Get a page of comments on a post, newest first.
async fn get_comments(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Query(query): Query<CommentsQuery>,
) -> AppResult<ApiResponse<CommentPage>> {
    let viewer_id = user.as_ref().map(|u| u.id.as_str());
    let page = state
        .interaction_service
        .get_comments(&post_id, viewer_id, query.page, query.limit)
        .await?;
    Ok(ApiResponse::ok(page))
}

/// Comment body request.
#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

/// Add a comment to a post.
async fn add_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> AppResult<ApiResponse<CommentView>> {
    let created = state
        .interaction_service
        .add_comment(&user.id, &post_id, &req.text)
        .await?;

    Ok(ApiResponse::ok(created))
}

/// Delete a comment (author or post owner).
async fn delete_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state
        .interaction_service
        .delete_comment(&user.id, &comment_id)
        .await?;
    Ok(ApiResponse::ok(()))
}

/// Toggle a like on a comment.
async fn like_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> AppResult<ApiResponse<ToggleResult>> {
    let result = state
        .interaction_service
        .like_comment(&user.id, &comment_id)
        .await?;
    Ok(ApiResponse::ok(result))
}

/// Reply to a comment.
async fn reply_to_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> AppResult<ApiResponse<ReplyView>> {
    let created = state
        .interaction_service
        .reply_to_comment(&user.id, &comment_id, &req.text)
        .await?;

    Ok(ApiResponse::ok(created))
}
