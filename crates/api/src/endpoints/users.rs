//! User and follow endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shortloop_common::AppResult;
use shortloop_core::{RegisterUserInput, UpdateProfileInput};

use crate::{
    endpoints::posts::PostResponse,
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::ApiResponse,
};

/// Create users router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/search", get(search))
        .route("/suggestions", get(get_suggestions))
        .route("/profile", put(update_profile))
        .route("/me/saved", get(get_saved_posts))
        .route("/{username}", get(get_by_username))
        .route("/{user_id}/posts", get(get_user_posts))
        .route("/{user_id}/follow", post(follow))
        .route("/{user_id}/followers", get(get_followers))
        .route("/{user_id}/following", get(get_following))
}

/// User response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub followers_count: i32,
    pub following_count: i32,
    pub created_at: DateTime<Utc>,
}

impl From<shortloop_db::entities::user::Model> for UserResponse {
    fn from(u: shortloop_db::entities::user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            bio: u.bio,
            avatar_url: u.avatar_url,
            followers_count: u.followers_count,
            following_count: u.following_count,
            created_at: u.created_at.into(),
        }
    }
}

/// Register request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
}

/// Register response, including the freshly issued API token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user: UserResponse,
    pub token: String,
}

/// Register a new user.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<ApiResponse<RegisterResponse>> {
    let created = state
        .user_service
        .register(RegisterUserInput {
            username: req.username,
            email: req.email,
        })
        .await?;

    let token = created.token.clone().unwrap_or_default();
    Ok(ApiResponse::ok(RegisterResponse {
        user: created.into(),
        token,
    }))
}

/// Search query.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

const fn default_limit() -> u64 {
    20
}

/// Search users by username prefix.
async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<ApiResponse<Vec<UserResponse>>> {
    let users = state.user_service.search(&query.q, query.limit).await?;
    Ok(ApiResponse::ok(users.into_iter().map(Into::into).collect()))
}

/// Profile response: the user plus the viewer's follow state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub is_following: bool,
}

/// Get a user's public profile by username.
async fn get_by_username(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<ApiResponse<ProfileResponse>> {
    let found = state.user_service.get_by_username(&username).await?;

    let is_following = match viewer {
        Some(ref v) if v.id != found.id => {
            state.following_service.is_following(&v.id, &found.id).await?
        }
        _ => false,
    };

    Ok(ApiResponse::ok(ProfileResponse {
        user: found.into(),
        is_following,
    }))
}

/// Update profile request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

/// Update the authenticated user's profile.
async fn update_profile(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<ApiResponse<UserResponse>> {
    let updated = state
        .user_service
        .update_profile(
            &user.id,
            UpdateProfileInput {
                bio: req.bio,
                avatar_url: req.avatar_url,
            },
        )
        .await?;

    Ok(ApiResponse::ok(updated.into()))
}

/// Posts page query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPostsQuery {
    pub until_id: Option<String>,
}

/// Get posts by a user, newest first.
async fn get_user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<UserPostsQuery>,
) -> AppResult<ApiResponse<Vec<PostResponse>>> {
    let posts = state
        .post_service
        .get_user_posts(&user_id, query.until_id.as_deref())
        .await?;
    Ok(ApiResponse::ok(posts.into_iter().map(Into::into).collect()))
}

/// Get posts the authenticated user has saved.
async fn get_saved_posts(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<PostResponse>>> {
    let posts = state.post_service.get_saved_posts(&user.id).await?;
    Ok(ApiResponse::ok(posts.into_iter().map(Into::into).collect()))
}

/// Follow state response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowResponse {
    pub following: bool,
}

/// Toggle following a user.
async fn follow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<FollowResponse>> {
    let following = state
        .following_service
        .follow_toggle(&user.id, &user_id)
        .await?;
    Ok(ApiResponse::ok(FollowResponse { following }))
}

/// Suggest accounts for the authenticated user to follow.
async fn get_suggestions(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<UserResponse>>> {
    let users = state.following_service.get_suggestions(&user.id).await?;
    Ok(ApiResponse::ok(users.into_iter().map(Into::into).collect()))
}

/// List a user's followers.
async fn get_followers(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<Vec<UserResponse>>> {
    let users = state.following_service.get_followers(&user_id).await?;
    Ok(ApiResponse::ok(users.into_iter().map(Into::into).collect()))
}

/// List users a user follows.
async fn get_following(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<ApiResponse<Vec<UserResponse>>> {
    let users = state.following_service.get_following(&user_id).await?;
    Ok(ApiResponse::ok(users.into_iter().map(Into::into).collect()))
}
