//! API middleware.

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use shortloop_core::{
    FollowingService, InteractionService, MessagingService, NotificationService, PostService,
    UserService,
};

use crate::gateway::ChannelRegistry;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub post_service: PostService,
    pub interaction_service: InteractionService,
    pub messaging_service: MessagingService,
    pub notification_service: NotificationService,
    pub following_service: FollowingService,
    pub registry: ChannelRegistry,
}

/// Authentication middleware.
///
/// Resolves a bearer token to a user and stashes the model in request
/// extensions. Requests without a valid token pass through; handlers
/// using `AuthUser` reject them.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
        && let Ok(user) = state.user_service.authenticate_by_token(token).await
    {
        req.extensions_mut().insert(user);
    }

    next.run(req).await
}
