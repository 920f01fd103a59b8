//! API endpoints.

mod messages;
mod notifications;
mod posts;
mod users;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/posts", posts::router())
        .nest("/messages", messages::router())
        .nest("/notifications", notifications::router())
        .nest("/users", users::router())
}
