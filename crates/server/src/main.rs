//! Shortloop server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use shortloop_api::{
    ChannelRegistry, RegistryEventPublisher, gateway_handler, middleware::AppState,
    router as api_router,
};
use shortloop_common::Config;
use shortloop_core::{
    EventPublisherService, FollowingService, InteractionService, MessagingService,
    NotificationService, PostService, UserService,
};
use shortloop_db::repositories::{
    CommentRepository, FollowRepository, MessageRepository, NotificationRepository,
    PostRepository, UserRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shortloop=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting shortloop server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = shortloop_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    shortloop_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let post_repo = PostRepository::new(Arc::clone(&db));
    let comment_repo = CommentRepository::new(Arc::clone(&db));
    let follow_repo = FollowRepository::new(Arc::clone(&db));
    let message_repo = MessageRepository::new(Arc::clone(&db));
    let notification_repo = NotificationRepository::new(Arc::clone(&db));

    // Initialize the gateway registry and wire realtime delivery into the
    // services that push events.
    let registry = ChannelRegistry::new();
    let publisher: EventPublisherService =
        Arc::new(RegistryEventPublisher::new(registry.clone()));

    let mut notification_service = NotificationService::new(notification_repo);
    notification_service.set_event_publisher(publisher.clone());

    let mut messaging_service = MessagingService::new(
        message_repo,
        user_repo.clone(),
        notification_service.clone(),
    );
    messaging_service.set_event_publisher(publisher);

    let user_service = UserService::new(user_repo.clone());
    let post_service = PostService::new(post_repo.clone(), user_repo.clone());
    let interaction_service = InteractionService::new(
        post_repo,
        comment_repo,
        user_repo.clone(),
        notification_service.clone(),
    );
    let following_service =
        FollowingService::new(follow_repo, user_repo, notification_service.clone());

    // Create app state
    let state = AppState {
        user_service,
        post_service,
        interaction_service,
        messaging_service,
        notification_service,
        following_service,
        registry,
    };

    // Build router
    let app = Router::new()
        .route("/streaming", get(gateway_handler))
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            shortloop_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
