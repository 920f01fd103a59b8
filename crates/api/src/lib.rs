//! HTTP API layer for shortloop.
//!
//! This crate provides the REST API and the real-time gateway:
//!
//! - **Endpoints**: posts, comments, messaging, notifications, users
//! - **Extractors**: token authentication
//! - **Middleware**: auth, logging, CORS
//! - **Gateway**: per-user WebSocket channels
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod gateway;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use gateway::{ChannelRegistry, GatewayEvent, RegistryEventPublisher, gateway_handler};
