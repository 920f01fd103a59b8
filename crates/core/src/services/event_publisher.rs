//! Event publisher service.
//!
//! Provides an abstraction for pushing real-time events to connected
//! clients. The actual implementation lives in the api crate on top of
//! the gateway's channel registry.

use async_trait::async_trait;
use shortloop_common::AppResult;
use std::sync::Arc;

/// Trait for publishing real-time events.
///
/// This allows the core services to push events without directly
/// depending on the WebSocket gateway.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a notification event to its recipient.
    async fn publish_notification(
        &self,
        id: &str,
        user_id: &str,
        notification_type: &str,
        notifier_id: &str,
        post_id: Option<&str>,
    ) -> AppResult<()>;

    /// Publish a new direct message to both participants.
    async fn publish_message(
        &self,
        id: &str,
        sender_id: &str,
        recipient_id: &str,
        text: &str,
    ) -> AppResult<()>;

    /// Relay a typing indicator to the recipient.
    async fn publish_typing(
        &self,
        sender_id: &str,
        recipient_id: &str,
        is_typing: bool,
    ) -> AppResult<()>;
}

/// A no-op implementation for tests or when real-time delivery is disabled.
#[derive(Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish_notification(
        &self,
        _id: &str,
        _user_id: &str,
        _notification_type: &str,
        _notifier_id: &str,
        _post_id: Option<&str>,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn publish_message(
        &self,
        _id: &str,
        _sender_id: &str,
        _recipient_id: &str,
        _text: &str,
    ) -> AppResult<()> {
        Ok(())
    }

    async fn publish_typing(
        &self,
        _sender_id: &str,
        _recipient_id: &str,
        _is_typing: bool,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// Wrapper for boxed `EventPublisher` trait object.
pub type EventPublisherService = Arc<dyn EventPublisher>;
