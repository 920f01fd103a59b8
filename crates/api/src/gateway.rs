//! WebSocket gateway.
//!
//! Each connected client gets events over a per-user channel. The
//! registry maps user IDs to broadcast senders; core services push
//! through [`RegistryEventPublisher`] without knowing about sockets.

use async_trait::async_trait;
use axum::{
    extract::{
        Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use shortloop_common::AppResult;
use shortloop_core::EventPublisher;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tracing::{info, warn};

use crate::middleware::AppState;

/// Events queued per user before the oldest is dropped.
const CHANNEL_CAPACITY: usize = 256;

/// Gateway query parameters.
#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    /// Access token. Mandatory; unauthenticated sockets are closed.
    #[serde(rename = "i")]
    pub token: Option<String>,
}

/// Server-to-client events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum GatewayEvent {
    /// A direct message was delivered to this user (or echoed to its sender).
    #[serde(rename_all = "camelCase")]
    NewMessage {
        id: String,
        sender_id: String,
        recipient_id: String,
        text: String,
    },
    /// A notification was created for this user.
    #[serde(rename_all = "camelCase")]
    NewNotification {
        id: String,
        #[serde(rename = "type")]
        notification_type: String,
        notifier_id: String,
        post_id: Option<String>,
    },
    /// The counterpart in a conversation started or stopped typing.
    #[serde(rename_all = "camelCase")]
    Typing { user_id: String, is_typing: bool },
    /// A client request failed.
    Error { message: String },
}

/// Client-to-server events.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Send a direct message.
    #[serde(rename_all = "camelCase")]
    SendMessage { recipient_id: String, text: String },
    /// Signal typing in a conversation.
    #[serde(rename_all = "camelCase")]
    Typing { recipient_id: String, is_typing: bool },
}

/// Registry of live per-user channels.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<GatewayEvent>>>>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a user, creating their channel if needed.
    pub async fn register(&self, user_id: &str) -> broadcast::Receiver<GatewayEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(user_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Drop a user's channel once their last socket is gone.
    pub async fn deregister(&self, user_id: &str) {
        let mut channels = self.channels.write().await;
        if let Some(tx) = channels.get(user_id) {
            if tx.receiver_count() == 0 {
                channels.remove(user_id);
            }
        }
    }

    /// Send an event to a user. Returns whether anyone was listening.
    pub async fn send(&self, user_id: &str, event: GatewayEvent) -> bool {
        let channels = self.channels.read().await;
        match channels.get(user_id) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Whether a user currently has a live channel.
    pub async fn is_online(&self, user_id: &str) -> bool {
        self.channels.read().await.contains_key(user_id)
    }
}

/// Event publisher backed by the channel registry.
#[derive(Clone)]
pub struct RegistryEventPublisher {
    registry: ChannelRegistry,
}

impl RegistryEventPublisher {
    /// Create a publisher over a registry.
    #[must_use]
    pub const fn new(registry: ChannelRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl EventPublisher for RegistryEventPublisher {
    async fn publish_notification(
        &self,
        id: &str,
        user_id: &str,
        notification_type: &str,
        notifier_id: &str,
        post_id: Option<&str>,
    ) -> AppResult<()> {
        self.registry
            .send(
                user_id,
                GatewayEvent::NewNotification {
                    id: id.to_string(),
                    notification_type: notification_type.to_string(),
                    notifier_id: notifier_id.to_string(),
                    post_id: post_id.map(std::string::ToString::to_string),
                },
            )
            .await;
        Ok(())
    }

    async fn publish_message(
        &self,
        id: &str,
        sender_id: &str,
        recipient_id: &str,
        text: &str,
    ) -> AppResult<()> {
        let event = GatewayEvent::NewMessage {
            id: id.to_string(),
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
            text: text.to_string(),
        };

        // Echo to the sender's own channel so all their devices see it.
        self.registry.send(recipient_id, event.clone()).await;
        self.registry.send(sender_id, event).await;
        Ok(())
    }

    async fn publish_typing(
        &self,
        sender_id: &str,
        recipient_id: &str,
        is_typing: bool,
    ) -> AppResult<()> {
        self.registry
            .send(
                recipient_id,
                GatewayEvent::Typing {
                    user_id: sender_id.to_string(),
                    is_typing,
                },
            )
            .await;
        Ok(())
    }
}

/// WebSocket handler for the gateway.
pub async fn gateway_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<GatewayQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, query, state))
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, query: GatewayQuery, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Authentication is mandatory; unauthenticated sockets get a policy
    // close frame before any event flows.
    let close = Message::Close(Some(CloseFrame {
        code: close_code::POLICY,
        reason: "unauthorized".into(),
    }));
    let user = match query.token {
        Some(ref token) => match state.user_service.authenticate_by_token(token).await {
            Ok(u) => u,
            Err(e) => {
                warn!(error = %e, "Gateway auth failed");
                let _ = sender.send(close).await;
                return;
            }
        },
        None => {
            warn!("Gateway connection without token");
            let _ = sender.send(close).await;
            return;
        }
    };

    let user_id = user.id;
    let mut rx = state.registry.register(&user_id).await;

    info!(user_id = %user_id, "Gateway connection established");

    loop {
        tokio::select! {
            // Client frames
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => {
                                if let Err(e) = handle_client_event(event, &user_id, &state).await {
                                    let error = GatewayEvent::Error { message: e.to_string() };
                                    let json = serde_json::to_string(&error).unwrap_or_default();
                                    if sender.send(Message::Text(json.into())).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "Failed to parse client event");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            // Events pushed to this user's channel
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        let json = serde_json::to_string(&event).unwrap_or_default();
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(user_id = %user_id, skipped, "Gateway channel lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        }
    }

    state.registry.deregister(&user_id).await;
    info!(user_id = %user_id, "Gateway connection closed");
}

/// Dispatch a client event to the owning service.
async fn handle_client_event(event: ClientEvent, user_id: &str, state: &AppState) -> AppResult<()> {
    match event {
        ClientEvent::SendMessage { recipient_id, text } => {
            state
                .messaging_service
                .send_message(user_id, &recipient_id, &text)
                .await?;
        }
        ClientEvent::Typing {
            recipient_id,
            is_typing,
        } => {
            state
                .messaging_service
                .typing(user_id, &recipient_id, is_typing)
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_delivers_to_subscriber() {
        let registry = ChannelRegistry::new();
        let mut rx = registry.register("alice").await;

        let delivered = registry
            .send(
                "alice",
                GatewayEvent::Typing {
                    user_id: "bob".to_string(),
                    is_typing: true,
                },
            )
            .await;
        assert!(delivered);

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            GatewayEvent::Typing {
                user_id: "bob".to_string(),
                is_typing: true,
            }
        );
    }

    #[tokio::test]
    async fn test_registry_send_to_offline_user() {
        let registry = ChannelRegistry::new();
        let delivered = registry
            .send(
                "nobody",
                GatewayEvent::Typing {
                    user_id: "bob".to_string(),
                    is_typing: true,
                },
            )
            .await;
        assert!(!delivered);
    }

    #[tokio::test]
    async fn test_registry_deregister_removes_idle_channel() {
        let registry = ChannelRegistry::new();
        let rx = registry.register("alice").await;
        assert!(registry.is_online("alice").await);

        drop(rx);
        registry.deregister("alice").await;
        assert!(!registry.is_online("alice").await);
    }

    #[tokio::test]
    async fn test_registry_deregister_keeps_live_channel() {
        let registry = ChannelRegistry::new();
        let _rx1 = registry.register("alice").await;
        let rx2 = registry.register("alice").await;

        // One socket closing must not tear down the other's channel.
        drop(rx2);
        registry.deregister("alice").await;
        assert!(registry.is_online("alice").await);
    }

    #[tokio::test]
    async fn test_publisher_echoes_message_to_sender() {
        let registry = ChannelRegistry::new();
        let mut sender_rx = registry.register("alice").await;
        let mut recipient_rx = registry.register("bob").await;

        let publisher = RegistryEventPublisher::new(registry);
        publisher
            .publish_message("m1", "alice", "bob", "hi")
            .await
            .unwrap();

        let expected = GatewayEvent::NewMessage {
            id: "m1".to_string(),
            sender_id: "alice".to_string(),
            recipient_id: "bob".to_string(),
            text: "hi".to_string(),
        };
        assert_eq!(recipient_rx.recv().await.unwrap(), expected);
        assert_eq!(sender_rx.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_publisher_typing_not_echoed() {
        let registry = ChannelRegistry::new();
        let mut sender_rx = registry.register("alice").await;
        let mut recipient_rx = registry.register("bob").await;

        let publisher = RegistryEventPublisher::new(registry);
        publisher.publish_typing("alice", "bob", true).await.unwrap();

        assert_eq!(
            recipient_rx.recv().await.unwrap(),
            GatewayEvent::Typing {
                user_id: "alice".to_string(),
                is_typing: true,
            }
        );
        assert!(sender_rx.try_recv().is_err());
    }

    #[test]
    fn test_gateway_event_wire_format() {
        let event = GatewayEvent::NewNotification {
            id: "n1".to_string(),
            notification_type: "like".to_string(),
            notifier_id: "bob".to_string(),
            post_id: Some("p1".to_string()),
        };

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["type"], "newNotification");
        assert_eq!(json["body"]["type"], "like");
        assert_eq!(json["body"]["notifierId"], "bob");
        assert_eq!(json["body"]["postId"], "p1");
    }

    #[test]
    fn test_client_event_parse() {
        let json = r#"{"type":"sendMessage","body":{"recipientId":"bob","text":"hi"}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(
            event,
            ClientEvent::SendMessage { recipient_id, text }
                if recipient_id == "bob" && text == "hi"
        ));

        let json = r#"{"type":"typing","body":{"recipientId":"bob","isTyping":false}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(
            event,
            ClientEvent::Typing { recipient_id, is_typing }
                if recipient_id == "bob" && !is_typing
        ));
    }
}
