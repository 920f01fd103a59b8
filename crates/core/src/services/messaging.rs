//! Messaging service for direct messages.

use crate::services::event_publisher::EventPublisherService;
use crate::services::notification::NotificationService;
use sea_orm::Set;
use serde::Serialize;
use shortloop_common::{AppError, AppResult, IdGenerator};
use shortloop_db::{
    entities::{message, notification::NotificationType},
    repositories::{MessageRepository, UserRepository},
};

/// How many messages the conversation fold scans per listing.
const SCAN_LIMIT: u64 = 500;

/// Default page size when fetching a single conversation.
const CONVERSATION_LIMIT: u64 = 200;

/// A message with both participants resolved for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub recipient_id: String,
    pub recipient_username: String,
    pub text: String,
    pub is_read: bool,
    pub created_at: sea_orm::prelude::DateTimeWithTimeZone,
}

/// Conversation summary for listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub partner_id: String,
    pub partner_username: String,
    pub partner_avatar_url: Option<String>,
    pub last_message: message::Model,
    pub unread_count: u64,
}

/// Per-partner accumulator produced by the conversation fold.
#[derive(Debug, Clone)]
struct ConversationFold {
    partner_id: String,
    last_message: message::Model,
    unread_count: u64,
}

/// Fold a newest-first message scan into one entry per counterpart.
///
/// The first message seen for a partner is the latest one; unread counts
/// only consider messages addressed to `user_id`. Output order is the
/// order partners were first encountered, i.e. most recent conversation
/// first.
fn fold_conversations(user_id: &str, messages: Vec<message::Model>) -> Vec<ConversationFold> {
    let mut folds: Vec<ConversationFold> = Vec::new();

    for msg in messages {
        let partner_id = if msg.sender_id == user_id {
            msg.recipient_id.clone()
        } else {
            msg.sender_id.clone()
        };

        let unread = msg.recipient_id == user_id && !msg.is_read;

        match folds.iter_mut().find(|f| f.partner_id == partner_id) {
            Some(fold) => {
                if unread {
                    fold.unread_count += 1;
                }
            }
            None => folds.push(ConversationFold {
                partner_id,
                last_message: msg,
                unread_count: u64::from(unread),
            }),
        }
    }

    folds
}

/// Messaging service.
#[derive(Clone)]
pub struct MessagingService {
    message_repo: MessageRepository,
    user_repo: UserRepository,
    notification: NotificationService,
    event_publisher: Option<EventPublisherService>,
    id_gen: IdGenerator,
}

impl MessagingService {
    /// Create a new messaging service.
    #[must_use]
    pub const fn new(
        message_repo: MessageRepository,
        user_repo: UserRepository,
        notification: NotificationService,
    ) -> Self {
        Self {
            message_repo,
            user_repo,
            notification,
            event_publisher: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Send a message to another user.
    ///
    /// Persists the message, pushes it to both participants' channels
    /// and records a message notification for the recipient.
    pub async fn send_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        text: &str,
    ) -> AppResult<MessageView> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Message text must not be empty".to_string()));
        }

        if sender_id == recipient_id {
            return Err(AppError::BadRequest(
                "Cannot send message to yourself".to_string(),
            ));
        }

        let recipient = self.user_repo.get_by_id(recipient_id).await?;
        let sender = self.user_repo.get_by_id(sender_id).await?;

        let model = message::ActiveModel {
            id: Set(self.id_gen.generate()),
            sender_id: Set(sender_id.to_string()),
            recipient_id: Set(recipient_id.to_string()),
            text: Set(text.to_string()),
            is_read: Set(false),
            created_at: Set(chrono::Utc::now().into()),
        };

        let msg = self.message_repo.create(model).await?;

        if let Some(ref event_publisher) = self.event_publisher {
            if let Err(e) = event_publisher
                .publish_message(&msg.id, sender_id, recipient_id, &msg.text)
                .await
            {
                tracing::warn!(error = %e, "Failed to publish message event");
            }
        }

        self.notification
            .notify(recipient_id, sender_id, NotificationType::Message, None)
            .await?;

        Ok(MessageView {
            id: msg.id,
            sender_id: msg.sender_id,
            sender_username: sender.username,
            recipient_id: msg.recipient_id,
            recipient_username: recipient.username,
            text: msg.text,
            is_read: msg.is_read,
            created_at: msg.created_at,
        })
    }

    /// Get messages between the user and a partner, oldest first.
    ///
    /// Opening a conversation marks everything the partner sent as read.
    pub async fn get_messages(
        &self,
        user_id: &str,
        partner_id: &str,
    ) -> AppResult<Vec<message::Model>> {
        self.user_repo.get_by_id(partner_id).await?;

        self.message_repo.mark_as_read(user_id, partner_id).await?;

        self.message_repo
            .find_conversation(user_id, partner_id, CONVERSATION_LIMIT)
            .await
    }

    /// Get conversation summaries for a user, most recent first.
    pub async fn get_conversations(&self, user_id: &str) -> AppResult<Vec<ConversationSummary>> {
        let messages = self.message_repo.find_by_user(user_id, SCAN_LIMIT).await?;
        let folds = fold_conversations(user_id, messages);

        let mut summaries = Vec::with_capacity(folds.len());
        for fold in folds {
            // Partners deleted since their last message just drop out.
            if let Some(partner) = self.user_repo.find_by_id(&fold.partner_id).await? {
                summaries.push(ConversationSummary {
                    partner_id: partner.id,
                    partner_username: partner.username,
                    partner_avatar_url: partner.avatar_url,
                    last_message: fold.last_message,
                    unread_count: fold.unread_count,
                });
            }
        }

        Ok(summaries)
    }

    /// Count unread messages for a user.
    pub async fn get_unread_count(&self, user_id: &str) -> AppResult<u64> {
        self.message_repo.count_unread(user_id).await
    }

    /// Relay a typing indicator to the recipient. Never persisted.
    pub async fn typing(
        &self,
        sender_id: &str,
        recipient_id: &str,
        is_typing: bool,
    ) -> AppResult<()> {
        if let Some(ref event_publisher) = self.event_publisher {
            event_publisher
                .publish_typing(sender_id, recipient_id, is_typing)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use shortloop_db::entities::user;
    use shortloop_db::repositories::NotificationRepository;
    use std::sync::Arc;

    fn create_test_message(
        id: &str,
        sender: &str,
        recipient: &str,
        is_read: bool,
        age_secs: i64,
    ) -> message::Model {
        message::Model {
            id: id.to_string(),
            sender_id: sender.to_string(),
            recipient_id: recipient.to_string(),
            text: format!("msg {id}"),
            is_read,
            created_at: (Utc::now() - Duration::seconds(age_secs)).into(),
        }
    }

    fn create_test_user(id: &str, username: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: username.to_string(),
            username_lower: username.to_lowercase(),
            email: format!("{username}@example.com"),
            token: None,
            bio: None,
            avatar_url: None,
            followers_count: 0,
            following_count: 0,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn make_service(message_db: MockDatabase, user_db: MockDatabase) -> MessagingService {
        let notification_db =
            Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        MessagingService::new(
            MessageRepository::new(Arc::new(message_db.into_connection())),
            UserRepository::new(Arc::new(user_db.into_connection())),
            NotificationService::new(NotificationRepository::new(notification_db)),
        )
    }

    #[test]
    fn test_fold_groups_by_partner() {
        // Newest first: bob's unread, then an older exchange with carol.
        let messages = vec![
            create_test_message("m3", "bob", "alice", false, 10),
            create_test_message("m2", "alice", "carol", true, 20),
            create_test_message("m1", "carol", "alice", true, 30),
        ];

        let folds = fold_conversations("alice", messages);
        assert_eq!(folds.len(), 2);

        assert_eq!(folds[0].partner_id, "bob");
        assert_eq!(folds[0].last_message.id, "m3");
        assert_eq!(folds[0].unread_count, 1);

        assert_eq!(folds[1].partner_id, "carol");
        assert_eq!(folds[1].last_message.id, "m2");
        assert_eq!(folds[1].unread_count, 0);
    }

    #[test]
    fn test_fold_counts_only_incoming_unread() {
        // An unread message alice sent must not count against her.
        let messages = vec![
            create_test_message("m2", "alice", "bob", false, 10),
            create_test_message("m1", "bob", "alice", false, 20),
        ];

        let folds = fold_conversations("alice", messages);
        assert_eq!(folds.len(), 1);
        assert_eq!(folds[0].unread_count, 1);
        assert_eq!(folds[0].last_message.id, "m2");
    }

    #[test]
    fn test_fold_empty() {
        let folds = fold_conversations("alice", vec![]);
        assert!(folds.is_empty());
    }

    #[tokio::test]
    async fn test_send_message_to_self() {
        let service = make_service(
            MockDatabase::new(DatabaseBackend::Postgres),
            MockDatabase::new(DatabaseBackend::Postgres),
        );

        let result = service.send_message("alice", "alice", "hi").await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_send_message_empty_text() {
        let service = make_service(
            MockDatabase::new(DatabaseBackend::Postgres),
            MockDatabase::new(DatabaseBackend::Postgres),
        );

        let result = service.send_message("alice", "bob", "  ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_send_message_unknown_recipient() {
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()]);
        let service = make_service(MockDatabase::new(DatabaseBackend::Postgres), user_db);

        let result = service.send_message("alice", "ghost", "hi").await;
        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_get_conversations_hydrates_partner() {
        let messages = vec![create_test_message("m1", "bob", "alice", false, 10)];
        let message_db =
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([messages]);
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user("bob", "Bob")]]);
        let service = make_service(message_db, user_db);

        let summaries = service.get_conversations("alice").await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].partner_username, "Bob");
        assert_eq!(summaries[0].unread_count, 1);
        assert_eq!(summaries[0].last_message.id, "m1");
    }
}
