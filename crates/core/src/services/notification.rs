//! Notification service.
//!
//! Owns the delivery policy: every notification is persisted, but only
//! some kinds are pushed to the recipient's live channel.

use crate::services::event_publisher::EventPublisherService;
use sea_orm::Set;
use shortloop_common::{AppResult, IdGenerator};
use shortloop_db::{
    entities::notification::{self, NotificationType},
    repositories::NotificationRepository,
};

/// How many notifications a single listing returns.
const LIST_LIMIT: u64 = 50;

/// Whether a notification kind is pushed over the gateway on creation.
///
/// Follow and share notifications are persist-only; the recipient sees
/// them on their next notification fetch.
#[must_use]
pub const fn pushes_realtime(kind: NotificationType) -> bool {
    match kind {
        NotificationType::Like | NotificationType::Comment | NotificationType::Message => true,
        NotificationType::Follow | NotificationType::Share => false,
    }
}

/// Wire name for a notification kind.
#[must_use]
pub const fn kind_str(kind: NotificationType) -> &'static str {
    match kind {
        NotificationType::Like => "like",
        NotificationType::Comment => "comment",
        NotificationType::Follow => "follow",
        NotificationType::Message => "message",
        NotificationType::Share => "share",
    }
}

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    event_publisher: Option<EventPublisherService>,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(notification_repo: NotificationRepository) -> Self {
        Self {
            notification_repo,
            event_publisher: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Create a notification for `user_id` triggered by `notifier_id`.
    ///
    /// Self-notifications are suppressed: returns `Ok(None)` without
    /// touching the database when the two IDs match.
    pub async fn notify(
        &self,
        user_id: &str,
        notifier_id: &str,
        kind: NotificationType,
        post_id: Option<&str>,
    ) -> AppResult<Option<notification::Model>> {
        if user_id == notifier_id {
            return Ok(None);
        }

        let notification_id = self.id_gen.generate();
        let model = notification::ActiveModel {
            id: Set(notification_id.clone()),
            user_id: Set(user_id.to_string()),
            notifier_id: Set(notifier_id.to_string()),
            notification_type: Set(kind),
            post_id: Set(post_id.map(std::string::ToString::to_string)),
            is_read: Set(false),
            created_at: Set(chrono::Utc::now().into()),
        };

        let created = self.notification_repo.create(model).await?;

        if pushes_realtime(kind) {
            if let Some(ref event_publisher) = self.event_publisher {
                if let Err(e) = event_publisher
                    .publish_notification(
                        &notification_id,
                        user_id,
                        kind_str(kind),
                        notifier_id,
                        post_id,
                    )
                    .await
                {
                    tracing::warn!(error = %e, "Failed to publish notification event");
                }
            }
        }

        Ok(Some(created))
    }

    /// Get notifications for a user, newest first.
    pub async fn get_notifications(&self, user_id: &str) -> AppResult<Vec<notification::Model>> {
        self.notification_repo.find_by_user(user_id, LIST_LIMIT).await
    }

    /// Mark one notification as read. Other users' notifications are
    /// silently ignored. Returns whether anything changed.
    pub async fn mark_as_read(&self, user_id: &str, notification_id: &str) -> AppResult<bool> {
        self.notification_repo.mark_as_read(user_id, notification_id).await
    }

    /// Mark all notifications as read for a user.
    pub async fn mark_all_as_read(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.mark_all_as_read(user_id).await
    }

    /// Count unread notifications for a user.
    pub async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.count_unread(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    #[test]
    fn test_realtime_policy() {
        assert!(pushes_realtime(NotificationType::Like));
        assert!(pushes_realtime(NotificationType::Comment));
        assert!(pushes_realtime(NotificationType::Message));
        assert!(!pushes_realtime(NotificationType::Follow));
        assert!(!pushes_realtime(NotificationType::Share));
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(kind_str(NotificationType::Like), "like");
        assert_eq!(kind_str(NotificationType::Share), "share");
    }

    #[tokio::test]
    async fn test_self_notification_suppressed() {
        // No query results appended: any DB access would fail the test.
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = NotificationService::new(NotificationRepository::new(db));

        let result = service
            .notify("user1", "user1", NotificationType::Like, Some("post1"))
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
