//! Following service.

use crate::services::notification::NotificationService;
use sea_orm::Set;
use shortloop_common::{AppError, AppResult, IdGenerator};
use shortloop_db::{
    entities::{follow, notification::NotificationType, user},
    repositories::{FollowRepository, UserRepository},
};

/// Default page size for follower listings.
const LIST_LIMIT: u64 = 100;

/// How many follow suggestions a listing returns.
const SUGGESTION_LIMIT: u64 = 20;

/// Following service for business logic.
#[derive(Clone)]
pub struct FollowingService {
    follow_repo: FollowRepository,
    user_repo: UserRepository,
    notification: NotificationService,
    id_gen: IdGenerator,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub const fn new(
        follow_repo: FollowRepository,
        user_repo: UserRepository,
        notification: NotificationService,
    ) -> Self {
        Self {
            follow_repo,
            user_repo,
            notification,
            id_gen: IdGenerator::new(),
        }
    }

    /// Toggle the follow relation. Returns whether the actor follows the
    /// target after the toggle.
    ///
    /// The removal runs first so two racing toggles settle on one state;
    /// the unique pair index backstops the insert.
    pub async fn follow_toggle(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        if follower_id == followee_id {
            return Err(AppError::Forbidden("Cannot follow yourself".to_string()));
        }

        self.user_repo.get_by_id(followee_id).await?;

        let removed = self.follow_repo.delete(follower_id, followee_id).await?;
        if removed {
            self.user_repo.decrement_followers_count(followee_id).await?;
            self.user_repo.decrement_following_count(follower_id).await?;
            return Ok(false);
        }

        let model = follow::ActiveModel {
            id: Set(self.id_gen.generate()),
            follower_id: Set(follower_id.to_string()),
            followee_id: Set(followee_id.to_string()),
            created_at: Set(chrono::Utc::now().into()),
        };

        if self.follow_repo.insert(model).await? {
            self.user_repo.increment_followers_count(followee_id).await?;
            self.user_repo.increment_following_count(follower_id).await?;

            // Persist-only kind: no realtime push for follows.
            self.notification
                .notify(followee_id, follower_id, NotificationType::Follow, None)
                .await?;
        }

        Ok(true)
    }

    /// Check whether one user follows another.
    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        self.follow_repo.exists(follower_id, followee_id).await
    }

    /// List users following `user_id`.
    pub async fn get_followers(&self, user_id: &str) -> AppResult<Vec<user::Model>> {
        let ids = self.follow_repo.find_follower_ids(user_id, LIST_LIMIT).await?;
        self.hydrate(ids).await
    }

    /// List users that `user_id` follows.
    pub async fn get_following(&self, user_id: &str) -> AppResult<Vec<user::Model>> {
        let ids = self.follow_repo.find_following_ids(user_id, LIST_LIMIT).await?;
        self.hydrate(ids).await
    }

    /// Suggest users to follow: anyone not already followed, most
    /// followed first.
    pub async fn get_suggestions(&self, user_id: &str) -> AppResult<Vec<user::Model>> {
        let following = self.follow_repo.find_following_ids(user_id, LIST_LIMIT).await?;
        self.user_repo
            .find_suggestions(user_id, &following, SUGGESTION_LIMIT)
            .await
    }

    async fn hydrate(&self, ids: Vec<String>) -> AppResult<Vec<user::Model>> {
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(u) = self.user_repo.find_by_id(&id).await? {
                users.push(u);
            }
        }
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use shortloop_db::repositories::NotificationRepository;
    use std::sync::Arc;

    fn create_test_user(id: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: id.to_string(),
            username_lower: id.to_lowercase(),
            email: format!("{id}@example.com"),
            token: None,
            bio: None,
            avatar_url: None,
            followers_count: 0,
            following_count: 0,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn make_service(follow_db: MockDatabase, user_db: MockDatabase) -> FollowingService {
        let notification_db =
            Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        FollowingService::new(
            FollowRepository::new(Arc::new(follow_db.into_connection())),
            UserRepository::new(Arc::new(user_db.into_connection())),
            NotificationService::new(NotificationRepository::new(notification_db)),
        )
    }

    #[tokio::test]
    async fn test_follow_self() {
        let service = make_service(
            MockDatabase::new(DatabaseBackend::Postgres),
            MockDatabase::new(DatabaseBackend::Postgres),
        );

        let result = service.follow_toggle("alice", "alice").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_follow_unknown_user() {
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()]);
        let service = make_service(MockDatabase::new(DatabaseBackend::Postgres), user_db);

        let result = service.follow_toggle("alice", "ghost").await;
        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_is_following_reads_relation_row() {
        let row = follow::Model {
            id: "f1".to_string(),
            follower_id: "alice".to_string(),
            followee_id: "bob".to_string(),
            created_at: Utc::now().into(),
        };
        let follow_db =
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![row]]);
        let service = make_service(follow_db, MockDatabase::new(DatabaseBackend::Postgres));

        assert!(service.is_following("alice", "bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_toggle_removes_existing_relation() {
        use sea_orm::MockExecResult;

        // Delete hits an existing row, so the toggle lands on "not
        // following" and both counters come down.
        let follow_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }]);
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user("bob")]])
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ]);
        let service = make_service(follow_db, user_db);

        let following = service.follow_toggle("alice", "bob").await.unwrap();
        assert!(!following);
    }
}
