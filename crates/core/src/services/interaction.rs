//! Interaction service.
//!
//! Business logic for likes, saves, comments, replies, shares and view
//! counting on posts.

use crate::services::notification::NotificationService;
use sea_orm::Set;
use serde::Serialize;
use shortloop_common::{AppError, AppResult, IdGenerator};
use shortloop_db::{
    entities::{
        comment, comment_like, comment_reply, notification::NotificationType, post_like,
        post_save, user,
    },
    repositories::{CommentRepository, PostRepository, UserRepository},
};
use std::collections::HashMap;

/// Outcome of a like or save toggle.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ToggleResult {
    /// Whether the relation exists after the toggle.
    pub active: bool,
    /// Total count after the toggle.
    pub count: u64,
}

/// Display fields for a comment or reply author.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

impl From<user::Model> for AuthorSummary {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            avatar_url: u.avatar_url,
        }
    }
}

/// A reply under a comment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyView {
    pub id: String,
    pub author: AuthorSummary,
    pub text: String,
    pub created_at: sea_orm::prelude::DateTimeWithTimeZone,
}

/// A comment with its author, replies and like state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: String,
    pub author: AuthorSummary,
    pub text: String,
    pub created_at: sea_orm::prelude::DateTimeWithTimeZone,
    pub likes_count: u64,
    pub liked_by_me: bool,
    pub replies: Vec<ReplyView>,
}

/// One page of a post's comments, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPage {
    pub comments: Vec<CommentView>,
    pub total: u64,
    pub page: u64,
    pub total_pages: u64,
}

/// Interaction service for business logic.
#[derive(Clone)]
pub struct InteractionService {
    post_repo: PostRepository,
    comment_repo: CommentRepository,
    user_repo: UserRepository,
    notification: NotificationService,
    id_gen: IdGenerator,
}

impl InteractionService {
    /// Create a new interaction service.
    #[must_use]
    pub const fn new(
        post_repo: PostRepository,
        comment_repo: CommentRepository,
        user_repo: UserRepository,
        notification: NotificationService,
    ) -> Self {
        Self {
            post_repo,
            comment_repo,
            user_repo,
            notification,
            id_gen: IdGenerator::new(),
        }
    }

    /// Resolve author display fields for a batch of user IDs.
    ///
    /// IDs whose user vanished mid-scan are simply absent from the map.
    async fn resolve_authors(
        &self,
        ids: impl IntoIterator<Item = String>,
    ) -> AppResult<HashMap<String, AuthorSummary>> {
        let mut authors = HashMap::new();
        for id in ids {
            if authors.contains_key(&id) {
                continue;
            }
            if let Some(u) = self.user_repo.find_by_id(&id).await? {
                authors.insert(id, AuthorSummary::from(u));
            }
        }
        Ok(authors)
    }

    // ==================== Likes ====================

    /// Toggle a like on a post.
    ///
    /// The removal runs first so two racing toggles settle on one state
    /// instead of both reading "not liked" and double-inserting.
    pub async fn like_toggle(&self, user_id: &str, post_id: &str) -> AppResult<ToggleResult> {
        let post = self.post_repo.get_by_id(post_id).await?;

        let removed = self.post_repo.delete_like(post_id, user_id).await?;
        let active = if removed {
            false
        } else {
            let model = post_like::ActiveModel {
                id: Set(self.id_gen.generate()),
                post_id: Set(post_id.to_string()),
                user_id: Set(user_id.to_string()),
                created_at: Set(chrono::Utc::now().into()),
            };
            let inserted = self.post_repo.insert_like(model).await?;

            if inserted {
                self.notification
                    .notify(&post.user_id, user_id, NotificationType::Like, Some(post_id))
                    .await?;
            }
            true
        };

        let count = self.post_repo.count_likes(post_id).await?;
        Ok(ToggleResult { active, count })
    }

    // ==================== Saves ====================

    /// Toggle a save on a post. Saves never notify.
    pub async fn save_toggle(&self, user_id: &str, post_id: &str) -> AppResult<ToggleResult> {
        self.post_repo.get_by_id(post_id).await?;

        let removed = self.post_repo.delete_save(post_id, user_id).await?;
        let active = if removed {
            false
        } else {
            let model = post_save::ActiveModel {
                id: Set(self.id_gen.generate()),
                post_id: Set(post_id.to_string()),
                user_id: Set(user_id.to_string()),
                created_at: Set(chrono::Utc::now().into()),
            };
            self.post_repo.insert_save(model).await?;
            true
        };

        let count = self.post_repo.count_saves(post_id).await?;
        Ok(ToggleResult { active, count })
    }

    // ==================== Comments ====================

    /// Add a comment to a post. Returns the comment with its author
    /// resolved, no likes and no replies.
    pub async fn add_comment(
        &self,
        user_id: &str,
        post_id: &str,
        text: &str,
    ) -> AppResult<CommentView> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Comment text must not be empty".to_string()));
        }
        if text.len() > comment::MAX_TEXT_LEN {
            return Err(AppError::Validation(format!(
                "Comment text must be at most {} characters",
                comment::MAX_TEXT_LEN
            )));
        }

        let post = self.post_repo.get_by_id(post_id).await?;
        if !post.allow_comments {
            return Err(AppError::Forbidden(
                "Comments are disabled on this post".to_string(),
            ));
        }

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(post_id.to_string()),
            user_id: Set(user_id.to_string()),
            text: Set(text.to_string()),
            created_at: Set(chrono::Utc::now().into()),
        };

        let author = self.user_repo.get_by_id(user_id).await?;
        let created = self.comment_repo.create(model).await?;
        self.post_repo.increment_comments_count(post_id).await?;

        self.notification
            .notify(&post.user_id, user_id, NotificationType::Comment, Some(post_id))
            .await?;

        Ok(CommentView {
            id: created.id,
            author: author.into(),
            text: created.text,
            created_at: created.created_at,
            likes_count: 0,
            liked_by_me: false,
            replies: vec![],
        })
    }

    /// Delete a comment.
    ///
    /// Allowed for the comment author and for the owner of the post the
    /// comment sits on.
    pub async fn delete_comment(&self, user_id: &str, comment_id: &str) -> AppResult<()> {
        let comment = self.comment_repo.get_by_id(comment_id).await?;
        let post = self.post_repo.get_by_id(&comment.post_id).await?;

        if comment.user_id != user_id && post.user_id != user_id {
            return Err(AppError::Forbidden(
                "Cannot delete another user's comment".to_string(),
            ));
        }

        self.comment_repo.delete(comment_id).await?;
        self.post_repo.decrement_comments_count(&comment.post_id).await?;

        Ok(())
    }

    /// Toggle a like on a comment. Comment likes never notify.
    pub async fn like_comment(&self, user_id: &str, comment_id: &str) -> AppResult<ToggleResult> {
        self.comment_repo.get_by_id(comment_id).await?;

        let removed = self.comment_repo.delete_like(comment_id, user_id).await?;
        let active = if removed {
            false
        } else {
            let model = comment_like::ActiveModel {
                id: Set(self.id_gen.generate()),
                comment_id: Set(comment_id.to_string()),
                user_id: Set(user_id.to_string()),
                created_at: Set(chrono::Utc::now().into()),
            };
            self.comment_repo.insert_like(model).await?;
            true
        };

        let count = self.comment_repo.count_likes(comment_id).await?;
        Ok(ToggleResult { active, count })
    }

    /// Reply to a comment. Replies are flat; a reply cannot be replied to.
    pub async fn reply_to_comment(
        &self,
        user_id: &str,
        comment_id: &str,
        text: &str,
    ) -> AppResult<ReplyView> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Reply text must not be empty".to_string()));
        }
        if text.len() > comment_reply::MAX_TEXT_LEN {
            return Err(AppError::Validation(format!(
                "Reply text must be at most {} characters",
                comment_reply::MAX_TEXT_LEN
            )));
        }

        self.comment_repo.get_by_id(comment_id).await?;
        let author = self.user_repo.get_by_id(user_id).await?;

        let model = comment_reply::ActiveModel {
            id: Set(self.id_gen.generate()),
            comment_id: Set(comment_id.to_string()),
            user_id: Set(user_id.to_string()),
            text: Set(text.to_string()),
            created_at: Set(chrono::Utc::now().into()),
        };

        let created = self.comment_repo.create_reply(model).await?;
        Ok(ReplyView {
            id: created.id,
            author: author.into(),
            text: created.text,
            created_at: created.created_at,
        })
    }

    /// Get one page of a post's comments, newest first, with authors,
    /// replies and like state for the viewing user resolved.
    ///
    /// `page` is 1-based; a zero page reads as page 1.
    pub async fn get_comments(
        &self,
        post_id: &str,
        viewer_id: Option<&str>,
        page: u64,
        limit: u64,
    ) -> AppResult<CommentPage> {
        self.post_repo.get_by_id(post_id).await?;

        let page = page.max(1);
        let limit = limit.max(1);
        let offset = (page - 1) * limit;

        let total = self.comment_repo.count_by_post(post_id).await?;
        let comments = self.comment_repo.find_by_post(post_id, limit, offset).await?;

        let comment_ids: Vec<String> = comments.iter().map(|c| c.id.clone()).collect();
        let replies = self
            .comment_repo
            .find_replies_for_comments(&comment_ids)
            .await?;

        // Ids collected up front; the lookup must not borrow the rows
        // across the await.
        let author_ids: Vec<String> = comments
            .iter()
            .map(|c| c.user_id.clone())
            .chain(replies.iter().map(|r| r.user_id.clone()))
            .collect();
        let authors = self.resolve_authors(author_ids).await?;

        let mut replies_by_comment: HashMap<String, Vec<ReplyView>> = HashMap::new();
        for reply in replies {
            let Some(author) = authors.get(&reply.user_id) else {
                continue;
            };
            replies_by_comment
                .entry(reply.comment_id.clone())
                .or_default()
                .push(ReplyView {
                    id: reply.id,
                    author: author.clone(),
                    text: reply.text,
                    created_at: reply.created_at,
                });
        }

        let mut views = Vec::with_capacity(comments.len());
        for comment in comments {
            let Some(author) = authors.get(&comment.user_id) else {
                continue;
            };

            let likes_count = self.comment_repo.count_likes(&comment.id).await?;
            let liked_by_me = match viewer_id {
                Some(viewer) => self.comment_repo.has_liked(&comment.id, viewer).await?,
                None => false,
            };

            views.push(CommentView {
                replies: replies_by_comment.remove(&comment.id).unwrap_or_default(),
                id: comment.id,
                author: author.clone(),
                text: comment.text,
                created_at: comment.created_at,
                likes_count,
                liked_by_me,
            });
        }

        Ok(CommentPage {
            comments: views,
            total,
            page,
            total_pages: total.div_ceil(limit),
        })
    }

    // ==================== Shares ====================

    /// Share a post. The counter always bumps; the post owner gets a
    /// `share` notification only when the share targets a specific user.
    /// Returns the share count after the bump.
    pub async fn share_post(
        &self,
        user_id: &str,
        post_id: &str,
        shared_with: Option<&str>,
    ) -> AppResult<i32> {
        let post = self.post_repo.get_by_id(post_id).await?;
        self.post_repo.increment_shares(post_id).await?;

        if shared_with.is_some() {
            self.notification
                .notify(&post.user_id, user_id, NotificationType::Share, Some(post_id))
                .await?;
        }

        let post = self.post_repo.get_by_id(post_id).await?;
        Ok(post.shares)
    }

    // ==================== Views ====================

    /// Record a view on a post. Unknown ids are a no-op: the bump
    /// matches zero rows and nothing else happens.
    pub async fn increment_view(&self, post_id: &str) -> AppResult<()> {
        self.post_repo.increment_views(post_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use shortloop_db::entities::post;
    use shortloop_db::repositories::NotificationRepository;
    use std::sync::Arc;

    fn create_test_post(id: &str, user_id: &str, allow_comments: bool) -> post::Model {
        post::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            video_url: "https://cdn.example.com/v.mp4".to_string(),
            thumbnail_url: None,
            caption: None,
            comments_count: 0,
            shares: 0,
            views: 0,
            allow_comments,
            created_at: Utc::now().into(),
        }
    }

    fn create_test_comment(id: &str, post_id: &str, user_id: &str) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
            text: "nice".to_string(),
            created_at: Utc::now().into(),
        }
    }

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

    fn make_service(
        post_db: MockDatabase,
        comment_db: MockDatabase,
        user_db: MockDatabase,
    ) -> InteractionService {
        let notification_db =
            Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        InteractionService::new(
            PostRepository::new(Arc::new(post_db.into_connection())),
            CommentRepository::new(Arc::new(comment_db.into_connection())),
            UserRepository::new(Arc::new(user_db.into_connection())),
            NotificationService::new(NotificationRepository::new(notification_db)),
        )
    }

    fn empty_db() -> MockDatabase {
        MockDatabase::new(DatabaseBackend::Postgres)
    }

    #[tokio::test]
    async fn test_add_comment_empty_text() {
        let service = make_service(empty_db(), empty_db(), empty_db());

        let result = service.add_comment("user1", "post1", "   ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_add_comment_too_long() {
        let service = make_service(empty_db(), empty_db(), empty_db());

        let text = "a".repeat(comment::MAX_TEXT_LEN + 1);
        let result = service.add_comment("user1", "post1", &text).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_add_comment_comments_disabled() {
        let post = create_test_post("post1", "owner", false);
        let post_db =
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[post]]);
        let service = make_service(post_db, empty_db(), empty_db());

        let result = service.add_comment("user1", "post1", "hello").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_delete_comment_wrong_actor() {
        let comment = create_test_comment("c1", "post1", "author");
        let post = create_test_post("post1", "owner", true);

        let post_db =
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[post]]);
        let comment_db =
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[comment]]);
        let service = make_service(post_db, comment_db, empty_db());

        let result = service.delete_comment("stranger", "c1").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_reply_too_long() {
        let service = make_service(empty_db(), empty_db(), empty_db());

        let text = "a".repeat(comment_reply::MAX_TEXT_LEN + 1);
        let result = service.reply_to_comment("user1", "c1", &text).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_comments_resolves_authors_and_replies() {
        let post = create_test_post("post1", "owner", true);
        let comment = create_test_comment("c1", "post1", "bob");
        let reply = comment_reply::Model {
            id: "r1".to_string(),
            comment_id: "c1".to_string(),
            user_id: "carol".to_string(),
            text: "agreed".to_string(),
            created_at: Utc::now().into(),
        };

        let post_db =
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[post]]);
        let comment_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![btreemap! {
                "num_items" => Into::<Value>::into(1i64),
            }]])
            .append_query_results([vec![comment]])
            .append_query_results([vec![reply]])
            .append_query_results([vec![btreemap! {
                "num_items" => Into::<Value>::into(2i64),
            }]]);
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user("bob")]])
            .append_query_results([[create_test_user("carol")]]);
        let service = make_service(post_db, comment_db, user_db);

        let page = service.get_comments("post1", None, 1, 20).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.comments.len(), 1);

        let view = &page.comments[0];
        assert_eq!(view.author.username, "bob");
        assert_eq!(view.likes_count, 2);
        assert!(!view.liked_by_me);
        assert_eq!(view.replies.len(), 1);
        assert_eq!(view.replies[0].author.username, "carol");
    }

    #[tokio::test]
    async fn test_like_toggle_unlike() {
        let post = create_test_post("post1", "owner", true);

        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![post]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![btreemap! {
                "num_items" => Into::<Value>::into(4i64),
            }]]);
        let service = make_service(post_db, empty_db(), empty_db());

        let result = service.like_toggle("user1", "post1").await.unwrap();
        assert!(!result.active);
        assert_eq!(result.count, 4);
    }

    #[tokio::test]
    async fn test_share_own_post_no_notification() {
        // The share notification is addressed to the post owner, so an
        // owner sharing their own post is self-suppressed; the
        // notification mock would error on any DB access.
        let post = create_test_post("post1", "user1", true);
        let mut bumped = post.clone();
        bumped.shares = 1;

        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[post]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([[bumped]]);
        let service = make_service(post_db, empty_db(), empty_db());

        let shares = service
            .share_post("user1", "post1", Some("friend"))
            .await
            .unwrap();
        assert_eq!(shares, 1);
    }

    #[tokio::test]
    async fn test_share_without_recipient_no_notification() {
        let post = create_test_post("post1", "owner", true);
        let mut bumped = post.clone();
        bumped.shares = 1;

        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[post]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([[bumped]]);
        let service = make_service(post_db, empty_db(), empty_db());

        let shares = service.share_post("user1", "post1", None).await.unwrap();
        assert_eq!(shares, 1);
    }

    #[tokio::test]
    async fn test_increment_view_unknown_post_is_noop() {
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }]);
        let service = make_service(post_db, empty_db(), empty_db());

        assert!(service.increment_view("nope").await.is_ok());
    }
}
