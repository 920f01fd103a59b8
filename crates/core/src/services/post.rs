//! Post service.

use sea_orm::Set;
use shortloop_common::{AppError, AppResult, IdGenerator};
use shortloop_db::{
    entities::post,
    repositories::{PostRepository, UserRepository},
};

/// Maximum caption length.
const MAX_CAPTION_LEN: usize = 2200;

/// Default feed page size.
const FEED_LIMIT: u64 = 20;

/// Input for creating a new post.
#[derive(Debug, Clone)]
pub struct CreatePostInput {
    pub video_url: String,
    pub thumbnail_url: Option<String>,
    pub caption: Option<String>,
    pub allow_comments: bool,
}

/// A post together with the viewing user's interaction state.
#[derive(Debug, Clone)]
pub struct PostView {
    pub post: post::Model,
    pub liked_by_me: bool,
    pub saved_by_me: bool,
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub const fn new(post_repo: PostRepository, user_repo: UserRepository) -> Self {
        Self {
            post_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a new post.
    pub async fn create_post(&self, user_id: &str, input: CreatePostInput) -> AppResult<post::Model> {
        if input.video_url.trim().is_empty() {
            return Err(AppError::Validation("Video URL must not be empty".to_string()));
        }
        if let Some(ref caption) = input.caption {
            if caption.len() > MAX_CAPTION_LEN {
                return Err(AppError::Validation(format!(
                    "Caption must be at most {MAX_CAPTION_LEN} characters"
                )));
            }
        }

        self.user_repo.get_by_id(user_id).await?;

        let model = post::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            video_url: Set(input.video_url),
            thumbnail_url: Set(input.thumbnail_url),
            caption: Set(input.caption),
            comments_count: Set(0),
            shares: Set(0),
            views: Set(0),
            allow_comments: Set(input.allow_comments),
            created_at: Set(chrono::Utc::now().into()),
        };

        self.post_repo.create(model).await
    }

    /// Get a post by ID.
    pub async fn get_post(&self, post_id: &str) -> AppResult<post::Model> {
        self.post_repo.get_by_id(post_id).await
    }

    /// Get a post with the viewer's like and save state resolved.
    /// Anonymous viewers read both flags as false.
    pub async fn get_post_view(
        &self,
        post_id: &str,
        viewer_id: Option<&str>,
    ) -> AppResult<PostView> {
        let post = self.post_repo.get_by_id(post_id).await?;

        let (liked_by_me, saved_by_me) = match viewer_id {
            Some(viewer) => (
                self.post_repo.has_liked(post_id, viewer).await?,
                self.post_repo.has_saved(post_id, viewer).await?,
            ),
            None => (false, false),
        };

        Ok(PostView {
            post,
            liked_by_me,
            saved_by_me,
        })
    }

    /// Get the global feed, newest first.
    pub async fn get_feed(&self, until_id: Option<&str>) -> AppResult<Vec<post::Model>> {
        self.post_repo.find_feed(FEED_LIMIT, until_id).await
    }

    /// Get posts by a user, newest first.
    pub async fn get_user_posts(
        &self,
        user_id: &str,
        until_id: Option<&str>,
    ) -> AppResult<Vec<post::Model>> {
        self.post_repo.find_by_user(user_id, FEED_LIMIT, until_id).await
    }

    /// Get posts a user has saved, newest save first.
    pub async fn get_saved_posts(&self, user_id: &str) -> AppResult<Vec<post::Model>> {
        let ids = self.post_repo.find_saved_ids(user_id, FEED_LIMIT).await?;
        let mut posts = self.post_repo.find_by_ids(&ids).await?;

        // find_by_ids gives no ordering guarantee; restore save order.
        posts.sort_by_key(|p| ids.iter().position(|id| *id == p.id));
        Ok(posts)
    }

    /// Delete a post. Only the owner may delete.
    pub async fn delete_post(&self, user_id: &str, post_id: &str) -> AppResult<()> {
        let post = self.post_repo.get_by_id(post_id).await?;

        if post.user_id != user_id {
            return Err(AppError::Forbidden(
                "Cannot delete another user's post".to_string(),
            ));
        }

        self.post_repo.delete(post_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn create_test_post(id: &str, user_id: &str) -> post::Model {
        post::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            video_url: "https://cdn.example.com/v.mp4".to_string(),
            thumbnail_url: None,
            caption: None,
            comments_count: 0,
            shares: 0,
            views: 0,
            allow_comments: true,
            created_at: Utc::now().into(),
        }
    }

    fn make_service(post_db: MockDatabase, user_db: MockDatabase) -> PostService {
        PostService::new(
            PostRepository::new(Arc::new(post_db.into_connection())),
            UserRepository::new(Arc::new(user_db.into_connection())),
        )
    }

    #[tokio::test]
    async fn test_create_post_caption_too_long() {
        let service = make_service(
            MockDatabase::new(DatabaseBackend::Postgres),
            MockDatabase::new(DatabaseBackend::Postgres),
        );

        let input = CreatePostInput {
            video_url: "https://cdn.example.com/v.mp4".to_string(),
            thumbnail_url: None,
            caption: Some("a".repeat(2201)),
            allow_comments: true,
        };
        let result = service.create_post("user1", input).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_post_empty_video_url() {
        let service = make_service(
            MockDatabase::new(DatabaseBackend::Postgres),
            MockDatabase::new(DatabaseBackend::Postgres),
        );

        let input = CreatePostInput {
            video_url: "  ".to_string(),
            thumbnail_url: None,
            caption: None,
            allow_comments: true,
        };
        let result = service.create_post("user1", input).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_post_view_anonymous() {
        // No viewer: only the post lookup runs, both flags stay false.
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_post("post1", "owner")]]);
        let service = make_service(post_db, MockDatabase::new(DatabaseBackend::Postgres));

        let view = service.get_post_view("post1", None).await.unwrap();
        assert!(!view.liked_by_me);
        assert!(!view.saved_by_me);
        assert_eq!(view.post.id, "post1");
    }

    #[tokio::test]
    async fn test_get_post_view_liked_not_saved() {
        use shortloop_db::entities::post_like;

        let like = post_like::Model {
            id: "l1".to_string(),
            post_id: "post1".to_string(),
            user_id: "viewer".to_string(),
            created_at: Utc::now().into(),
        };
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_post("post1", "owner")]])
            .append_query_results([vec![like]])
            .append_query_results([Vec::<shortloop_db::entities::post_save::Model>::new()]);
        let service = make_service(post_db, MockDatabase::new(DatabaseBackend::Postgres));

        let view = service.get_post_view("post1", Some("viewer")).await.unwrap();
        assert!(view.liked_by_me);
        assert!(!view.saved_by_me);
    }

    #[tokio::test]
    async fn test_delete_post_wrong_owner() {
        let post_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_post("post1", "owner")]]);
        let service = make_service(post_db, MockDatabase::new(DatabaseBackend::Postgres));

        let result = service.delete_post("stranger", "post1").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
