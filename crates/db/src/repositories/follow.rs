//! Follow relation repository.

use std::sync::Arc;

use crate::entities::{Follow, follow};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    TryInsertResult, sea_query::OnConflict,
};
use shortloop_common::{AppError, AppResult};

/// Repository for follow relations. One row is the whole relation.
#[derive(Clone)]
pub struct FollowRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowRepository {
    /// Create a new follow repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Check whether `follower_id` follows `followee_id`.
    pub async fn exists(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        let found = Follow::find()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FolloweeId.eq(followee_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(found.is_some())
    }

    /// Insert a follow row. Returns false when the relation already exists.
    pub async fn insert(&self, model: follow::ActiveModel) -> AppResult<bool> {
        let result = Follow::insert(model)
            .on_conflict(
                OnConflict::columns([follow::Column::FollowerId, follow::Column::FolloweeId])
                    .do_nothing()
                    .to_owned(),
            )
            .do_nothing()
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(matches!(result, TryInsertResult::Inserted(_)))
    }

    /// Remove a follow relation. Returns whether a row was removed.
    pub async fn delete(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        let deleted = Follow::delete_many()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FolloweeId.eq(followee_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(deleted.rows_affected > 0)
    }

    /// List user IDs following `followee_id`, newest first.
    pub async fn find_follower_ids(
        &self,
        followee_id: &str,
        limit: u64,
    ) -> AppResult<Vec<String>> {
        let rows = Follow::find()
            .filter(follow::Column::FolloweeId.eq(followee_id))
            .order_by_desc(follow::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|f| f.follower_id).collect())
    }

    /// List user IDs that `follower_id` follows, newest first.
    pub async fn find_following_ids(
        &self,
        follower_id: &str,
        limit: u64,
    ) -> AppResult<Vec<String>> {
        let rows = Follow::find()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .order_by_desc(follow::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|f| f.followee_id).collect())
    }
}
