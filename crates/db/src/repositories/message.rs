//! Direct message repository.

use std::sync::Arc;

use crate::entities::{Message, message};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};
use shortloop_common::{AppError, AppResult};

/// Repository for direct message operations.
#[derive(Clone)]
pub struct MessageRepository {
    db: Arc<DatabaseConnection>,
}

impl MessageRepository {
    /// Create a new message repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a new message.
    pub async fn create(&self, model: message::ActiveModel) -> AppResult<message::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find messages between two users, oldest first.
    pub async fn find_conversation(
        &self,
        user_id: &str,
        partner_id: &str,
        limit: u64,
    ) -> AppResult<Vec<message::Model>> {
        Message::find()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(message::Column::SenderId.eq(user_id))
                            .add(message::Column::RecipientId.eq(partner_id)),
                    )
                    .add(
                        Condition::all()
                            .add(message::Column::SenderId.eq(partner_id))
                            .add(message::Column::RecipientId.eq(user_id)),
                    ),
            )
            .order_by_asc(message::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find messages sent or received by a user, newest first.
    pub async fn find_by_user(&self, user_id: &str, limit: u64) -> AppResult<Vec<message::Model>> {
        Message::find()
            .filter(
                Condition::any()
                    .add(message::Column::SenderId.eq(user_id))
                    .add(message::Column::RecipientId.eq(user_id)),
            )
            .order_by_desc(message::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count unread messages for a recipient.
    pub async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        Message::find()
            .filter(message::Column::RecipientId.eq(user_id))
            .filter(message::Column::IsRead.eq(false))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark messages from `partner_id` to `user_id` as read. Idempotent.
    pub async fn mark_as_read(&self, user_id: &str, partner_id: &str) -> AppResult<u64> {
        let result = Message::update_many()
            .col_expr(message::Column::IsRead, Expr::value(true))
            .filter(message::Column::SenderId.eq(partner_id))
            .filter(message::Column::RecipientId.eq(user_id))
            .filter(message::Column::IsRead.eq(false))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}
