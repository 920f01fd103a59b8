//! Post entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owner user ID
    #[sea_orm(indexed)]
    pub user_id: String,

    /// Public URL of the hosted video
    pub video_url: String,

    /// Thumbnail URL
    #[sea_orm(nullable)]
    pub thumbnail_url: Option<String>,

    /// Caption text
    #[sea_orm(column_type = "Text", nullable)]
    pub caption: Option<String>,

    /// Comment count (denormalized)
    #[sea_orm(default_value = 0)]
    pub comments_count: i32,

    /// Share counter (monotonic)
    #[sea_orm(default_value = 0)]
    pub shares: i32,

    /// View counter (monotonic)
    #[sea_orm(default_value = 0)]
    pub views: i64,

    /// Whether new comments are accepted
    #[sea_orm(default_value = true)]
    pub allow_comments: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Owner,

    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,

    #[sea_orm(has_many = "super::post_like::Entity")]
    Likes,

    #[sea_orm(has_many = "super::post_save::Entity")]
    Saves,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
