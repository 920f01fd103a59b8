//! Database entities.

pub mod comment;
pub mod comment_like;
pub mod comment_reply;
pub mod follow;
pub mod message;
pub mod notification;
pub mod post;
pub mod post_like;
pub mod post_save;
pub mod user;

pub use comment::Entity as Comment;
pub use comment_like::Entity as CommentLike;
pub use comment_reply::Entity as CommentReply;
pub use follow::Entity as Follow;
pub use message::Entity as Message;
pub use notification::Entity as Notification;
pub use post::Entity as Post;
pub use post_like::Entity as PostLike;
pub use post_save::Entity as PostSave;
pub use user::Entity as User;
