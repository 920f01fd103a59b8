//! Repository layer wrapping database access per aggregate.

pub mod comment;
pub mod follow;
pub mod message;
pub mod notification;
pub mod post;
pub mod user;

pub use comment::CommentRepository;
pub use follow::FollowRepository;
pub use message::MessageRepository;
pub use notification::NotificationRepository;
pub use post::PostRepository;
pub use user::UserRepository;
