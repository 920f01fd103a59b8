//! Business logic services.

pub mod event_publisher;
pub mod following;
pub mod interaction;
pub mod messaging;
pub mod notification;
pub mod post;
pub mod user;

pub use event_publisher::{EventPublisher, EventPublisherService, NoOpEventPublisher};
pub use following::FollowingService;
pub use interaction::{
    AuthorSummary, CommentPage, CommentView, InteractionService, ReplyView, ToggleResult,
};
pub use messaging::{ConversationSummary, MessageView, MessagingService};
pub use notification::NotificationService;
pub use post::{CreatePostInput, PostService, PostView};
pub use user::{RegisterUserInput, UpdateProfileInput, UserService};
