pub mod interaction;
pub mod post;
pub mod user;

// 重新导出常用类型
pub use interaction::{
    AddCommentRequest, AddReactionRequest, BookmarkOutcome, CommentCreated, LikeOutcome,
    ToggleOutcome,
};
pub use post::{Comment, Post};
pub use user::{BookmarkProfile, CommentPreview, UserProfile};
