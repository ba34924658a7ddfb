use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::models::post::{Comment, Post};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddCommentRequest {
    #[validate(length(min = 1, max = 128))]
    pub post_id: String,

    #[validate(length(min = 1, max = 5000))]
    pub text: String,

    /// Overrides the actor's profile display name for this comment only.
    #[validate(length(min = 1, max = 50))]
    pub display_name: Option<String>,

    /// Caller-supplied creation time; defaults to now.
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddReactionRequest {
    #[validate(length(min = 1, max = 128))]
    pub post_id: String,

    #[validate(length(min = 1, max = 128))]
    pub comment_id: String,

    #[validate(length(min = 1, max = 32))]
    pub emoji: String,
}

/// Raw result of a generic relation toggle.
#[derive(Debug, Clone)]
pub struct ToggleOutcome {
    pub member_after_toggle: bool,
    /// The post-update parent document.
    pub entity: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeOutcome {
    pub liked: bool,
    pub post: Post,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkOutcome {
    pub bookmarked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentCreated {
    pub comment: Comment,
    /// Comment count of the post after the append.
    pub comment_count: usize,
}
