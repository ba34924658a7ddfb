use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub user_id: String, // Rainbow-Auth 用户ID，主查询键
    pub display_name: Option<String>,
    pub role: String,
    /// Denormalized mirror of comments this user has posted: one
    /// abbreviated entry per comment, best-effort consistent with the
    /// authoritative post documents.
    #[serde(default)]
    pub comments: Vec<CommentPreview>,
    /// Post ids, set semantics enforced by the relation toggle.
    #[serde(default)]
    pub bookmarks: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentPreview {
    pub post_id: String,
    /// First 30 characters of the comment, ellipsis-marked when longer.
    pub text: String,
}

/// Per-user record in the secondary bookmark store. Derived cache only;
/// `user_profile.bookmarks` in the primary store stays authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkProfile {
    pub user_id: String,
    #[serde(default)]
    pub bookmarks: Vec<String>,
    pub updated_at: DateTime<Utc>,
}
