use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// 存储内部ID (e.g. "post:uuid")
    pub id: String,
    /// 对外稳定ID，调用方用它定位文章
    pub post_id: String,
    pub title: String,
    pub content: String,
    pub author_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Set of actor ids; uniqueness is enforced by the relation toggle,
    /// not by a storage-level constraint.
    #[serde(default)]
    pub likes: Vec<String>,
    /// Append-only, insertion order.
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn comment_by_id(&self, comment_id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == comment_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// Assigned at insertion time; the handle callers keep for reactions.
    pub id: String,
    pub author_id: String,
    /// Display name snapshot taken when the comment was posted,
    /// never re-joined against the user profile.
    pub username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Per-emoji counters. Absent on documents written before reactions
    /// existed, so deserialization defaults to empty.
    #[serde(default)]
    pub reactions: HashMap<String, i64>,
}
