use crate::{
    error::{AppError, Result, WriteStage},
    models::interaction::{AddCommentRequest, CommentCreated},
    models::post::{Comment, Post},
    models::user::CommentPreview,
    services::store::{EntityStore, Filter, Mutation, UpdateOptions},
    services::user::UserService,
    utils::text::truncate_preview,
    utils::validation::{require_identifier, validate_comment_text},
};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

/// Appends comments to a post and mirrors an abbreviated entry into the
/// acting user's profile. The two writes are independent atomic pushes,
/// not a transaction; a second-write failure surfaces as a partial
/// write so callers can tell it from a clean failure.
#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn EntityStore>,
    users: UserService,
}

impl CommentService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            users: UserService::new(store.clone()),
            store,
        }
    }

    /// 发表评论
    ///
    /// Preconditions run in order and short-circuit before any write:
    /// non-empty text and ids, actor exists, post exists (by external
    /// `post_id`). The returned comment carries the id callers keep for
    /// later reactions.
    pub async fn add_comment(
        &self,
        actor_id: &str,
        request: AddCommentRequest,
    ) -> Result<CommentCreated> {
        debug!("Creating comment on post {} by {}", request.post_id, actor_id);

        request.validate().map_err(AppError::ValidatorError)?;
        require_identifier(actor_id, "actor_id")?;
        validate_comment_text(&request.text)?;

        let actor = self
            .users
            .get_by_auth_id(actor_id)
            .await?
            .ok_or_else(|| AppError::actor_not_found(actor_id))?;

        let post_filter = Filter::by("post_id", request.post_id.as_str());
        self.store
            .fetch_one("post", &post_filter)
            .await?
            .ok_or_else(|| AppError::parent_not_found(&request.post_id))?;

        let username = request
            .display_name
            .clone()
            .or(actor.display_name)
            .unwrap_or_else(|| "Anonymous".to_string());

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            author_id: actor_id.to_string(),
            username,
            content: request.text.clone(),
            created_at: request.created_at.unwrap_or_else(Utc::now),
            reactions: HashMap::new(),
        };

        let updated_post = self
            .store
            .apply_update(
                "post",
                &post_filter,
                &Mutation::new().push("comments", serde_json::to_value(&comment)?),
                UpdateOptions::default(),
            )
            .await?
            .ok_or_else(|| AppError::parent_not_found(&request.post_id))?;

        let comment_count = updated_post
            .get("comments")
            .and_then(Value::as_array)
            .map(|comments| comments.len())
            .unwrap_or(0);

        let preview = CommentPreview {
            post_id: request.post_id.clone(),
            text: truncate_preview(&request.text),
        };
        let mirror_write = self
            .store
            .apply_update(
                "user_profile",
                &Filter::by("user_id", actor_id),
                &Mutation::new().push("comments", serde_json::to_value(&preview)?),
                UpdateOptions::default(),
            )
            .await;
        match mirror_write {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err(AppError::partial_write(
                    vec![WriteStage::PostComments],
                    WriteStage::UserMirror,
                    AppError::actor_not_found(actor_id),
                ))
            }
            Err(e) => {
                return Err(AppError::partial_write(
                    vec![WriteStage::PostComments],
                    WriteStage::UserMirror,
                    e,
                ))
            }
        }

        info!(
            "Comment {} added to post {} ({} comments total)",
            comment.id, request.post_id, comment_count
        );

        Ok(CommentCreated {
            comment,
            comment_count,
        })
    }

    /// Rebuild the actor's mirror entries for one post from the
    /// authoritative post document. The mirror is a best-effort cache
    /// and can drift after a partial write; this is the repair pass.
    /// Last writer wins on the mirror field.
    pub async fn repair_comment_mirror(&self, actor_id: &str, post_id: &str) -> Result<usize> {
        require_identifier(actor_id, "actor_id")?;
        require_identifier(post_id, "post_id")?;

        let user = self
            .users
            .get_by_auth_id(actor_id)
            .await?
            .ok_or_else(|| AppError::actor_not_found(actor_id))?;

        let post_doc = self
            .store
            .fetch_one("post", &Filter::by("post_id", post_id))
            .await?
            .ok_or_else(|| AppError::parent_not_found(post_id))?;
        let post: Post = serde_json::from_value(post_doc)?;

        let derived: Vec<CommentPreview> = post
            .comments
            .iter()
            .filter(|c| c.author_id == actor_id)
            .map(|c| CommentPreview {
                post_id: post_id.to_string(),
                text: truncate_preview(&c.content),
            })
            .collect();
        let repaired = derived.len();

        let mut mirror: Vec<CommentPreview> = user
            .comments
            .into_iter()
            .filter(|entry| entry.post_id != post_id)
            .collect();
        mirror.extend(derived);

        self.store
            .apply_update(
                "user_profile",
                &Filter::by("user_id", actor_id),
                &Mutation::new().set("comments", serde_json::to_value(&mirror)?),
                UpdateOptions::default(),
            )
            .await?
            .ok_or_else(|| AppError::actor_not_found(actor_id))?;

        if repaired == 0 {
            warn!(
                "Mirror repair for {} on post {} found no comments to mirror",
                actor_id, post_id
            );
        } else {
            info!(
                "Mirror repair for {} on post {} rewrote {} entries",
                actor_id, post_id, repaired
            );
        }

        Ok(repaired)
    }
}
