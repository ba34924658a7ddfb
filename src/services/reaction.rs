use crate::{
    error::{AppError, Result},
    models::interaction::AddReactionRequest,
    models::post::Post,
    services::store::{EntityStore, Filter, Mutation, UpdateOptions},
    utils::validation::{require_identifier, validate_emoji},
};
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

/// Per-emoji reaction counters on embedded comments. The increment is
/// keyed by the comment's id through an array-filter operator, so a
/// concurrent append that shifts array positions cannot land the
/// increment on the wrong comment.
#[derive(Clone)]
pub struct ReactionService {
    store: Arc<dyn EntityStore>,
}

impl ReactionService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// 给评论添加表情回应
    ///
    /// Counters start at 1 on first use and only grow; there is no
    /// un-react operation. The actor is recorded in the log but does
    /// not deduplicate, so repeated reactions keep counting.
    pub async fn add_reaction(&self, actor_id: &str, request: AddReactionRequest) -> Result<Post> {
        request.validate().map_err(AppError::ValidatorError)?;
        require_identifier(actor_id, "actor_id")?;
        validate_emoji(&request.emoji)?;

        debug!(
            "Reaction {} on comment {} of post {} by actor {}",
            request.emoji, request.comment_id, request.post_id, actor_id
        );

        let filter = Filter::by("post_id", request.post_id.as_str());
        let doc = self
            .store
            .fetch_one("post", &filter)
            .await?
            .ok_or_else(|| AppError::parent_not_found(&request.post_id))?;
        let post: Post = serde_json::from_value(doc)?;

        if post.comment_by_id(&request.comment_id).is_none() {
            return Err(AppError::comment_not_found(&request.comment_id));
        }

        let mutation = Mutation::new().inc_matched(
            "comments",
            "id",
            request.comment_id.as_str(),
            &format!("reactions.{}", request.emoji),
            1,
        );

        let updated = self
            .store
            .apply_update("post", &filter, &mutation, UpdateOptions::default())
            .await?
            .ok_or_else(|| AppError::parent_not_found(&request.post_id))?;

        Ok(serde_json::from_value(updated)?)
    }
}
