use crate::{
    error::{AppError, Result},
    models::interaction::{LikeOutcome, ToggleOutcome},
    models::post::Post,
    services::store::{EntityStore, Filter, Mutation, UpdateOptions},
    utils::validation::require_identifier,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Membership toggle over a set-valued field of a parent document.
/// Correctness under concurrent toggles rests entirely on the store's
/// atomic add-if-absent / remove-if-present operators; the engine holds
/// no locks and never rewrites the whole document.
#[derive(Clone)]
pub struct RelationService {
    store: Arc<dyn EntityStore>,
}

impl RelationService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Add `member` to the set if absent, remove it if present, and
    /// report the membership state after the toggle. Two racing toggles
    /// by the same member may flicker, but the set never holds a
    /// duplicate.
    pub async fn toggle(
        &self,
        collection: &str,
        filter: Filter,
        relation_field: &str,
        member: &str,
    ) -> Result<ToggleOutcome> {
        let parent = self
            .store
            .fetch_one(collection, &filter)
            .await?
            .ok_or_else(|| {
                AppError::ParentNotFound(format!("No {} matches the toggle target", collection))
            })?;

        // An absent relation field reads as the empty set.
        let is_member = parent
            .get(relation_field)
            .and_then(Value::as_array)
            .map(|set| set.iter().any(|v| v.as_str() == Some(member)))
            .unwrap_or(false);

        let mutation = if is_member {
            Mutation::new().pull(relation_field, member)
        } else {
            Mutation::new().add_to_set(relation_field, member)
        };

        let entity = self
            .store
            .apply_update(collection, &filter, &mutation, UpdateOptions::default())
            .await?
            .ok_or_else(|| {
                AppError::ParentNotFound(format!("{} vanished before the toggle applied", collection))
            })?;

        Ok(ToggleOutcome {
            member_after_toggle: !is_member,
            entity,
        })
    }

    /// 点赞/取消点赞
    ///
    /// The like set stores the bare actor id; the profile is not
    /// resolved first.
    pub async fn toggle_like(&self, post_id: &str, actor_id: &str) -> Result<LikeOutcome> {
        require_identifier(post_id, "post_id")?;
        require_identifier(actor_id, "actor_id")?;
        debug!("Toggling like on post {} for actor {}", post_id, actor_id);

        let outcome = self
            .toggle("post", Filter::by("post_id", post_id), "likes", actor_id)
            .await?;
        let post: Post = serde_json::from_value(outcome.entity)?;

        Ok(LikeOutcome {
            liked: outcome.member_after_toggle,
            post,
        })
    }

    pub async fn is_liked(&self, post_id: &str, actor_id: &str) -> Result<bool> {
        let post = self
            .store
            .fetch_one("post", &Filter::by("post_id", post_id))
            .await?
            .ok_or_else(|| AppError::parent_not_found(post_id))?;

        Ok(post
            .get("likes")
            .and_then(Value::as_array)
            .map(|set| set.iter().any(|v| v.as_str() == Some(actor_id)))
            .unwrap_or(false))
    }
}
