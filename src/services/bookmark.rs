use crate::{
    error::{AppError, Result, WriteStage},
    models::interaction::BookmarkOutcome,
    services::relation::RelationService,
    services::store::{EntityStore, Filter, Mutation, UpdateOptions},
    utils::validation::require_identifier,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Bookmark toggles over two stores. The `bookmarks` set on the primary
/// user profile is authoritative; the secondary per-user store holds a
/// derived copy rewritten after every toggle, so deployments that index
/// bookmarks separately read a cache, never a second source of truth.
#[derive(Clone)]
pub struct BookmarkService {
    primary: Arc<dyn EntityStore>,
    secondary: Arc<dyn EntityStore>,
    relations: RelationService,
}

impl BookmarkService {
    pub fn new(primary: Arc<dyn EntityStore>, secondary: Arc<dyn EntityStore>) -> Self {
        Self {
            relations: RelationService::new(primary.clone()),
            primary,
            secondary,
        }
    }

    /// 收藏/取消收藏
    ///
    /// The post must exist and bookmarking does not auto-provision a
    /// profile. A secondary refresh failure after the primary toggle
    /// succeeded is reported as a partial write.
    pub async fn toggle(&self, post_id: &str, actor_id: &str) -> Result<BookmarkOutcome> {
        require_identifier(post_id, "post_id")?;
        require_identifier(actor_id, "actor_id")?;
        debug!("Toggling bookmark on post {} for actor {}", post_id, actor_id);

        self.primary
            .fetch_one("post", &Filter::by("post_id", post_id))
            .await?
            .ok_or_else(|| AppError::parent_not_found(post_id))?;

        self.primary
            .fetch_one("user_profile", &Filter::by("user_id", actor_id))
            .await?
            .ok_or_else(|| AppError::actor_not_found(actor_id))?;

        let outcome = self
            .relations
            .toggle(
                "user_profile",
                Filter::by("user_id", actor_id),
                "bookmarks",
                post_id,
            )
            .await
            .map_err(|e| match e {
                // The toggle parent here is the user profile.
                AppError::ParentNotFound(_) => AppError::actor_not_found(actor_id),
                other => other,
            })?;

        let bookmarks = outcome
            .entity
            .get("bookmarks")
            .cloned()
            .unwrap_or_else(|| json!([]));
        let refresh = Mutation::new()
            .set("bookmarks", bookmarks)
            .set("updated_at", json!(Utc::now()));
        let refresh_write = self
            .secondary
            .apply_update(
                "bookmark_profile",
                &Filter::by("user_id", actor_id),
                &refresh,
                UpdateOptions::upsert(),
            )
            .await;
        if let Err(e) = refresh_write {
            return Err(AppError::partial_write(
                vec![WriteStage::PrimaryBookmarks],
                WriteStage::SecondaryBookmarks,
                e,
            ));
        }

        info!(
            "Bookmark on post {} for actor {} is now {}",
            post_id, actor_id, outcome.member_after_toggle
        );

        Ok(BookmarkOutcome {
            bookmarked: outcome.member_after_toggle,
        })
    }

    pub async fn is_bookmarked(&self, post_id: &str, actor_id: &str) -> Result<bool> {
        let user = self
            .primary
            .fetch_one("user_profile", &Filter::by("user_id", actor_id))
            .await?
            .ok_or_else(|| AppError::actor_not_found(actor_id))?;

        Ok(user
            .get("bookmarks")
            .and_then(Value::as_array)
            .map(|set| set.iter().any(|v| v.as_str() == Some(post_id)))
            .unwrap_or(false))
    }
}
