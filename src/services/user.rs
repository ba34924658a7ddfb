use crate::{
    error::{AppError, Result},
    models::user::UserProfile,
    services::store::{EntityStore, Filter, Mutation, UpdateOptions},
    utils::validation::require_identifier,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn EntityStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// 通过 Rainbow-Auth 用户ID查询档案
    pub async fn get_by_auth_id(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let doc = self
            .store
            .fetch_one("user_profile", &Filter::by("user_id", user_id))
            .await?;
        doc.map(serde_json::from_value).transpose().map_err(Into::into)
    }

    /// Explicit upsert-with-defaults provisioning. Account creation must
    /// never block an interaction, so first reference creates the
    /// profile; every default is an insert-time operator and an existing
    /// profile is returned untouched.
    ///
    /// Defaults: `role = "Reader"`, empty comment mirror, empty
    /// bookmarks, provisioning timestamps.
    pub async fn ensure_user(
        &self,
        user_id: &str,
        display_name: Option<&str>,
    ) -> Result<UserProfile> {
        require_identifier(user_id, "user_id")?;
        debug!("Ensuring user profile for {}", user_id);

        let now = Utc::now();
        let mutation = Mutation::new()
            .set_on_insert("display_name", json!(display_name))
            .set_on_insert("role", "Reader")
            .set_on_insert("comments", json!([]))
            .set_on_insert("bookmarks", json!([]))
            .set_on_insert("created_at", json!(now))
            .set_on_insert("updated_at", json!(now));

        let doc = self
            .store
            .apply_update(
                "user_profile",
                &Filter::by("user_id", user_id),
                &mutation,
                UpdateOptions::upsert(),
            )
            .await?
            .ok_or_else(|| AppError::internal("Profile upsert returned no document"))?;

        Ok(serde_json::from_value(doc)?)
    }
}
