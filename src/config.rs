use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Runtime configuration
    pub environment: String,
    pub log_level: String,

    // Primary database configuration (posts + user profiles)
    pub database_url: String,
    pub database_namespace: String,
    pub database_name: String,
    pub database_username: String,
    pub database_password: String,

    // Secondary bookmark store (optional; derived cache of user bookmarks)
    pub secondary_database_url: Option<String>,
    pub secondary_database_namespace: String,
    pub secondary_database_name: String,

    // Content settings
    pub max_comment_length: usize,
    pub max_emoji_length: usize,

    // Feature flags
    pub enable_comments: bool,
    pub enable_reactions: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            database_namespace: env::var("DATABASE_NAMESPACE")
                .unwrap_or_else(|_| "rainbow".to_string()),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "interactions".to_string()),
            database_username: env::var("DATABASE_USERNAME")
                .unwrap_or_else(|_| "root".to_string()),
            database_password: env::var("DATABASE_PASSWORD")
                .unwrap_or_else(|_| "root".to_string()),

            secondary_database_url: env::var("SECONDARY_DATABASE_URL").ok(),
            secondary_database_namespace: env::var("SECONDARY_DATABASE_NAMESPACE")
                .unwrap_or_else(|_| "rainbow".to_string()),
            secondary_database_name: env::var("SECONDARY_DATABASE_NAME")
                .unwrap_or_else(|_| "bookmarks".to_string()),

            max_comment_length: env::var("MAX_COMMENT_LENGTH")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,
            max_emoji_length: env::var("MAX_EMOJI_LENGTH")
                .unwrap_or_else(|_| "32".to_string())
                .parse()?,

            enable_comments: env::var("ENABLE_COMMENTS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            enable_reactions: env::var("ENABLE_REACTIONS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// 是否配置了独立的书签存储
    pub fn has_secondary_store(&self) -> bool {
        self.secondary_database_url.is_some()
    }
}
