use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// The write stages of the non-transactional multi-write operations.
/// `PartialWrite` reports these so a caller can tell a clean failure
/// from one that left the first write applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    PostComments,
    UserMirror,
    PrimaryBookmarks,
    SecondaryBookmarks,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteStage::PostComments => "post comments",
            WriteStage::UserMirror => "user comment mirror",
            WriteStage::PrimaryBookmarks => "primary bookmarks",
            WriteStage::SecondaryBookmarks => "secondary bookmarks",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("Storage error: {0}")]
    Store(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Validation error: {0}")]
    ValidatorError(#[from] validator::ValidationErrors),

    #[error("Actor not found: {0}")]
    ActorNotFound(String),

    #[error("Parent not found: {0}")]
    ParentNotFound(String),

    #[error("Comment not found: {0}")]
    CommentNotFound(String),

    #[error("Partial write: {failed} failed after {completed:?} succeeded: {source}")]
    PartialWrite {
        completed: Vec<WriteStage>,
        failed: WriteStage,
        #[source]
        source: Box<AppError>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, error_code) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string(), "DATABASE_ERROR")
            }
            AppError::Store(msg) => {
                tracing::error!("Storage error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string(), "STORAGE_ERROR")
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone(), "VALIDATION_ERROR")
            }
            AppError::ActorNotFound(msg) => {
                (StatusCode::NOT_FOUND, msg.clone(), "ACTOR_NOT_FOUND")
            }
            AppError::ParentNotFound(msg) => {
                (StatusCode::NOT_FOUND, msg.clone(), "PARENT_NOT_FOUND")
            }
            AppError::CommentNotFound(msg) => {
                (StatusCode::NOT_FOUND, msg.clone(), "COMMENT_NOT_FOUND")
            }
            AppError::PartialWrite { completed, failed, source } => {
                tracing::error!(
                    "Partial write: {} failed after {:?} succeeded: {}",
                    failed, completed, source
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("The {} write failed after earlier writes were applied", failed),
                    "PARTIAL_WRITE",
                )
            }
            AppError::Serialization(e) => {
                tracing::error!("Serialization error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Serialization error".to_string(), "SERIALIZATION_ERROR")
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string(), "INTERNAL_ERROR")
            }
            AppError::ValidatorError(e) => {
                let validation_errors = e
                    .field_errors()
                    .iter()
                    .map(|(field, errors)| {
                        (
                            field.to_string(),
                            errors.iter().map(|e| e.message.as_ref().unwrap_or(&"Invalid value".into()).to_string()).collect::<Vec<_>>()
                        )
                    })
                    .collect::<std::collections::HashMap<String, Vec<String>>>();

                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": {
                            "code": "VALIDATION_ERROR",
                            "message": "Validation failed",
                            "details": validation_errors
                        }
                    }))
                ).into_response();
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": error_message
            }
        }));

        (status, body).into_response()
    }
}

// 便利函数，用于创建常见错误
impl AppError {
    pub fn actor_not_found(id: &str) -> Self {
        Self::ActorNotFound(format!("User {} not found", id))
    }

    pub fn parent_not_found(id: &str) -> Self {
        Self::ParentNotFound(format!("Post {} not found", id))
    }

    pub fn comment_not_found(id: &str) -> Self {
        Self::CommentNotFound(format!("Comment {} not found", id))
    }

    pub fn validation(msg: &str) -> Self {
        Self::Validation(msg.to_string())
    }

    pub fn internal(msg: &str) -> Self {
        Self::Internal(msg.to_string())
    }

    pub fn partial_write(completed: Vec<WriteStage>, failed: WriteStage, source: AppError) -> Self {
        Self::PartialWrite {
            completed,
            failed,
            source: Box::new(source),
        }
    }
}

// 从其他错误类型转换
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
