use crate::error::{AppError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// 校验必填的标识符字段
pub fn require_identifier(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// 校验评论内容非空
pub fn validate_comment_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("Comment text is required".to_string()));
    }
    Ok(())
}

/// 校验表情符号
/// Reaction emoji become keys in the per-comment counter map, so
/// characters that collide with the store's path syntax are rejected.
pub fn validate_emoji(emoji: &str) -> Result<()> {
    static EMOJI_KEY: OnceLock<Regex> = OnceLock::new();

    let pattern = EMOJI_KEY.get_or_init(|| {
        // No whitespace, dots, dollars or backticks; at most 32 chars.
        Regex::new(r"^[^\s.$`]{1,32}$").unwrap()
    });

    if !pattern.is_match(emoji) {
        return Err(AppError::Validation("Invalid reaction emoji".to_string()));
    }
    Ok(())
}
