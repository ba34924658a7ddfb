/// Mirror entries keep at most this many characters of the comment.
pub const COMMENT_PREVIEW_LEN: usize = 30;

/// Abbreviate comment text for the user-side mirror: text of 30
/// characters or fewer is stored verbatim, longer text keeps its first
/// 30 characters followed by an ellipsis marker. Counted in characters,
/// not bytes, so multi-byte text never splits mid-character.
pub fn truncate_preview(text: &str) -> String {
    if text.chars().count() <= COMMENT_PREVIEW_LEN {
        return text.to_string();
    }
    let head: String = text.chars().take(COMMENT_PREVIEW_LEN).collect();
    format!("{}...", head)
}
