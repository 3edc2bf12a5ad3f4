//! Moderation messages and the flagged-posts admin view

use std::sync::LazyLock;

use regex::Regex;

use crate::types::FlaggedPost;

const MODERATION_BLOCK_PREFIX: &str = "Upload blocked:";

static TRAP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)trap[^:]*:\s*(.+?)(?:\n|$)").unwrap());

/// Whether the backend rejected content through automated moderation
pub fn is_moderation_block(message: &str) -> bool {
    message.starts_with(MODERATION_BLOCK_PREFIX)
}

/// Strip runtime noise from a backend error.
///
/// Backend traps arrive wrapped as `... trapped explicitly: <text>`; only
/// `<text>` (up to the end of its line) is meant for the user. Anything
/// else is returned unchanged.
pub fn normalize_error_message(message: &str) -> String {
    if !message.contains("trap") {
        return message.to_string();
    }
    match TRAP_RE.captures(message) {
        Some(caps) => caps[1].trim().to_string(),
        None => message.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Moderation,
    Video,
    Image,
    General,
}

/// Decide how an error message should be presented
pub fn categorize_error(message: &str) -> ErrorCategory {
    if is_moderation_block(message) {
        return ErrorCategory::Moderation;
    }

    let lower = message.to_lowercase();
    if lower.contains("video") {
        ErrorCategory::Video
    } else if lower.contains("image") || lower.contains("size") || lower.contains("mb") {
        ErrorCategory::Image
    } else {
        ErrorCategory::General
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MediaFilter {
    #[default]
    All,
    Image,
    Video,
    AnyMedia,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Filters and ordering for the flagged-posts review list
#[derive(Debug, Clone, Default)]
pub struct FlaggedPostFilter {
    /// Case-insensitive substring of the post content
    pub content_search: String,
    pub media: MediaFilter,
    /// Case-insensitive substring of the flag reason
    pub reason_search: String,
    pub order: SortOrder,
}

fn contains_ignore_case(text: &str, needle: &str) -> bool {
    needle.is_empty() || text.to_lowercase().contains(needle)
}

impl FlaggedPostFilter {
    pub fn matches(&self, item: &FlaggedPost) -> bool {
        let content = self.content_search.trim().to_lowercase();
        let reason = self.reason_search.trim().to_lowercase();

        let media_ok = match self.media {
            MediaFilter::All => true,
            MediaFilter::Image => item.post.has_image(),
            MediaFilter::Video => item.post.has_video(),
            MediaFilter::AnyMedia => item.post.has_media(),
        };

        media_ok
            && contains_ignore_case(&item.post.content, &content)
            && contains_ignore_case(item.flag_reason(), &reason)
    }

    pub fn apply(&self, items: &[FlaggedPost]) -> Vec<FlaggedPost> {
        let mut filtered: Vec<FlaggedPost> = items
            .iter()
            .filter(|item| self.matches(item))
            .cloned()
            .collect();

        match self.order {
            SortOrder::NewestFirst => {
                filtered.sort_by(|a, b| b.post.timestamp.cmp(&a.post.timestamp))
            }
            SortOrder::OldestFirst => {
                filtered.sort_by(|a, b| a.post.timestamp.cmp(&b.post.timestamp))
            }
        }
        filtered
    }
}
