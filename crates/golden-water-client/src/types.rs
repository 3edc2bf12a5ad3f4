use std::fmt;

use media_blob::BlobHandle;
use query_cache::Page;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub type PostId = u64;
pub type CommentId = u64;

/// Opaque identity of an author or caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Principal(pub String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Profile {
    pub username: String,
    pub bio: String,
    pub preferences: String,
    pub is_adult: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub content: String,
    pub author: Principal,
    /// Nanoseconds since the Unix epoch
    pub timestamp: u64,
    pub reports: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ReactionType {
    Like,
    Love,
    Laugh,
    Sad,
    Angry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ModerationStatus {
    Active,
    Blocked(String),
    Flagged(String),
}

impl ModerationStatus {
    pub fn flag_reason(&self) -> &str {
        match self {
            ModerationStatus::Flagged(reason) => reason,
            _ => "Unknown reason",
        }
    }
}

/// A post as returned by the backend.
///
/// Media are blob handles rather than URLs; turn them into something
/// renderable with a `media_blob::BlobUrlSlot`.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: PostId,
    pub content: String,
    pub image: Option<BlobHandle>,
    pub video: Option<BlobHandle>,
    pub author: Principal,
    /// Nanoseconds since the Unix epoch
    pub timestamp: u64,
    pub reports: u64,
}

impl Post {
    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn has_media(&self) -> bool {
        self.has_image() || self.has_video()
    }
}

/// One page of the feed; `next_page_start` is absent on the last page
#[derive(Debug, Clone)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub next_page_start: Option<u64>,
}

impl Page for PostPage {
    type Cursor = u64;

    fn next_cursor(&self) -> Option<u64> {
        self.next_page_start
    }
}

/// A flagged post joined with its current content
#[derive(Debug, Clone)]
pub struct FlaggedPost {
    pub post_id: PostId,
    pub status: ModerationStatus,
    pub post: Post,
}

impl FlaggedPost {
    pub fn flag_reason(&self) -> &str {
        self.status.flag_reason()
    }
}
