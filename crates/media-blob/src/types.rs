//! Media kinds and their upload rules

use std::fmt;

use crate::error::{MediaError, Result};

const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];
const VIDEO_TYPES: &[&str] = &["video/mp4", "video/webm", "video/ogg", "video/quicktime"];

const MAX_IMAGE_SIZE: u64 = 10 * 1024 * 1024; // 10MB, matches the backend limit
const MAX_VIDEO_SIZE: u64 = 50 * 1024 * 1024; // 50MB

/// What a blob is rendered as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Content type assumed for materialized bytes of unknown type
    pub fn default_content_type(&self) -> &'static str {
        match self {
            MediaKind::Image => "image/jpeg",
            MediaKind::Video => "video/mp4",
        }
    }

    pub fn supported_types(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Image => IMAGE_TYPES,
            MediaKind::Video => VIDEO_TYPES,
        }
    }

    pub fn supported_label(&self) -> &'static str {
        match self {
            MediaKind::Image => "JPEG, PNG, WebP, or GIF",
            MediaKind::Video => "MP4, WebM, OGG, or MOV",
        }
    }

    /// Largest upload accepted, in bytes
    pub fn max_size(&self) -> u64 {
        match self {
            MediaKind::Image => MAX_IMAGE_SIZE,
            MediaKind::Video => MAX_VIDEO_SIZE,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            MediaKind::Image => "Image",
            MediaKind::Video => "Video",
        }
    }

    /// Check an upload's content type and size against this kind's rules
    pub fn validate(&self, content_type: &str, size: u64) -> Result<()> {
        if !self.supported_types().contains(&content_type) {
            return Err(MediaError::UnsupportedType {
                kind: *self,
                content_type: content_type.to_string(),
            });
        }

        if size > self.max_size() {
            return Err(MediaError::TooLarge {
                kind: *self,
                size,
                limit: self.max_size(),
            });
        }

        Ok(())
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}
