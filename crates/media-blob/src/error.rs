//! Error types for blob resolution and local media

use thiserror::Error;

use crate::types::MediaKind;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid blob URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to fetch blob: {0}")]
    Fetch(String),

    #[error("Unsupported {kind} type. Please use {}.", .kind.supported_label())]
    UnsupportedType { kind: MediaKind, content_type: String },

    #[error("{} size exceeds maximum allowed limit of {}MB.", .kind.title(), .limit / (1024 * 1024))]
    TooLarge { kind: MediaKind, size: u64, limit: u64 },

    #[error("No async runtime available to fetch blob bytes")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, MediaError>;
