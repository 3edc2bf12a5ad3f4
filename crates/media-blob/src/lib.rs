//! Media blob lifecycle
//!
//! Turns blob handles into URLs a renderer can use. Handles that offer a
//! direct URL are used as-is; everything else is fetched and materialized
//! into a locally minted object URL, which is owned by exactly one
//! [`BlobUrlSlot`] or [`LocalPreview`] and released when it is no longer
//! shown.

pub mod error;
mod handle;
mod local;
mod object_url;
mod slot;
mod types;

pub use error::{MediaError, Result};
pub use handle::{BlobHandle, BlobSource, BytesBlob, RemoteBlob};
pub use local::{content_type_for_path, LocalFile, LocalPreview};
pub use object_url::{
    InMemoryObjectUrls, MediaUrl, ObjectUrl, ObjectUrlStats, ObjectUrlStore, OBJECT_URL_SCHEME,
};
pub use slot::{BlobUrlSlot, MediaState};
pub use types::MediaKind;
