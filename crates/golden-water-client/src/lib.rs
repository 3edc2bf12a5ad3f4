//! Golden Water client core
//!
//! Cached reads and invalidating writes against the Golden Water backend,
//! built on [`query_cache`] for remote data and [`media_blob`] for post
//! media.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use golden_water_client::{Backend, ClientConfig, ConnectionGate, GoldenWaterClient};
//! # async fn run<B: Backend>(backend: B) -> golden_water_client::Result<()> {
//! let gate = ConnectionGate::new();
//! let client = GoldenWaterClient::new(Arc::new(backend), gate.clone(), ClientConfig::from_env());
//!
//! gate.set_ready(true);
//! let feed = client.posts_page().await?;
//! println!("{} pages loaded", feed.pages.len());
//! client.create_post("Hello", None, None).await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod client;
mod config;
pub mod error;
mod keys;
pub mod moderation;
pub mod telemetry;
mod types;

#[cfg(test)]
mod testing;

pub use backend::Backend;
pub use client::GoldenWaterClient;
pub use config::{ClientConfig, StaleTimes};
pub use error::{BackendError, BackendResult, ClientError, Result};
pub use keys::{Category, KeyPattern, Mutation, QueryKey};
pub use media_blob::BlobHandle;
pub use moderation::{
    categorize_error, is_moderation_block, normalize_error_message, ErrorCategory,
    FlaggedPostFilter, MediaFilter, SortOrder,
};
pub use query_cache::{CacheStats, ConnectionGate, PagesSnapshot, QueryState};
pub use types::{
    Comment, CommentId, FlaggedPost, ModerationStatus, Post, PostId, PostPage, Principal, Profile,
    ReactionType,
};
