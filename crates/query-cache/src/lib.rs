//! Query cache for remote reads
//!
//! Caches the results of asynchronous backend calls per key with a
//! per-category freshness window, de-duplicates concurrent loads of the
//! same key, waits for the backend connection before loading, and
//! supports explicit invalidation after writes. [`PagedQuery`] covers
//! cursor-paginated lists.

mod cache;
mod gate;
mod paged;
mod types;

pub use cache::QueryCache;
pub use gate::ConnectionGate;
pub use paged::{Page, PagedQuery, PagesSnapshot};
pub use types::{CacheOptions, CacheStats, Freshness, QueryState};
