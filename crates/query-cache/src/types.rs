//! Cache types

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

/// How long a cached value counts as fresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Fresh for the given duration after it was fetched
    For(Duration),
    /// Fresh until explicitly invalidated
    Forever,
}

impl Freshness {
    pub fn secs(secs: u64) -> Self {
        Freshness::For(Duration::from_secs(secs))
    }

    /// Whether a value fetched at `fetched_at` is still fresh
    pub fn is_fresh(&self, fetched_at: Instant) -> bool {
        match self {
            Freshness::For(window) => fetched_at.elapsed() < *window,
            Freshness::Forever => true,
        }
    }
}

/// Construction options shared by every cache category
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub freshness: Freshness,
    /// Maximum number of entries kept before moka starts evicting
    pub max_capacity: u64,
    /// How long an unused entry is kept at all; `None` keeps it for the session
    pub gc_time: Option<Duration>,
}

impl CacheOptions {
    pub fn new(freshness: Freshness) -> Self {
        Self {
            freshness,
            max_capacity: 10_000,
            gc_time: Some(Duration::from_secs(300)),
        }
    }

    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    pub fn with_gc_time(mut self, gc_time: Option<Duration>) -> Self {
        self.gc_time = gc_time;
        self
    }
}

/// Snapshot of a single query as the UI sees it
#[derive(Debug, Clone)]
pub struct QueryState<V, E> {
    /// Last successfully fetched value, possibly stale
    pub data: Option<V>,
    /// Error from the most recent failed load
    pub error: Option<E>,
    /// A load for this key is in flight or waiting on the connection
    pub is_fetching: bool,
    /// `data` is older than its freshness window or was invalidated
    pub is_stale: bool,
    /// Wall-clock time `data` was fetched
    pub updated_at: Option<DateTime<Utc>>,
}

impl<V, E> QueryState<V, E> {
    pub(crate) fn empty() -> Self {
        Self {
            data: None,
            error: None,
            is_fetching: false,
            is_stale: true,
            updated_at: None,
        }
    }

    /// Nothing to show yet, but a result is on its way
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.error.is_none() && self.is_fetching
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Statistics about a cache category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    /// Loader invocations actually started
    pub loads: u64,
    /// Fetches that joined a load already in flight
    pub deduplicated: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_default() {
        let stats = CacheStats::default();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.loads, 0);
        assert_eq!(stats.deduplicated, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_freshness_window() {
        let fetched_at = Instant::now();
        let freshness = Freshness::secs(30);
        assert!(freshness.is_fresh(fetched_at));

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(freshness.is_fresh(fetched_at));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!freshness.is_fresh(fetched_at));
        assert!(Freshness::Forever.is_fresh(fetched_at));
    }

    #[test]
    fn test_zero_window_is_always_stale() {
        let freshness = Freshness::For(Duration::ZERO);
        assert!(!freshness.is_fresh(Instant::now()));
    }

    #[test]
    fn test_query_state_loading() {
        let mut state: QueryState<u32, String> = QueryState::empty();
        assert!(!state.is_loading());
        state.is_fetching = true;
        assert!(state.is_loading());
        state.error = Some("boom".to_string());
        assert!(!state.is_loading());
        assert!(state.is_error());
    }
}
