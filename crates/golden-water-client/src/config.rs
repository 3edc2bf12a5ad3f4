use std::env;
use std::time::Duration;

use query_cache::{CacheOptions, Freshness};

/// How long each category of reads stays fresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleTimes {
    /// Feed pages
    pub posts: Duration,
    /// Single post lookups
    pub post: Duration,
    pub comments: Duration,
    /// Reported posts, reported comments and flagged posts
    pub admin: Duration,
    pub profile: Duration,
    pub username: Duration,
    /// Whether the caller is an admin
    pub role: Duration,
    /// The caller's selected reactions
    pub reaction: Duration,
}

impl Default for StaleTimes {
    fn default() -> Self {
        Self {
            posts: Duration::from_secs(30),
            post: Duration::from_secs(60),
            comments: Duration::from_secs(30),
            admin: Duration::from_secs(30),
            profile: Duration::from_secs(60),
            username: Duration::from_secs(5 * 60),
            role: Duration::from_secs(5 * 60),
            reaction: Duration::from_secs(60),
        }
    }
}

/// Client configuration parsed from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Posts per feed page
    pub page_size: u64,
    /// Maximum entries per cache category
    pub cache_capacity: u64,
    /// How long unused entries are kept before they are collected
    pub gc_time: Duration,
    pub stale: StaleTimes,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            cache_capacity: 10_000,
            gc_time: Duration::from_secs(300),
            stale: StaleTimes::default(),
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_secs(name: &str, default: Duration) -> Duration {
    env_u64(name).map(Duration::from_secs).unwrap_or(default)
}

impl ClientConfig {
    /// Parse configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let page_size = env_u64("GOLDEN_WATER_PAGE_SIZE")
            .filter(|size| *size > 0)
            .unwrap_or(defaults.page_size);

        let cache_capacity =
            env_u64("GOLDEN_WATER_CACHE_CAPACITY").unwrap_or(defaults.cache_capacity);

        let gc_time = env_secs("GOLDEN_WATER_GC_SECS", defaults.gc_time);

        let stale = StaleTimes {
            posts: env_secs("GOLDEN_WATER_STALE_POSTS_SECS", defaults.stale.posts),
            post: env_secs("GOLDEN_WATER_STALE_POST_SECS", defaults.stale.post),
            comments: env_secs("GOLDEN_WATER_STALE_COMMENTS_SECS", defaults.stale.comments),
            admin: env_secs("GOLDEN_WATER_STALE_ADMIN_SECS", defaults.stale.admin),
            profile: env_secs("GOLDEN_WATER_STALE_PROFILE_SECS", defaults.stale.profile),
            username: env_secs("GOLDEN_WATER_STALE_USERNAME_SECS", defaults.stale.username),
            role: env_secs("GOLDEN_WATER_STALE_ROLE_SECS", defaults.stale.role),
            reaction: env_secs("GOLDEN_WATER_STALE_REACTION_SECS", defaults.stale.reaction),
        };

        Self {
            page_size,
            cache_capacity,
            gc_time,
            stale,
        }
    }

    /// Cache options for a category that goes stale after `stale`
    pub fn cache_options(&self, stale: Duration) -> CacheOptions {
        CacheOptions::new(Freshness::For(stale))
            .with_max_capacity(self.cache_capacity)
            .with_gc_time(Some(self.gc_time))
    }

    /// Cache options for reads that never go stale and are kept for the session
    pub fn permanent_options(&self) -> CacheOptions {
        CacheOptions::new(Freshness::Forever)
            .with_max_capacity(self.cache_capacity)
            .with_gc_time(None)
    }
}
