//! Keyed query cache with freshness windows and request de-duplication

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use moka::future::Cache;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::gate::ConnectionGate;
use crate::types::{CacheOptions, CacheStats, Freshness, QueryState};

type SharedLoad<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A fetched value and when it was fetched
struct Entry<V> {
    value: V,
    fetched_at: Instant,
    updated_at: DateTime<Utc>,
    invalidated: AtomicBool,
}

impl<V> Entry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
            updated_at: Utc::now(),
            invalidated: AtomicBool::new(false),
        }
    }
}

struct InFlight<V, E> {
    id: u64,
    load: SharedLoad<V, E>,
}

struct Inner<K, V, E> {
    name: &'static str,
    freshness: Freshness,
    gate: ConnectionGate,
    entries: Cache<K, Arc<Entry<V>>>,
    in_flight: Mutex<HashMap<K, InFlight<V, E>>>,
    /// Error from the most recent failed load, per key
    errors: Mutex<HashMap<K, E>>,
    next_load_id: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    deduplicated: AtomicU64,
}

/// One category of cached backend reads.
///
/// Values younger than the category's freshness window are served from
/// memory. Older or invalidated values trigger exactly one loader call no
/// matter how many callers ask for the key at the same time. Clones share
/// the same store.
pub struct QueryCache<K, V, E> {
    inner: Arc<Inner<K, V, E>>,
}

impl<K, V, E> Clone for QueryCache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, E> QueryCache<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Display + Send + Sync + 'static,
{
    /// Create a new cache category
    pub fn new(name: &'static str, options: CacheOptions, gate: ConnectionGate) -> Self {
        let mut builder = Cache::builder().max_capacity(options.max_capacity);
        if let Some(gc_time) = options.gc_time {
            builder = builder.time_to_idle(gc_time);
        }

        Self {
            inner: Arc::new(Inner {
                name,
                freshness: options.freshness,
                gate,
                entries: builder.build(),
                in_flight: Mutex::new(HashMap::new()),
                errors: Mutex::new(HashMap::new()),
                next_load_id: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                loads: AtomicU64::new(0),
                deduplicated: AtomicU64::new(0),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Return the cached value for `key` if fresh, otherwise load it.
    ///
    /// Waits for the connection gate before touching the loader. Concurrent
    /// callers for the same key share a single loader call; only the first
    /// caller's `loader` is ever invoked.
    pub async fn fetch<F, Fut>(&self, key: K, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let inner = &self.inner;
        inner.gate.wait_ready().await;

        if let Some(entry) = inner.entries.get(&key).await {
            if inner.is_fresh(&entry) {
                inner.hits.fetch_add(1, Ordering::Relaxed);
                debug!(cache = inner.name, key = ?key, "Cache hit");
                return Ok(entry.value.clone());
            }
        }
        inner.misses.fetch_add(1, Ordering::Relaxed);

        let load = {
            let mut in_flight = lock(&inner.in_flight);
            match in_flight.get(&key) {
                Some(existing) => {
                    inner.deduplicated.fetch_add(1, Ordering::Relaxed);
                    debug!(cache = inner.name, key = ?key, "Joining in-flight load");
                    existing.load.clone()
                }
                None => {
                    let id = inner.next_load_id.fetch_add(1, Ordering::Relaxed);
                    let pending = loader();
                    let owner = Arc::clone(inner);
                    let load_key = key.clone();
                    let load = async move {
                        let result = pending.await;
                        owner.settle(load_key, id, &result).await;
                        result
                    }
                    .boxed()
                    .shared();

                    in_flight.insert(
                        key.clone(),
                        InFlight {
                            id,
                            load: load.clone(),
                        },
                    );
                    inner.loads.fetch_add(1, Ordering::Relaxed);
                    debug!(cache = inner.name, key = ?key, "Starting load");
                    load
                }
            }
        };

        load.await
    }

    /// Like [`fetch`](Self::fetch), but never fails: a failed load is
    /// reported in `error` next to whatever stale value is still cached.
    pub async fn query<F, Fut>(&self, key: K, loader: F) -> QueryState<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let result = self.fetch(key.clone(), loader).await;
        let mut state = self.peek(&key).await;
        match result {
            Ok(value) => {
                state.data = Some(value);
                state.error = None;
            }
            Err(err) => state.error = Some(err),
        }
        state.is_fetching = false;
        state
    }

    /// Current state of `key` without loading anything
    pub async fn peek(&self, key: &K) -> QueryState<V, E> {
        let inner = &self.inner;
        let mut state = QueryState::empty();

        if let Some(entry) = inner.entries.get(key).await {
            state.is_stale = !inner.is_fresh(&entry);
            state.updated_at = Some(entry.updated_at);
            state.data = Some(entry.value.clone());
        }
        state.error = lock(&inner.errors).get(key).cloned();
        state.is_fetching = !inner.gate.is_ready() || lock(&inner.in_flight).contains_key(key);
        state
    }

    /// Mark `key` stale so the next fetch reloads it
    pub fn invalidate(&self, key: &K) -> usize {
        self.invalidate_if(|candidate| candidate == key)
    }

    pub fn invalidate_all(&self) -> usize {
        self.invalidate_if(|_| true)
    }

    /// Mark every entry whose key matches `predicate` as stale.
    ///
    /// Matching loads still in flight are detached: their callers get the
    /// result, but it is not written back. Returns the number of entries
    /// newly marked.
    pub fn invalidate_if(&self, predicate: impl Fn(&K) -> bool) -> usize {
        let inner = &self.inner;
        let mut marked = 0;
        for (key, entry) in inner.entries.iter() {
            if predicate(&*key) && !entry.invalidated.swap(true, Ordering::Relaxed) {
                marked += 1;
            }
        }

        let detached = {
            let mut in_flight = lock(&inner.in_flight);
            let before = in_flight.len();
            in_flight.retain(|key, _| !predicate(key));
            before - in_flight.len()
        };

        debug!(cache = inner.name, marked, detached, "Invalidated entries");
        marked
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = &self.inner;
        inner.entries.run_pending_tasks().await;
        CacheStats {
            entries: inner.entries.entry_count(),
            hits: inner.hits.load(Ordering::Relaxed),
            misses: inner.misses.load(Ordering::Relaxed),
            loads: inner.loads.load(Ordering::Relaxed),
            deduplicated: inner.deduplicated.load(Ordering::Relaxed),
        }
    }
}

impl<K, V, E> Inner<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Display + Send + Sync + 'static,
{
    fn is_fresh(&self, entry: &Entry<V>) -> bool {
        !entry.invalidated.load(Ordering::Relaxed) && self.freshness.is_fresh(entry.fetched_at)
    }

    fn owns(&self, key: &K, id: u64) -> bool {
        lock(&self.in_flight).get(key).map(|load| load.id) == Some(id)
    }

    /// Drop the in-flight record for `key` if it still belongs to load `id`
    fn release(&self, key: &K, id: u64) -> bool {
        let mut in_flight = lock(&self.in_flight);
        if in_flight.get(key).map(|load| load.id) == Some(id) {
            in_flight.remove(key);
            true
        } else {
            false
        }
    }

    /// Write a finished load back, unless it was detached by invalidation
    async fn settle(&self, key: K, id: u64, result: &Result<V, E>) {
        if !self.owns(&key, id) {
            debug!(cache = self.name, key = ?key, "Discarding result of detached load");
            return;
        }

        match result {
            Ok(value) => {
                let entry = Arc::new(Entry::new(value.clone()));
                self.entries.insert(key.clone(), Arc::clone(&entry)).await;
                lock(&self.errors).remove(&key);
                if !self.release(&key, id) {
                    // Invalidated while the write was landing
                    entry.invalidated.store(true, Ordering::Relaxed);
                }
                debug!(cache = self.name, key = ?key, "Cached load result");
            }
            Err(err) => {
                warn!(cache = self.name, key = ?key, error = %err, "Load failed");
                lock(&self.errors).insert(key.clone(), err.clone());
                self.release(&key, id);
            }
        }
    }
}
