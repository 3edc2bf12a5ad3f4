//! Cursor-paginated queries that accumulate pages under one identity

use std::fmt::{Debug, Display};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::lock;
use crate::gate::ConnectionGate;
use crate::types::Freshness;

/// A page of results that knows where the next page starts
pub trait Page: Clone + Send + Sync + 'static {
    type Cursor: Clone + Debug + PartialEq + Send + Sync + 'static;

    /// Cursor of the following page, `None` when this is the last one
    fn next_cursor(&self) -> Option<Self::Cursor>;
}

/// Accumulated pages as the UI sees them
#[derive(Debug, Clone)]
pub struct PagesSnapshot<P, E> {
    pub pages: Vec<P>,
    pub has_next_page: bool,
    pub is_stale: bool,
    pub is_fetching: bool,
    pub error: Option<E>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadKind {
    /// Load the first page and start a new sequence from it
    Restart,
    /// Load the page after the last accumulated one
    Append,
}

struct PagedState<P, E> {
    pages: Vec<P>,
    fetched_at: Option<Instant>,
    invalidated: bool,
    /// Bumped whenever the sequence is restarted or invalidated; loads
    /// started under an older epoch are dropped on arrival.
    epoch: u64,
    error: Option<E>,
}

struct PageLoad<P: Page, E> {
    id: u64,
    kind: LoadKind,
    cursor: P::Cursor,
    epoch: u64,
    /// Resolves to the page and whether it landed in the live sequence
    load: Shared<BoxFuture<'static, (Result<P, E>, bool)>>,
}

struct PagedInner<P: Page, E> {
    name: &'static str,
    freshness: Freshness,
    gate: ConnectionGate,
    initial_cursor: P::Cursor,
    state: Mutex<PagedState<P, E>>,
    in_flight: Mutex<Vec<PageLoad<P, E>>>,
    next_load_id: AtomicU64,
}

/// An infinite-scroll style query.
///
/// Pages are fetched one at a time starting from `initial_cursor` and
/// appended in order. Invalidation throws the sequence away: positions
/// shift when the server inserts items, so later pages from an old
/// sequence are never mixed into a new one.
pub struct PagedQuery<P: Page, E> {
    inner: Arc<PagedInner<P, E>>,
}

impl<P: Page, E> Clone for PagedQuery<P, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, E> PagedQuery<P, E>
where
    P: Page,
    E: Clone + Display + Send + Sync + 'static,
{
    pub fn new(
        name: &'static str,
        initial_cursor: P::Cursor,
        freshness: Freshness,
        gate: ConnectionGate,
    ) -> Self {
        Self {
            inner: Arc::new(PagedInner {
                name,
                freshness,
                gate,
                initial_cursor,
                state: Mutex::new(PagedState {
                    pages: Vec::new(),
                    fetched_at: None,
                    invalidated: false,
                    epoch: 0,
                    error: None,
                }),
                in_flight: Mutex::new(Vec::new()),
                next_load_id: AtomicU64::new(0),
            }),
        }
    }

    /// Return the accumulated pages if fresh, otherwise restart from the
    /// first page.
    ///
    /// A load cut off by [`invalidate`](Self::invalidate) is retried from
    /// the first page, so only pages of the live sequence are returned.
    pub async fn first_page<F, Fut>(&self, loader: F) -> Result<PagesSnapshot<P, E>, E>
    where
        F: Fn(P::Cursor) -> Fut,
        Fut: Future<Output = Result<P, E>> + Send + 'static,
    {
        self.inner.gate.wait_ready().await;

        loop {
            let epoch = {
                let state = lock(&self.inner.state);
                if self.inner.is_fresh(&state) {
                    debug!(query = self.inner.name, pages = state.pages.len(), "Pages served from cache");
                    return Ok(self.inner.snapshot(&state));
                }
                state.epoch
            };

            let cursor = self.inner.initial_cursor.clone();
            if self.load(LoadKind::Restart, cursor, epoch, &loader).await? {
                return Ok(self.pages());
            }
            debug!(query = self.inner.name, "Sequence invalidated mid-load, restarting");
        }
    }

    /// Fetch the page after the last accumulated one.
    ///
    /// With nothing accumulated yet, or after invalidation, this restarts
    /// from the first page instead. When the last page has no next cursor
    /// the current pages are returned unchanged. A load cut off by
    /// invalidation is retried against the live sequence.
    pub async fn next_page<F, Fut>(&self, loader: F) -> Result<PagesSnapshot<P, E>, E>
    where
        F: Fn(P::Cursor) -> Fut,
        Fut: Future<Output = Result<P, E>> + Send + 'static,
    {
        self.inner.gate.wait_ready().await;

        loop {
            let (kind, cursor, epoch) = {
                let state = lock(&self.inner.state);
                if state.pages.is_empty() || state.invalidated {
                    (LoadKind::Restart, self.inner.initial_cursor.clone(), state.epoch)
                } else {
                    match state.pages.last().and_then(P::next_cursor) {
                        Some(cursor) => (LoadKind::Append, cursor, state.epoch),
                        None => return Ok(self.inner.snapshot(&state)),
                    }
                }
            };

            if self.load(kind, cursor, epoch, &loader).await? {
                return Ok(self.pages());
            }
            debug!(query = self.inner.name, "Sequence invalidated mid-load, restarting");
        }
    }

    /// Current pages without loading anything
    pub fn pages(&self) -> PagesSnapshot<P, E> {
        let state = lock(&self.inner.state);
        self.inner.snapshot(&state)
    }

    /// Mark the sequence stale and detach any page loads in flight.
    ///
    /// The next access restarts from the first page.
    pub fn invalidate(&self) {
        let detached = {
            let mut in_flight = lock(&self.inner.in_flight);
            let count = in_flight.len();
            in_flight.clear();
            count
        };

        let mut state = lock(&self.inner.state);
        state.invalidated = true;
        state.epoch += 1;
        debug!(query = self.inner.name, detached, epoch = state.epoch, "Invalidated pages");
    }

    /// Run or join a page load. `Ok(false)` means the load was cut off and
    /// its outcome ignored.
    async fn load<F, Fut>(
        &self,
        kind: LoadKind,
        cursor: P::Cursor,
        epoch: u64,
        loader: F,
    ) -> Result<bool, E>
    where
        F: FnOnce(P::Cursor) -> Fut,
        Fut: Future<Output = Result<P, E>> + Send + 'static,
    {
        let inner = &self.inner;
        let load = {
            let mut in_flight = lock(&inner.in_flight);
            let existing = in_flight
                .iter()
                .find(|load| load.kind == kind && load.epoch == epoch && load.cursor == cursor);

            match existing {
                Some(existing) => {
                    debug!(query = inner.name, cursor = ?cursor, "Joining in-flight page load");
                    existing.load.clone()
                }
                None => {
                    let id = inner.next_load_id.fetch_add(1, Ordering::Relaxed);
                    let pending = loader(cursor.clone());
                    let owner = Arc::clone(inner);
                    let load_cursor = cursor.clone();
                    let load = async move {
                        let result = pending.await;
                        let current = owner.settle(id, kind, load_cursor, epoch, &result);
                        (result, current)
                    }
                    .boxed()
                    .shared();

                    in_flight.push(PageLoad {
                        id,
                        kind,
                        cursor: cursor.clone(),
                        epoch,
                        load: load.clone(),
                    });
                    debug!(query = inner.name, cursor = ?cursor, ?kind, "Starting page load");
                    load
                }
            }
        };

        let (result, current) = load.await;
        if !current {
            return Ok(false);
        }
        result.map(|_| true)
    }
}

impl<P, E> PagedInner<P, E>
where
    P: Page,
    E: Clone + Display + Send + Sync + 'static,
{
    fn is_fresh(&self, state: &PagedState<P, E>) -> bool {
        !state.pages.is_empty()
            && !state.invalidated
            && state
                .fetched_at
                .is_some_and(|fetched_at| self.freshness.is_fresh(fetched_at))
    }

    fn snapshot(&self, state: &PagedState<P, E>) -> PagesSnapshot<P, E> {
        let is_fetching = !self.gate.is_ready() || !lock(&self.in_flight).is_empty();
        PagesSnapshot {
            pages: state.pages.clone(),
            has_next_page: state
                .pages
                .last()
                .is_some_and(|page| page.next_cursor().is_some()),
            is_stale: !self.is_fresh(state),
            is_fetching,
            error: state.error.clone(),
        }
    }

    fn settle(
        &self,
        id: u64,
        kind: LoadKind,
        cursor: P::Cursor,
        epoch: u64,
        result: &Result<P, E>,
    ) -> bool {
        let owned = {
            let mut in_flight = lock(&self.in_flight);
            let before = in_flight.len();
            in_flight.retain(|load| load.id != id);
            before != in_flight.len()
        };
        if !owned {
            debug!(query = self.name, cursor = ?cursor, "Discarding page from detached load");
            return false;
        }

        let mut state = lock(&self.state);
        if state.epoch != epoch {
            debug!(query = self.name, cursor = ?cursor, "Discarding page from an older sequence");
            return false;
        }

        match result {
            Ok(page) => match kind {
                LoadKind::Restart => {
                    state.pages = vec![page.clone()];
                    state.fetched_at = Some(Instant::now());
                    state.invalidated = false;
                    state.epoch += 1;
                    state.error = None;
                }
                LoadKind::Append => {
                    let expected = state.pages.last().and_then(P::next_cursor);
                    if expected.as_ref() == Some(&cursor) {
                        state.pages.push(page.clone());
                        state.error = None;
                    } else {
                        debug!(query = self.name, cursor = ?cursor, "Dropping out-of-sequence page");
                    }
                }
            },
            Err(err) => {
                warn!(query = self.name, cursor = ?cursor, error = %err, "Page load failed");
                state.error = Some(err.clone());
            }
        }
        true
    }
}
