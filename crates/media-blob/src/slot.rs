//! Per-consumer resolution of blob handles into renderable URLs

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{MediaError, Result};
use crate::handle::BlobHandle;
use crate::object_url::{MediaUrl, ObjectUrl, ObjectUrlStore};
use crate::types::MediaKind;

/// What the consumer should render right now
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaState {
    pub url: Option<String>,
    /// Bytes are being fetched for the current handle
    pub loading: bool,
}

struct SlotInner {
    /// Bumped on every handle change and on teardown
    generation: u64,
    handle: Option<BlobHandle>,
    current: Option<MediaUrl>,
    torn_down: bool,
}

struct SlotShared {
    inner: Mutex<SlotInner>,
    state: watch::Sender<MediaState>,
}

impl SlotShared {
    fn inner(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, url: Option<String>, loading: bool) {
        self.state.send_replace(MediaState { url, loading });
    }

    /// Apply the outcome of a byte fetch started for `generation`
    fn finish(
        &self,
        generation: u64,
        result: Result<Vec<u8>>,
        store: &Arc<dyn ObjectUrlStore>,
        content_type: &str,
    ) {
        let mut inner = self.inner();
        let is_current = !inner.torn_down && inner.generation == generation;

        match result {
            Ok(bytes) if is_current => {
                let url = ObjectUrl::create(store, bytes, content_type);
                let href = url.as_str().to_string();
                inner.current = Some(MediaUrl::Materialized(url));
                self.publish(Some(href), false);
            }
            Ok(_) => {
                debug!(generation, "Discarding bytes for superseded blob handle");
            }
            Err(err) => {
                warn!(generation, error = %err, "Failed to fetch blob bytes");
                if is_current {
                    self.publish(None, false);
                }
            }
        }
    }
}

/// Resolves the blob handle a single UI element currently shows.
///
/// Direct URLs are used as-is. Handles without one have their bytes
/// fetched in the background and turned into an object URL, which the
/// slot owns and releases when the handle changes, goes away, or the slot
/// is torn down. Results for a handle that is no longer current are
/// dropped on arrival.
pub struct BlobUrlSlot {
    kind: MediaKind,
    store: Arc<dyn ObjectUrlStore>,
    shared: Arc<SlotShared>,
}

impl BlobUrlSlot {
    pub fn new(kind: MediaKind, store: Arc<dyn ObjectUrlStore>) -> Self {
        let (state, _rx) = watch::channel(MediaState::default());
        Self {
            kind,
            store,
            shared: Arc::new(SlotShared {
                inner: Mutex::new(SlotInner {
                    generation: 0,
                    handle: None,
                    current: None,
                    torn_down: false,
                }),
                state,
            }),
        }
    }

    /// Point the slot at `handle` and return the URL available right now.
    ///
    /// `None` means either no media or bytes still loading; see
    /// [`state`](Self::state) or [`settled`](Self::settled). Must be called
    /// from within a tokio runtime when the handle has no direct URL.
    pub fn resolve(&self, handle: Option<BlobHandle>) -> Option<String> {
        let mut inner = self.shared.inner();
        if inner.torn_down {
            warn!("Resolve called on a torn down media slot");
            return None;
        }

        if let (Some(new), Some(old)) = (&handle, &inner.handle) {
            if new.same_handle(old) {
                return inner.current.as_ref().map(|url| url.as_str().to_string());
            }
        }

        inner.generation += 1;
        let generation = inner.generation;
        if let Some(mut previous) = inner.current.take() {
            previous.release();
        }
        inner.handle = handle.clone();

        let Some(handle) = handle else {
            self.shared.publish(None, false);
            return None;
        };

        if let Some(url) = handle.direct_url() {
            debug!(generation, url = %url, "Using direct blob URL");
            inner.current = Some(MediaUrl::Direct(url.clone()));
            self.shared.publish(Some(url.clone()), false);
            return Some(url);
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(generation, error = %MediaError::NoRuntime, "Cannot materialize blob");
                // Not resolved, so a later call with the same handle must retry
                inner.handle = None;
                self.shared.publish(None, false);
                return None;
            }
        };

        self.shared.publish(None, true);
        drop(inner);

        let shared = Arc::clone(&self.shared);
        let store = Arc::clone(&self.store);
        let content_type = self.kind.default_content_type();
        runtime.spawn(async move {
            let result = handle.bytes().await;
            shared.finish(generation, result, &store, content_type);
        });

        None
    }

    /// Resolve and wait until the URL for `handle` is known
    pub async fn resolve_settled(&self, handle: Option<BlobHandle>) -> Option<String> {
        self.resolve(handle);
        self.settled().await.url
    }

    pub fn url(&self) -> Option<String> {
        self.shared.state.borrow().url.clone()
    }

    pub fn state(&self) -> MediaState {
        self.shared.state.borrow().clone()
    }

    /// Watch the slot's state as fetches complete
    pub fn subscribe(&self) -> watch::Receiver<MediaState> {
        self.shared.state.subscribe()
    }

    /// Wait until no fetch is pending for the current handle
    pub async fn settled(&self) -> MediaState {
        let mut rx = self.subscribe();
        let settled = match rx.wait_for(|state| !state.loading).await {
            Ok(state) => state.clone(),
            Err(_) => MediaState::default(),
        };
        settled
    }

    /// Release whatever the slot holds and ignore any fetch still running.
    ///
    /// Called automatically on drop; calling it twice is harmless.
    pub fn teardown(&self) {
        let mut inner = self.shared.inner();
        if inner.torn_down {
            return;
        }
        inner.torn_down = true;
        inner.generation += 1;
        inner.handle = None;
        if let Some(mut current) = inner.current.take() {
            current.release();
        }
        self.shared.publish(None, false);
        debug!("Media slot torn down");
    }
}

impl Drop for BlobUrlSlot {
    fn drop(&mut self) {
        self.teardown();
    }
}
