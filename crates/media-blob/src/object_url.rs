//! Locally minted object URLs and their release discipline

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// Scheme of every locally minted URL
pub const OBJECT_URL_SCHEME: &str = "blob:";

/// Mints and revokes URLs for in-memory objects.
///
/// In a browser this is `URL.createObjectURL` / `URL.revokeObjectURL`.
pub trait ObjectUrlStore: Send + Sync {
    fn create(&self, bytes: Vec<u8>, content_type: &str) -> String;

    /// Release a URL. Unknown and non-local URLs are ignored and return `false`.
    fn revoke(&self, url: &str) -> bool;
}

/// Counters for leak checks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectUrlStats {
    pub live: usize,
    pub live_bytes: u64,
    pub created: u64,
    pub revoked: u64,
}

struct StoredObject {
    bytes: Arc<Vec<u8>>,
    content_type: String,
}

/// Process-local object URL store
pub struct InMemoryObjectUrls {
    origin: String,
    objects: Mutex<HashMap<String, StoredObject>>,
    next_id: AtomicU64,
    created: AtomicU64,
    revoked: AtomicU64,
}

impl InMemoryObjectUrls {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            created: AtomicU64::new(0),
            revoked: AtomicU64::new(0),
        }
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a live object's bytes and content type
    pub fn get(&self, url: &str) -> Option<(Arc<Vec<u8>>, String)> {
        self.objects()
            .get(url)
            .map(|object| (Arc::clone(&object.bytes), object.content_type.clone()))
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.objects().contains_key(url)
    }

    pub fn stats(&self) -> ObjectUrlStats {
        let objects = self.objects();
        ObjectUrlStats {
            live: objects.len(),
            live_bytes: objects.values().map(|o| o.bytes.len() as u64).sum(),
            created: self.created.load(Ordering::Relaxed),
            revoked: self.revoked.load(Ordering::Relaxed),
        }
    }
}

impl Default for InMemoryObjectUrls {
    fn default() -> Self {
        Self::new("golden-water")
    }
}

impl ObjectUrlStore for InMemoryObjectUrls {
    fn create(&self, bytes: Vec<u8>, content_type: &str) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("{OBJECT_URL_SCHEME}{}/{id}", self.origin);

        self.objects().insert(
            url.clone(),
            StoredObject {
                bytes: Arc::new(bytes),
                content_type: content_type.to_string(),
            },
        );
        self.created.fetch_add(1, Ordering::Relaxed);
        url
    }

    fn revoke(&self, url: &str) -> bool {
        if !url.starts_with(OBJECT_URL_SCHEME) {
            return false;
        }

        let removed = self.objects().remove(url).is_some();
        if removed {
            self.revoked.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }
}

/// An object URL owned by exactly one consumer.
///
/// Released on [`release`](Self::release) or drop, whichever comes
/// first; releasing twice is a no-op.
pub struct ObjectUrl {
    url: String,
    store: Arc<dyn ObjectUrlStore>,
    released: bool,
}

impl ObjectUrl {
    pub fn create(store: &Arc<dyn ObjectUrlStore>, bytes: Vec<u8>, content_type: &str) -> Self {
        let url = store.create(bytes, content_type);
        debug!(url = %url, content_type, "Created object URL");
        Self {
            url,
            store: Arc::clone(store),
            released: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.store.revoke(&self.url);
        debug!(url = %self.url, "Released object URL");
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectUrl")
            .field("url", &self.url)
            .field("released", &self.released)
            .finish()
    }
}

/// A renderable URL and whether anything has to be released for it
#[derive(Debug)]
pub enum MediaUrl {
    /// Served by the storage backend; nothing to release
    Direct(String),
    /// Minted locally from fetched bytes
    Materialized(ObjectUrl),
}

impl MediaUrl {
    pub fn as_str(&self) -> &str {
        match self {
            MediaUrl::Direct(url) => url,
            MediaUrl::Materialized(url) => url.as_str(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, MediaUrl::Materialized(_))
    }

    /// Release the URL if it was minted locally
    pub fn release(&mut self) {
        if let MediaUrl::Materialized(url) = self {
            url.release();
        }
    }
}
