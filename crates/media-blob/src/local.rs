//! Files picked by the user before they are uploaded

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tracing::debug;

use crate::error::Result;
use crate::handle::BlobHandle;
use crate::object_url::{ObjectUrl, ObjectUrlStore};
use crate::types::MediaKind;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Guess a content type from a file extension
pub fn content_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("mp4" | "m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("ogg" | "ogv") => "video/ogg",
        Some("mov") => "video/quicktime",
        _ => FALLBACK_CONTENT_TYPE,
    }
}

/// A local file held in memory
#[derive(Clone)]
pub struct LocalFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    pub fn new(name: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            content_type: content_type.to_string(),
            bytes,
        }
    }

    /// Read a file from disk, taking its content type from the extension
    pub async fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(path = ?path, size = bytes.len(), "Read local media file");
        Ok(Self {
            name,
            content_type: content_type_for_path(path).to_string(),
            bytes,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn validate(&self, kind: MediaKind) -> Result<()> {
        kind.validate(&self.content_type, self.size())
    }

    /// Turn the file into a handle the backend can upload
    pub fn into_handle(self) -> BlobHandle {
        BlobHandle::from_bytes(self.bytes)
    }
}

impl fmt::Debug for LocalFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Preview URL for a file that has not been uploaded yet.
///
/// There is no server copy to point at, so every preview is a locally
/// minted object URL. Showing another file, clearing, or dropping the
/// preview releases the previous URL.
pub struct LocalPreview {
    store: Arc<dyn ObjectUrlStore>,
    current: Option<ObjectUrl>,
}

impl LocalPreview {
    pub fn new(store: Arc<dyn ObjectUrlStore>) -> Self {
        Self {
            store,
            current: None,
        }
    }

    /// Show `file`, releasing whatever was shown before
    pub fn show(&mut self, file: &LocalFile) -> &str {
        self.clear();
        let url = ObjectUrl::create(&self.store, file.bytes.clone(), &file.content_type);
        self.current.insert(url).as_str()
    }

    pub fn url(&self) -> Option<&str> {
        self.current.as_ref().map(ObjectUrl::as_str)
    }

    pub fn clear(&mut self) {
        if let Some(mut url) = self.current.take() {
            url.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use crate::object_url::InMemoryObjectUrls;
    use tempfile::tempdir;

    #[test]
    fn test_content_type_for_path() {
        assert_eq!(content_type_for_path(Path::new("a/b/photo.JPG")), "image/jpeg");
        assert_eq!(content_type_for_path(Path::new("clip.mov")), "video/quicktime");
        assert_eq!(content_type_for_path(Path::new("clip.webm")), "video/webm");
        assert_eq!(content_type_for_path(Path::new("notes.txt")), FALLBACK_CONTENT_TYPE);
        assert_eq!(content_type_for_path(Path::new("README")), FALLBACK_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_read_local_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sunset.png");
        std::fs::write(&path, b"\x89PNG fake").unwrap();

        let file = LocalFile::read(&path).await.unwrap();
        assert_eq!(file.name, "sunset.png");
        assert_eq!(file.content_type, "image/png");
        assert_eq!(file.size(), 9);
        assert!(file.validate(MediaKind::Image).is_ok());
        assert!(matches!(
            file.validate(MediaKind::Video),
            Err(MediaError::UnsupportedType { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let result = LocalFile::read(dir.path().join("missing.jpg")).await;
        assert!(matches!(result, Err(MediaError::Io(_))));
    }

    #[tokio::test]
    async fn test_into_handle_keeps_bytes() {
        let file = LocalFile::new("clip.mp4", "video/mp4", vec![4, 5, 6]);
        let handle = file.into_handle();
        assert!(handle.direct_url().is_none());
        assert_eq!(handle.bytes().await.unwrap(), vec![4, 5, 6]);
    }

    #[test]
    fn test_preview_releases_previous_url() {
        let urls = Arc::new(InMemoryObjectUrls::default());
        let store: Arc<dyn ObjectUrlStore> = urls.clone();
        let mut preview = LocalPreview::new(store);

        let first = preview
            .show(&LocalFile::new("a.jpg", "image/jpeg", vec![1]))
            .to_string();
        let second = preview
            .show(&LocalFile::new("b.mp4", "video/mp4", vec![2]))
            .to_string();

        assert!(!urls.is_live(&first));
        assert!(urls.is_live(&second));
        assert_eq!(urls.get(&second).unwrap().1, "video/mp4");
        assert_eq!(preview.url(), Some(second.as_str()));

        preview.clear();
        preview.clear();
        assert!(preview.url().is_none());
        assert_eq!(urls.stats().live, 0);
        assert_eq!(urls.stats().revoked, 2);
    }

    #[test]
    fn test_preview_released_on_drop() {
        let urls = Arc::new(InMemoryObjectUrls::default());
        let store: Arc<dyn ObjectUrlStore> = urls.clone();
        {
            let mut preview = LocalPreview::new(store);
            preview.show(&LocalFile::new("a.gif", "image/gif", vec![0; 10]));
            assert_eq!(urls.stats().live, 1);
        }
        assert_eq!(urls.stats().live, 0);
    }
}
