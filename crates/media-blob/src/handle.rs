//! Blob handles: opaque references to externally stored media

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{MediaError, Result};

/// Where a blob's bytes come from.
///
/// A source can offer a URL the renderer can use as-is; when it cannot,
/// the bytes have to be fetched and materialized locally.
#[async_trait]
pub trait BlobSource: Send + Sync + fmt::Debug {
    /// URL served directly by the storage backend, if there is one
    fn direct_url(&self) -> Option<String>;

    /// Fetch the full payload
    async fn bytes(&self) -> Result<Vec<u8>>;
}

/// Cheaply clonable handle to a blob.
///
/// Two handles are the same handle when they point at the same source,
/// not when their bytes happen to match.
#[derive(Clone)]
pub struct BlobHandle(Arc<dyn BlobSource>);

impl BlobHandle {
    pub fn new(source: impl BlobSource + 'static) -> Self {
        Self(Arc::new(source))
    }

    /// Wrap raw bytes, e.g. a file about to be uploaded
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(BytesBlob::new(bytes))
    }

    /// Reference a blob served over HTTP
    pub fn from_url(url: &str) -> Result<Self> {
        Self::from_url_with_client(Client::new(), url)
    }

    pub fn from_url_with_client(client: Client, url: &str) -> Result<Self> {
        Ok(Self::new(RemoteBlob::new(client, url)?))
    }

    pub fn direct_url(&self) -> Option<String> {
        self.0.direct_url()
    }

    pub async fn bytes(&self) -> Result<Vec<u8>> {
        self.0.bytes().await
    }

    pub fn same_handle(&self, other: &BlobHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BlobHandle").field(&self.0).finish()
    }
}

/// In-memory payload with no direct URL
pub struct BytesBlob {
    bytes: Arc<Vec<u8>>,
}

impl BytesBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(bytes),
        }
    }
}

impl fmt::Debug for BytesBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BytesBlob")
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[async_trait]
impl BlobSource for BytesBlob {
    fn direct_url(&self) -> Option<String> {
        None
    }

    async fn bytes(&self) -> Result<Vec<u8>> {
        Ok(self.bytes.as_ref().clone())
    }
}

/// Blob served from an HTTP(S) URL
#[derive(Debug)]
pub struct RemoteBlob {
    client: Client,
    url: Url,
}

impl RemoteBlob {
    pub fn new(client: Client, url: &str) -> Result<Self> {
        let url = Url::parse(url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MediaError::Fetch(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            )));
        }
        Ok(Self { client, url })
    }
}

#[async_trait]
impl BlobSource for RemoteBlob {
    fn direct_url(&self) -> Option<String> {
        Some(self.url.to_string())
    }

    async fn bytes(&self) -> Result<Vec<u8>> {
        debug!(url = %self.url, "Fetching blob bytes");
        let response = self.client.get(self.url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(MediaError::Fetch(format!(
                "{} returned status {}",
                self.url,
                response.status()
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
