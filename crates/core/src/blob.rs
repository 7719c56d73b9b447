//! In-memory object URL store for conversion results.
//!
//! A [`BlobUrl`] stays valid until it is revoked. The pipeline revokes the
//! current result before it is superseded, so `live_count` returning to
//! zero after a reset means nothing leaked.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Opaque reference to a registered blob (`blob:<uuid>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobUrl(String);

impl BlobUrl {
    fn generate() -> Self {
        Self(format!("blob:{}", Uuid::new_v4()))
    }

    /// The URL string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered byte blob.
#[derive(Debug, Clone)]
pub struct Blob {
    /// Contents.
    pub bytes: Arc<Vec<u8>>,
    /// MIME type the blob is served with.
    pub mime_type: String,
}

impl Blob {
    /// Size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Shared registry of live blobs. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct BlobRegistry {
    blobs: Arc<RwLock<HashMap<BlobUrl, Blob>>>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `bytes` and returns a fresh URL for them.
    pub async fn create(&self, bytes: Vec<u8>, mime_type: impl Into<String>) -> BlobUrl {
        let url = BlobUrl::generate();
        let blob = Blob {
            bytes: Arc::new(bytes),
            mime_type: mime_type.into(),
        };
        self.blobs.write().await.insert(url.clone(), blob);
        url
    }

    /// Looks up a live blob.
    pub async fn get(&self, url: &BlobUrl) -> Option<Blob> {
        self.blobs.read().await.get(url).cloned()
    }

    /// Releases a blob. Returns false if it was already released.
    pub async fn revoke(&self, url: &BlobUrl) -> bool {
        self.blobs.write().await.remove(url).is_some()
    }

    /// Number of blobs not yet revoked.
    pub async fn live_count(&self) -> usize {
        self.blobs.read().await.len()
    }
}
