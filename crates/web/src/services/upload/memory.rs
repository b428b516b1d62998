//! In-process asset storage for tests and offline development.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::body::Bytes;
use tokio::sync::Mutex;

use yelpcamp_core::ImageFormat;

use super::{AssetStorage, StoredAsset, UploadError};

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    assets: HashMap<String, Bytes>,
}

/// Keeps uploaded bytes in memory and serves nothing.
#[derive(Debug)]
pub struct MemoryAssetStorage {
    folder: String,
    inner: Mutex<Inner>,
}

impl MemoryAssetStorage {
    /// Storage that files every asset under `folder`.
    #[must_use]
    pub fn new(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            inner: Mutex::default(),
        }
    }

    /// Number of assets currently held.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.assets.len()
    }

    /// Whether nothing is held.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether an asset with `public_id` is held.
    pub async fn contains(&self, public_id: &str) -> bool {
        self.inner.lock().await.assets.contains_key(public_id)
    }
}

impl Default for MemoryAssetStorage {
    fn default() -> Self {
        Self::new("yelp-camp")
    }
}

#[async_trait]
impl AssetStorage for MemoryAssetStorage {
    async fn store(&self, bytes: Bytes, format: ImageFormat) -> Result<StoredAsset, UploadError> {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let public_id = format!("{}/asset-{}", self.folder, inner.next_id);
        inner.assets.insert(public_id.clone(), bytes);

        Ok(StoredAsset {
            url: format!("memory://{public_id}.{format}"),
            public_id,
            folder: self.folder.clone(),
            format,
        })
    }

    async fn discard(&self, asset: &StoredAsset) -> Result<(), UploadError> {
        self.inner.lock().await.assets.remove(&asset.public_id);
        Ok(())
    }
}
