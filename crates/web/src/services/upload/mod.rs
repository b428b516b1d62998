//! Upload delegate.
//!
//! Validates the declared format of incoming files and hands them to an
//! [`AssetStorage`] provider. A stored asset is immutable; replacing an image
//! means storing a new asset.
//!
//! The provider and the database are not transactional with each other, so
//! callers persist the owning entity through [`persist_with_assets`], which
//! discards the assets again if persisting fails. Discards are best effort:
//! a failure is logged and the asset is left behind.

mod cloudinary;
mod error;
mod memory;

pub use cloudinary::CloudinaryStorage;
pub use error::UploadError;
pub use memory::MemoryAssetStorage;

use async_trait::async_trait;
use axum::body::Bytes;
use serde::{Deserialize, Serialize};

use yelpcamp_core::ImageFormat;

/// An image held by the upload provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAsset {
    /// Provider-assigned identifier, used for deletion.
    pub public_id: String,
    /// Public retrieval URL.
    pub url: String,
    /// Folder the asset was stored under.
    pub folder: String,
    pub format: ImageFormat,
}

/// A remote image store.
#[async_trait]
pub trait AssetStorage: Send + Sync {
    /// Store `bytes` as an image of `format`.
    async fn store(&self, bytes: Bytes, format: ImageFormat) -> Result<StoredAsset, UploadError>;

    /// Delete a previously stored asset.
    async fn discard(&self, asset: &StoredAsset) -> Result<(), UploadError>;
}

/// A file as received from a multipart form.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl IncomingFile {
    /// The format the client declared for this file.
    ///
    /// The file name's extension wins; the content type is used when the
    /// name has no extension.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::UnsupportedFormat` when neither declares png,
    /// jpeg or jpg.
    pub fn declared_format(&self) -> Result<ImageFormat, UploadError> {
        let by_name = self
            .file_name
            .as_deref()
            .filter(|name| name.contains('.'))
            .map(ImageFormat::from_file_name);

        let format = match (by_name, self.content_type.as_deref()) {
            (Some(result), _) => result?,
            (None, Some(mime)) => ImageFormat::from_mime(mime)?,
            (None, None) => {
                return Err(yelpcamp_core::UnsupportedImageFormat(
                    self.file_name.clone().unwrap_or_default(),
                )
                .into());
            }
        };
        Ok(format)
    }

    fn validate(&self) -> Result<ImageFormat, UploadError> {
        let format = self.declared_format()?;
        if self.bytes.is_empty() {
            return Err(UploadError::EmptyFile);
        }
        Ok(format)
    }
}

/// Validate and store a single file.
///
/// # Errors
///
/// Returns `UploadError::UnsupportedFormat` or `UploadError::EmptyFile`
/// before contacting the provider, otherwise whatever the provider returns.
pub async fn store(
    storage: &dyn AssetStorage,
    file: IncomingFile,
) -> Result<StoredAsset, UploadError> {
    let format = file.validate()?;
    storage.store(file.bytes, format).await
}

/// Validate and store several files.
///
/// Every file is validated before the first upload. If an upload fails, the
/// assets already stored by this call are discarded.
///
/// # Errors
///
/// Returns the first validation or provider error.
pub async fn store_all(
    storage: &dyn AssetStorage,
    files: Vec<IncomingFile>,
) -> Result<Vec<StoredAsset>, UploadError> {
    let validated = files
        .into_iter()
        .map(|file| file.validate().map(|format| (file.bytes, format)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut stored = Vec::with_capacity(validated.len());
    for (bytes, format) in validated {
        match storage.store(bytes, format).await {
            Ok(asset) => stored.push(asset),
            Err(e) => {
                tracing::warn!(error = %e, stored = stored.len(), "upload failed, discarding batch");
                discard_all(storage, &stored).await;
                return Err(e);
            }
        }
    }
    Ok(stored)
}

/// Run `persist` for an entity that references `assets`; discard the assets
/// if it fails.
///
/// # Errors
///
/// Returns the error from `persist` unchanged.
pub async fn persist_with_assets<T, E, F, Fut>(
    storage: &dyn AssetStorage,
    assets: &[StoredAsset],
    persist: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<T, E>> + Send,
{
    let result = persist().await;
    if result.is_err() {
        discard_all(storage, assets).await;
    }
    result
}

/// Discard each asset once; failures are logged, not retried.
pub async fn discard_all(storage: &dyn AssetStorage, assets: &[StoredAsset]) {
    for asset in assets {
        if let Err(e) = storage.discard(asset).await {
            tracing::error!(
                public_id = %asset.public_id,
                error = %e,
                "failed to discard orphaned asset"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn file(name: &str, content_type: Option<&str>) -> IncomingFile {
        IncomingFile {
            file_name: Some(name.to_string()),
            content_type: content_type.map(str::to_string),
            bytes: Bytes::from_static(b"not really an image"),
        }
    }

    /// Storage whose `fail_at`-th store (0-based) fails.
    struct FlakyStorage {
        memory: MemoryAssetStorage,
        calls: AtomicUsize,
        fail_at: usize,
    }

    #[async_trait]
    impl AssetStorage for FlakyStorage {
        async fn store(
            &self,
            bytes: Bytes,
            format: ImageFormat,
        ) -> Result<StoredAsset, UploadError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == self.fail_at {
                return Err(UploadError::Provider {
                    status: 500,
                    message: "boom".to_string(),
                });
            }
            self.memory.store(bytes, format).await
        }

        async fn discard(&self, asset: &StoredAsset) -> Result<(), UploadError> {
            self.memory.discard(asset).await
        }
    }

    #[test]
    fn test_declared_format() {
        assert_eq!(
            file("tent.PNG", None).declared_format().unwrap(),
            ImageFormat::Png
        );
        assert_eq!(
            file("blob", Some("image/jpeg")).declared_format().unwrap(),
            ImageFormat::Jpeg
        );
        // Extension beats content type.
        assert!(matches!(
            file("tent.gif", Some("image/png")).declared_format(),
            Err(UploadError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            file("blob", None).declared_format(),
            Err(UploadError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_format_stores_nothing() {
        let storage = MemoryAssetStorage::default();
        for name in ["map.gif", "trail.webp", "notes.txt", "campsite.svg"] {
            let err = store(&storage, file(name, None)).await.unwrap_err();
            assert!(matches!(err, UploadError::UnsupportedFormat(_)), "{name}");
        }
        assert_eq!(storage.len().await, 0);
    }

    #[tokio::test]
    async fn test_store_uses_folder() {
        let storage = MemoryAssetStorage::new("yelp-camp");
        let asset = store(&storage, file("lake.jpg", None)).await.unwrap();
        assert_eq!(asset.folder, "yelp-camp");
        assert_eq!(asset.format, ImageFormat::Jpg);
        assert!(asset.public_id.starts_with("yelp-camp/"));
        assert!(storage.contains(&asset.public_id).await);
    }

    #[tokio::test]
    async fn test_empty_file_rejected() {
        let storage = MemoryAssetStorage::default();
        let mut empty = file("lake.png", None);
        empty.bytes = Bytes::new();
        assert!(matches!(
            store(&storage, empty).await,
            Err(UploadError::EmptyFile)
        ));
    }

    #[tokio::test]
    async fn test_store_all_validates_before_uploading() {
        let storage = MemoryAssetStorage::default();
        let files = vec![file("a.png", None), file("b.gif", None)];
        assert!(store_all(&storage, files).await.is_err());
        assert_eq!(storage.len().await, 0);
    }

    #[tokio::test]
    async fn test_store_all_discards_partial_batch() {
        let storage = FlakyStorage {
            memory: MemoryAssetStorage::default(),
            calls: AtomicUsize::new(0),
            fail_at: 2,
        };
        let files = vec![
            file("a.png", None),
            file("b.jpeg", None),
            file("c.jpg", None),
        ];

        let err = store_all(&storage, files).await.unwrap_err();
        assert!(matches!(err, UploadError::Provider { status: 500, .. }));
        assert_eq!(storage.memory.len().await, 0);
    }

    #[tokio::test]
    async fn test_persist_failure_discards_assets() {
        let storage = MemoryAssetStorage::default();
        let assets = store_all(&storage, vec![file("a.png", None), file("b.png", None)])
            .await
            .unwrap();
        assert_eq!(storage.len().await, 2);

        let result: Result<(), &str> =
            persist_with_assets(&storage, &assets, || async { Err("insert failed") }).await;
        assert_eq!(result, Err("insert failed"));
        assert_eq!(storage.len().await, 0);
    }

    #[tokio::test]
    async fn test_persist_success_keeps_assets() {
        let storage = MemoryAssetStorage::default();
        let assets = store_all(&storage, vec![file("a.png", None)]).await.unwrap();

        let id = persist_with_assets(&storage, &assets, || async { Ok::<_, ()>(42) })
            .await
            .unwrap();
        assert_eq!(id, 42);
        assert!(storage.contains(&assets[0].public_id).await);
    }
}
