use async_trait::async_trait;
use bytes::Bytes;

use crate::{StorageKey, UploadId, UploadResult};

/// Append-only byte sink per upload - must be implemented by all storage backends
///
/// Every call is all-or-nothing from the caller's point of view: after a failed
/// `append`, `size_of` reports exactly the bytes that made it to the sink (a
/// truncated suffix of the attempted chunk is allowed, silent loss is not).
#[async_trait]
pub trait UploadStorage: Send + Sync {
    /// Create an empty sink for `id`. Fails if one already exists.
    async fn create(&self, id: &UploadId) -> UploadResult<StorageKey>;

    /// Append bytes, returning the new total size of the sink
    async fn append(&self, key: &StorageKey, bytes: Bytes) -> UploadResult<u64>;

    /// Current size, `None` when the sink does not exist
    async fn size_of(&self, key: &StorageKey) -> UploadResult<Option<u64>>;

    /// Whether the sink exists
    async fn exists(&self, key: &StorageKey) -> UploadResult<bool> {
        Ok(self.size_of(key).await?.is_some())
    }

    /// Mark a finished upload (e.g. move out of staging). Never alters content.
    async fn finalize(&self, key: &StorageKey) -> UploadResult<()>;

    /// Remove the sink; removing a missing sink is not an error
    async fn delete(&self, key: &StorageKey) -> UploadResult<()>;
}
