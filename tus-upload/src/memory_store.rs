use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;

use crate::{StorageKey, UploadError, UploadId, UploadResult, UploadStorage};

#[derive(Debug, Default)]
struct MemorySink {
    bytes: BytesMut,
    finalized: bool,
}

/// In-memory storage for testing and development
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    sinks: Arc<RwLock<HashMap<StorageKey, MemorySink>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the bytes stored for `key`
    pub fn contents(&self, key: &StorageKey) -> Option<Bytes> {
        self.sinks
            .read()
            .get(key)
            .map(|sink| Bytes::copy_from_slice(&sink.bytes))
    }

    pub fn is_finalized(&self, key: &StorageKey) -> bool {
        self.sinks.read().get(key).is_some_and(|sink| sink.finalized)
    }

    /// Drop the bytes behind the engine's back (simulates a lost file)
    pub fn remove_raw(&self, key: &StorageKey) {
        self.sinks.write().remove(key);
    }

    /// Write bytes behind the engine's back (simulates a desynchronized sink)
    pub fn append_raw(&self, key: &StorageKey, bytes: &[u8]) {
        if let Some(sink) = self.sinks.write().get_mut(key) {
            sink.bytes.extend_from_slice(bytes);
        }
    }
}

#[async_trait]
impl UploadStorage for MemoryStorage {
    async fn create(&self, id: &UploadId) -> UploadResult<StorageKey> {
        let key = StorageKey(id.as_str().to_string());
        let mut sinks = self.sinks.write();
        if sinks.contains_key(&key) {
            return Err(UploadError::Io {
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("storage for {} already exists", id),
                ),
            });
        }
        sinks.insert(key.clone(), MemorySink::default());
        Ok(key)
    }

    async fn append(&self, key: &StorageKey, bytes: Bytes) -> UploadResult<u64> {
        let mut sinks = self.sinks.write();
        let sink = sinks
            .get_mut(key)
            .ok_or_else(|| UploadError::not_found(key.as_str()))?;
        sink.bytes.extend_from_slice(&bytes);
        Ok(sink.bytes.len() as u64)
    }

    async fn size_of(&self, key: &StorageKey) -> UploadResult<Option<u64>> {
        Ok(self.sinks.read().get(key).map(|sink| sink.bytes.len() as u64))
    }

    async fn finalize(&self, key: &StorageKey) -> UploadResult<()> {
        let mut sinks = self.sinks.write();
        let sink = sinks
            .get_mut(key)
            .ok_or_else(|| UploadError::not_found(key.as_str()))?;
        sink.finalized = true;
        Ok(())
    }

    async fn delete(&self, key: &StorageKey) -> UploadResult<()> {
        self.sinks.write().remove(key);
        Ok(())
    }
}
