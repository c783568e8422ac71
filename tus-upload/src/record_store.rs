use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{UploadId, UploadRecord, UploadResult};

/// Storage for upload records.
///
/// Whole-record reads and writes only: callers read, modify and `put` the full
/// record back while holding the upload's lock.
#[async_trait]
pub trait UploadRecordStore: Send + Sync {
    /// Get a record, `None` if unknown
    async fn get(&self, id: &UploadId) -> UploadResult<Option<UploadRecord>>;

    /// Insert or fully replace a record
    async fn put(&self, record: UploadRecord) -> UploadResult<()>;

    /// Remove a record; removing an unknown id is not an error
    async fn delete(&self, id: &UploadId) -> UploadResult<()>;
}

/// In-memory record store, lives as long as the process
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<HashMap<UploadId, UploadRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl UploadRecordStore for MemoryRecordStore {
    async fn get(&self, id: &UploadId) -> UploadResult<Option<UploadRecord>> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn put(&self, record: UploadRecord) -> UploadResult<()> {
        self.records.write().insert(record.id.clone(), record);
        Ok(())
    }

    async fn delete(&self, id: &UploadId) -> UploadResult<()> {
        self.records.write().remove(id);
        Ok(())
    }
}
