//! Per-upload mutual exclusion.
//!
//! Appends to one upload must not interleave, including while the request
//! body is still streaming in. Uploads with different ids never contend.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::UploadId;

type LockTable = HashMap<UploadId, Arc<AsyncMutex<()>>>;

/// Table of async locks keyed by upload id.
///
/// Entries exist only while someone holds or waits for them.
#[derive(Clone, Default)]
pub struct UploadLocks {
    table: Arc<Mutex<LockTable>>,
}

impl UploadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: &UploadId) -> Arc<AsyncMutex<()>> {
        self.table
            .lock()
            .entry(id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait for exclusive access to `id`
    pub async fn lock(&self, id: &UploadId) -> UploadGuard {
        let guard = self.entry(id).lock_owned().await;
        UploadGuard {
            id: id.clone(),
            table: Arc::clone(&self.table),
            guard: Some(guard),
        }
    }

    /// Exclusive access to `id` if nobody holds it right now
    pub fn try_lock(&self, id: &UploadId) -> Option<UploadGuard> {
        let lock = self.entry(id);
        match lock.try_lock_owned() {
            Ok(guard) => Some(UploadGuard {
                id: id.clone(),
                table: Arc::clone(&self.table),
                guard: Some(guard),
            }),
            Err(_) => {
                release(&self.table, id);
                None
            }
        }
    }

    /// Number of ids with a live lock entry
    pub fn active(&self) -> usize {
        self.table.lock().len()
    }
}

/// Held for the whole of a mutating operation on one upload
pub struct UploadGuard {
    id: UploadId,
    table: Arc<Mutex<LockTable>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        release(&self.table, &self.id);
    }
}

/// Drop the table entry when the table holds the only reference to it.
fn release(table: &Mutex<LockTable>, id: &UploadId) {
    let mut table = table.lock();
    if table
        .get(id)
        .is_some_and(|lock| Arc::strong_count(lock) == 1)
    {
        table.remove(id);
    }
}
