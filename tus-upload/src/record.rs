use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{StorageKey, UploadId, UploadMetadata, UploadState};

/// One upload attempt, as persisted in the [`UploadRecordStore`](crate::UploadRecordStore).
///
/// Invariants kept by the engine:
/// - `offset <= length` whenever `length` is known
/// - `defer_length` implies `length.is_none()`; once a length is set it never goes back
/// - `offset` only moves forward, by bytes actually persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    pub id: UploadId,
    pub length: Option<u64>,
    pub defer_length: bool,
    pub offset: u64,

    /// Size of the most recent appended chunk (diagnostic)
    pub last_chunk_size: u64,
    /// Number of chunks appended so far (diagnostic)
    pub chunk_count: u64,

    pub metadata: UploadMetadata,

    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,

    pub storage_key: StorageKey,
}

impl UploadRecord {
    pub fn new(
        id: UploadId,
        length: Option<u64>,
        metadata: UploadMetadata,
        storage_key: StorageKey,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            defer_length: length.is_none(),
            length,
            offset: 0,
            last_chunk_size: 0,
            chunk_count: 0,
            metadata,
            created_at,
            expires_at: None,
            storage_key,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.length == Some(self.offset)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| now > expires)
    }

    /// Bytes still expected, if the length is known
    pub fn remaining(&self) -> Option<u64> {
        self.length.map(|length| length.saturating_sub(self.offset))
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> UploadState {
        if self.is_complete() {
            UploadState::Complete
        } else if self.is_expired_at(now) {
            UploadState::Expired
        } else if self.offset == 0 {
            UploadState::Created {
                deferred: self.defer_length,
            }
        } else {
            UploadState::Receiving
        }
    }

    pub fn state(&self) -> UploadState {
        self.state_at(Utc::now())
    }

    /// Fix the total length of a deferred upload. One-shot.
    pub(crate) fn resolve_length(&mut self, length: u64) {
        self.length = Some(length);
        self.defer_length = false;
    }

    /// Account for `written` freshly persisted bytes.
    pub(crate) fn record_chunk(&mut self, written: u64) {
        self.offset += written;
        self.last_chunk_size = written;
        self.chunk_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(length: Option<u64>) -> UploadRecord {
        UploadRecord::new(
            UploadId::from_string("abc".into()),
            length,
            UploadMetadata::new(),
            StorageKey("abc".into()),
            Utc::now(),
        )
    }

    #[test]
    fn state_follows_offset_and_length() {
        let mut rec = record(Some(10));
        assert_eq!(rec.state(), UploadState::Created { deferred: false });

        rec.record_chunk(4);
        assert_eq!(rec.state(), UploadState::Receiving);
        assert_eq!(rec.remaining(), Some(6));

        rec.record_chunk(6);
        assert_eq!(rec.state(), UploadState::Complete);
        assert_eq!(rec.chunk_count, 2);
        assert_eq!(rec.last_chunk_size, 6);
    }

    #[test]
    fn deferred_until_resolved() {
        let mut rec = record(None);
        assert!(rec.defer_length);
        assert_eq!(rec.state(), UploadState::Created { deferred: true });
        assert_eq!(rec.remaining(), None);

        rec.resolve_length(3);
        assert!(!rec.defer_length);
        assert_eq!(rec.length, Some(3));
    }

    #[test]
    fn expiry_only_matters_for_unfinished_uploads() {
        let mut rec = record(Some(2));
        rec.expires_at = Some(Utc::now() - Duration::seconds(1));
        assert_eq!(rec.state(), UploadState::Expired);

        rec.record_chunk(2);
        assert_eq!(rec.state(), UploadState::Complete);
    }
}
