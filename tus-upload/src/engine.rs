use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::sync::broadcast;

use crate::{
    AppendChunk, AppendOutcome, AppendReceipt, ByteStream, Capabilities, CreateOutcome,
    CreateUpload, InlineData, UploadConfig, UploadError, UploadEvent, UploadId, UploadLocks,
    UploadRecord, UploadRecordStore, UploadResult, UploadStorage,
};

const EVENT_CAPACITY: usize = 1024;

/// The upload state machine.
///
/// Validates every request against the current record before touching
/// anything, streams accepted bytes into storage and keeps the record in step
/// with what storage actually holds. Mutations of one upload are serialized
/// through [`UploadLocks`]; different uploads proceed in parallel.
pub struct UploadEngine {
    storage: Arc<dyn UploadStorage>,
    records: Arc<dyn UploadRecordStore>,
    locks: UploadLocks,
    config: UploadConfig,
    events: broadcast::Sender<UploadEvent>,
}

impl UploadEngine {
    pub fn new<S, R>(storage: S, records: R, config: UploadConfig) -> Self
    where
        S: UploadStorage + 'static,
        R: UploadRecordStore + 'static,
    {
        Self::from_parts(Arc::new(storage), Arc::new(records), config)
    }

    pub fn from_parts(
        storage: Arc<dyn UploadStorage>,
        records: Arc<dyn UploadRecordStore>,
        config: UploadConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            storage,
            records,
            locks: UploadLocks::new(),
            config,
            events,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Receive lifecycle events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.events.subscribe()
    }

    /// Fixed server capabilities. Touches no record.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::from_config(&self.config)
    }

    /// Create a new upload resource, optionally appending inline data.
    pub async fn create(
        &self,
        request: CreateUpload,
        inline: Option<InlineData>,
    ) -> UploadResult<CreateOutcome> {
        let length = match (request.length, request.defer_length) {
            (Some(length), true) if length > 0 => {
                return Err(UploadError::invalid(
                    "Upload-Length and Upload-Defer-Length are mutually exclusive",
                ))
            }
            (None, false) => {
                return Err(UploadError::invalid(
                    "either Upload-Length or Upload-Defer-Length is required",
                ))
            }
            (Some(length), false) if length > self.config.max_size => {
                return Err(UploadError::TooLarge {
                    size: length,
                    max: self.config.max_size,
                })
            }
            // a zero length next to the defer flag is a deferred upload
            (_, true) => None,
            (length, false) => length,
        };

        let id = UploadId::new();
        let now = Utc::now();
        let storage_key = self.storage.create(&id).await?;

        let mut record = UploadRecord::new(
            id.clone(),
            length,
            request.metadata,
            storage_key,
            now,
        );
        record.expires_at = self.expiry_from(now);

        if let Err(err) = self.records.put(record.clone()).await {
            if let Err(cleanup) = self.storage.delete(&record.storage_key).await {
                tracing::warn!(upload_id = %id, error = %cleanup, "Failed to remove orphaned upload storage");
            }
            return Err(err);
        }

        tracing::info!(
            upload_id = %id,
            length = ?record.length,
            deferred = record.defer_length,
            "Upload created"
        );
        self.emit(UploadEvent::Created {
            upload_id: id.clone(),
            length: record.length,
            at: now,
        });

        if record.is_complete() {
            self.complete(&record).await?;
        }

        // inline data only lands on uploads with a known length
        let Some(inline) = inline.filter(|_| !record.defer_length) else {
            return Ok(CreateOutcome::Created { record });
        };

        let _guard = self.locks.lock(&id).await;
        let content_length = inline
            .content_length
            .or_else(|| record.remaining())
            .unwrap_or(0);
        let chunk = AppendChunk::new(0, content_length);

        match self.append_locked(&mut record, chunk, inline.body).await {
            Ok(outcome) => Ok(CreateOutcome::CreatedWithData {
                record,
                interrupted: matches!(outcome, AppendOutcome::Interrupted { .. }),
            }),
            Err(err) if err.is_internal() => Err(err),
            Err(reason) => {
                tracing::info!(upload_id = %id, reason = %reason, "Inline upload data rejected");
                Ok(CreateOutcome::InlineRejected { record, reason })
            }
        }
    }

    /// Current state of an upload. No side effects.
    ///
    /// While an append holds the upload's lock this returns the last
    /// persisted record without waiting; otherwise it also checks that storage
    /// holds exactly `offset` bytes.
    pub async fn status(&self, id: &UploadId) -> UploadResult<UploadRecord> {
        let record = self.load(id).await?;

        let Some(_guard) = self.locks.try_lock(id) else {
            if !self.storage.exists(&record.storage_key).await? {
                return Err(UploadError::not_found(id.as_str()));
            }
            return Ok(record);
        };

        // re-read: an append may have finished between the load and the lock
        let record = self.load(id).await?;
        self.check_consistency(&record).await?;
        Ok(record)
    }

    /// Append a chunk of bytes at the client's declared offset.
    pub async fn append(
        &self,
        id: &UploadId,
        chunk: AppendChunk,
        body: ByteStream,
    ) -> UploadResult<AppendOutcome> {
        let _guard = self.locks.lock(id).await;
        let mut record = self.load(id).await?;
        self.append_locked(&mut record, chunk, body).await
    }

    /// Remove an upload and its bytes. Removing an unknown upload succeeds.
    pub async fn terminate(&self, id: &UploadId) -> UploadResult<()> {
        let _guard = self.locks.lock(id).await;

        let Some(record) = self.records.get(id).await? else {
            tracing::debug!(upload_id = %id, "Terminate for unknown upload");
            return Ok(());
        };

        self.storage.delete(&record.storage_key).await?;
        self.records.delete(id).await?;

        tracing::info!(upload_id = %id, offset = record.offset, "Upload terminated");
        self.emit(UploadEvent::Terminated {
            upload_id: id.clone(),
            at: Utc::now(),
        });
        Ok(())
    }

    async fn load(&self, id: &UploadId) -> UploadResult<UploadRecord> {
        self.records
            .get(id)
            .await?
            .ok_or_else(|| UploadError::not_found(id.as_str()))
    }

    async fn check_consistency(&self, record: &UploadRecord) -> UploadResult<()> {
        match self.storage.size_of(&record.storage_key).await? {
            None => Err(UploadError::not_found(record.id.as_str())),
            Some(stored) if stored == record.offset => Ok(()),
            Some(stored) => {
                tracing::error!(
                    upload_id = %record.id,
                    offset = record.offset,
                    stored,
                    "Upload record and stored bytes disagree"
                );
                Err(UploadError::InternalConsistency {
                    id: record.id.to_string(),
                    offset: record.offset,
                    stored: Some(stored),
                })
            }
        }
    }

    /// Validate then stream. Caller holds the upload's lock.
    async fn append_locked(
        &self,
        record: &mut UploadRecord,
        chunk: AppendChunk,
        mut body: ByteStream,
    ) -> UploadResult<AppendOutcome> {
        self.check_consistency(record).await?;

        let now = Utc::now();
        if !record.is_complete() && record.is_expired_at(now) {
            return Err(UploadError::Expired {
                id: record.id.to_string(),
            });
        }

        let new_length = match (record.defer_length, chunk.length) {
            (true, None) => {
                return Err(UploadError::precondition(
                    "Upload-Length is required to append to an upload with deferred length",
                ))
            }
            (false, Some(_)) => {
                return Err(UploadError::precondition("upload length is already set"))
            }
            (true, Some(length)) if length < record.offset => {
                return Err(UploadError::conflict(
                    format!(
                        "length {} is smaller than the stored offset {}",
                        length, record.offset
                    ),
                    record.offset,
                ))
            }
            (true, Some(length)) if length > self.config.max_size => {
                return Err(UploadError::TooLarge {
                    size: length,
                    max: self.config.max_size,
                })
            }
            (true, Some(length)) => Some(length),
            (false, None) => None,
        };

        if chunk.offset != record.offset {
            return Err(UploadError::conflict(
                format!(
                    "declared offset {} does not match current offset {}",
                    chunk.offset, record.offset
                ),
                record.offset,
            ));
        }

        let length = new_length.or(record.length).unwrap_or(0);
        let end = chunk.offset.checked_add(chunk.content_length);
        if end.map_or(true, |end| end > length) {
            return Err(UploadError::conflict(
                format!(
                    "{} bytes at offset {} exceed upload length {}",
                    chunk.content_length, chunk.offset, length
                ),
                record.offset,
            ));
        }

        if let Some(length) = new_length {
            record.resolve_length(length);
            self.records.put(record.clone()).await?;
            tracing::info!(upload_id = %record.id, length, "Deferred upload length resolved");
        }

        let start = record.offset;
        let expected = chunk.offset + chunk.content_length;
        let mut remaining = chunk.content_length;
        let mut interrupted = false;

        while remaining > 0 {
            let mut bytes = match body.next().await {
                Some(Ok(bytes)) => bytes,
                Some(Err(err)) => {
                    tracing::warn!(upload_id = %record.id, error = %err, "Upload body failed mid-stream");
                    interrupted = true;
                    break;
                }
                None => {
                    interrupted = true;
                    break;
                }
            };
            if bytes.is_empty() {
                continue;
            }
            if bytes.len() as u64 > remaining {
                bytes.truncate(remaining as usize);
            }
            let size = bytes.len() as u64;
            let target = record.offset + size;

            match self.storage.append(&record.storage_key, bytes).await {
                Ok(stored) if stored == target => {
                    record.record_chunk(size);
                    remaining -= size;
                    self.records.put(record.clone()).await?;
                    tracing::trace!(upload_id = %record.id, offset = record.offset, "Chunk stored");
                }
                Ok(stored) if stored >= record.offset && stored < target => {
                    if stored > record.offset {
                        record.record_chunk(stored - record.offset);
                        self.records.put(record.clone()).await?;
                    }
                    return Err(UploadError::IncompleteWrite {
                        expected,
                        actual: record.offset,
                    });
                }
                Ok(stored) => {
                    tracing::error!(
                        upload_id = %record.id,
                        offset = record.offset,
                        stored,
                        "Storage size diverged during append"
                    );
                    return Err(UploadError::InternalConsistency {
                        id: record.id.to_string(),
                        offset: record.offset,
                        stored: Some(stored),
                    });
                }
                Err(err) => {
                    // keep whatever made it into the sink
                    if let Ok(Some(stored)) = self.storage.size_of(&record.storage_key).await {
                        if stored > record.offset && stored <= target {
                            record.record_chunk(stored - record.offset);
                            self.records.put(record.clone()).await?;
                        }
                    }
                    tracing::error!(upload_id = %record.id, offset = record.offset, error = %err, "Storage append failed");
                    return Err(err);
                }
            }
        }

        let written = record.offset - start;
        if written > 0 {
            self.emit(UploadEvent::Progress {
                upload_id: record.id.clone(),
                offset: record.offset,
                length: record.length,
                at: Utc::now(),
            });
        }

        if interrupted {
            tracing::info!(
                upload_id = %record.id,
                offset = record.offset,
                written,
                expected,
                "Upload body ended early, partial chunk kept"
            );
            return Ok(AppendOutcome::Interrupted {
                offset: record.offset,
            });
        }

        if record.offset != expected {
            return Err(UploadError::IncompleteWrite {
                expected,
                actual: record.offset,
            });
        }

        record.expires_at = self.expiry_from(Utc::now());
        self.records.put(record.clone()).await?;
        tracing::debug!(upload_id = %record.id, offset = record.offset, written, "Chunk accepted");

        let complete = record.is_complete();
        // already finalized if it was complete before this call
        if complete && (written > 0 || new_length.is_some()) {
            self.complete(record).await?;
        }

        Ok(AppendOutcome::Accepted(AppendReceipt {
            offset: record.offset,
            expires_at: record.expires_at,
            complete,
        }))
    }

    async fn complete(&self, record: &UploadRecord) -> UploadResult<()> {
        self.storage.finalize(&record.storage_key).await?;
        tracing::info!(upload_id = %record.id, length = record.offset, "Upload complete");
        self.emit(UploadEvent::Completed {
            upload_id: record.id.clone(),
            length: record.offset,
            at: Utc::now(),
        });
        Ok(())
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.config.expiration.map(|ttl| now + ttl)
    }

    fn emit(&self, event: UploadEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}
