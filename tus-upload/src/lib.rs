//! # tus-upload: resumable upload engine
//!
//! `tus-upload` holds everything a tus 1.0.0 server needs except HTTP:
//! upload records, the `Upload-Metadata` codec, append-only byte storage and
//! the offset state machine that ties them together.
//!
//! ```text
//! ┌──────────────────────┐
//! │  protocol handlers   │  ← tus-axum
//! ├──────────────────────┤
//! │    UploadEngine      │  ← validation, streaming, locking
//! ├──────────┬───────────┤
//! │ records  │  storage  │  ← UploadRecordStore / UploadStorage
//! └──────────┴───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use bytes::Bytes;
//! use tus_upload::*;
//!
//! # #[tokio::main]
//! # async fn main() -> UploadResult<()> {
//! let engine = UploadEngine::new(MemoryStorage::new(), MemoryRecordStore::new(), UploadConfig::default());
//!
//! let created = engine.create(CreateUpload::with_length(5), None).await?;
//! let id = created.record().id.clone();
//!
//! let body: ByteStream = Box::pin(futures_util::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"hello"))]));
//! let outcome = engine.append(&id, AppendChunk::new(0, 5), body).await?;
//! assert_eq!(outcome.offset(), 5);
//! # Ok(())
//! # }
//! ```
//!
//! Bytes are never rolled back: if the body ends early the engine keeps what
//! arrived and reports [`AppendOutcome::Interrupted`] with the new offset.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fs_store;
pub mod locks;
pub mod memory_store;
pub mod metadata;
pub mod record;
pub mod record_store;
pub mod store;
pub mod types;
pub mod upload;

pub use config::{Capabilities, UploadConfig, DEFAULT_EXPIRATION_SECS, DEFAULT_MAX_SIZE, TUS_VERSION};
pub use engine::UploadEngine;
pub use error::{UploadError, UploadResult};
pub use events::UploadEvent;
pub use fs_store::FileSystemStorage;
pub use locks::{UploadGuard, UploadLocks};
pub use memory_store::MemoryStorage;
pub use metadata::UploadMetadata;
pub use record::UploadRecord;
pub use record_store::{MemoryRecordStore, UploadRecordStore};
pub use store::UploadStorage;
pub use types::{ByteStream, StorageKey, UploadId, UploadState};
pub use upload::{
    AppendChunk, AppendOutcome, AppendReceipt, CreateOutcome, CreateUpload, InlineData,
};
