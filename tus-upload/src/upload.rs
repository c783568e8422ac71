use chrono::{DateTime, Utc};

use crate::{ByteStream, UploadError, UploadMetadata, UploadRecord};

/// Parameters of a create-upload call
#[derive(Debug, Clone, Default)]
pub struct CreateUpload {
    /// Declared total length
    pub length: Option<u64>,
    /// Client will supply the length on a later append
    pub defer_length: bool,
    pub metadata: UploadMetadata,
}

impl CreateUpload {
    /// Upload with a known total length
    pub fn with_length(length: u64) -> Self {
        Self {
            length: Some(length),
            ..Self::default()
        }
    }

    /// Upload whose length is not known yet
    pub fn deferred() -> Self {
        Self {
            defer_length: true,
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, metadata: UploadMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Bytes sent together with the create call
pub struct InlineData {
    /// Bytes announced by the client; `None` reads up to the declared length
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl InlineData {
    pub fn new(content_length: Option<u64>, body: ByteStream) -> Self {
        Self {
            content_length,
            body,
        }
    }
}

/// Result of a create call
#[derive(Debug)]
pub enum CreateOutcome {
    /// Resource created, no data received
    Created { record: UploadRecord },

    /// Resource created and the inline data appended.
    /// `interrupted` when the body ended before all announced bytes arrived.
    CreatedWithData {
        record: UploadRecord,
        interrupted: bool,
    },

    /// Resource created but the inline data refused; the resource stays usable
    InlineRejected {
        record: UploadRecord,
        reason: UploadError,
    },
}

impl CreateOutcome {
    pub fn record(&self) -> &UploadRecord {
        match self {
            Self::Created { record }
            | Self::CreatedWithData { record, .. }
            | Self::InlineRejected { record, .. } => record,
        }
    }
}

/// Parameters of an append call (the body travels separately)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendChunk {
    /// Where the client believes the upload currently ends
    pub offset: u64,
    /// Bytes the client announces for this chunk
    pub content_length: u64,
    /// Total length, resolving a deferred upload
    pub length: Option<u64>,
}

impl AppendChunk {
    pub fn new(offset: u64, content_length: u64) -> Self {
        Self {
            offset,
            content_length,
            length: None,
        }
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }
}

/// A fully consumed append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendReceipt {
    pub offset: u64,
    pub expires_at: Option<DateTime<Utc>>,
    pub complete: bool,
}

/// Result of an append call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Accepted(AppendReceipt),

    /// Body ended early. Every byte that arrived is stored and counted in `offset`.
    Interrupted { offset: u64 },
}

impl AppendOutcome {
    /// Offset after the call, whichever way it ended
    pub fn offset(&self) -> u64 {
        match self {
            Self::Accepted(receipt) => receipt.offset,
            Self::Interrupted { offset } => *offset,
        }
    }
}
