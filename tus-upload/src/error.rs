use serde_json::json;
use thiserror::Error;
use tus_core::{ErrorKind, TusError};

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Errors that can occur while creating, appending to or querying an upload
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Upload not found: {id}")]
    NotFound { id: String },

    #[error("Offset mismatch: {message}")]
    Conflict { message: String, offset: u64 },

    #[error("Precondition failed: {message}")]
    PreconditionFailed { message: String },

    #[error("Incomplete write: expected offset {expected}, stored offset {actual}")]
    IncompleteWrite { expected: u64, actual: u64 },

    #[error("Upload {id} expired")]
    Expired { id: String },

    #[error("Upload size {size} exceeds maximum {max}")]
    TooLarge { size: u64, max: u64 },

    #[error("Storage and metadata out of sync for {id}: record offset {offset}, stored bytes {stored:?}")]
    InternalConsistency {
        id: String,
        offset: u64,
        stored: Option<u64>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl UploadError {
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Offset conflict; `offset` is the server's current offset
    pub fn conflict<S: Into<String>>(message: S, offset: u64) -> Self {
        Self::Conflict {
            message: message.into(),
            offset,
        }
    }

    pub fn precondition<S: Into<String>>(message: S) -> Self {
        Self::PreconditionFailed {
            message: message.into(),
        }
    }

    /// Protocol class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::BadRequest,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::PreconditionFailed { .. } => ErrorKind::PreconditionFailed,
            Self::IncompleteWrite { .. } => ErrorKind::IncompleteWrite,
            Self::Expired { .. } => ErrorKind::Gone,
            Self::TooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::InternalConsistency { .. } | Self::Io { .. } => ErrorKind::GeneralError,
        }
    }

    /// True for desync between record and stored bytes: a bug, not a client mistake
    pub fn is_internal(&self) -> bool {
        matches!(self.kind(), ErrorKind::GeneralError)
    }
}

impl From<UploadError> for TusError {
    fn from(err: UploadError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        let tus = TusError::new(kind, message);
        match err {
            UploadError::Conflict { offset, .. } => tus.with_data(json!({ "offset": offset })),
            UploadError::IncompleteWrite { expected, actual } => {
                tus.with_data(json!({ "expected": expected, "offset": actual }))
            }
            UploadError::TooLarge { max, .. } => tus.with_data(json!({ "maxSize": max })),
            other if other.is_internal() => tus.with_source(anyhow::Error::new(other)),
            _ => tus,
        }
    }
}
