use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UploadId;

/// Upload lifecycle notifications, broadcast by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UploadEvent {
    /// Upload resource was created
    Created {
        upload_id: UploadId,
        length: Option<u64>,
        at: DateTime<Utc>,
    },

    /// Bytes were appended
    Progress {
        upload_id: UploadId,
        offset: u64,
        length: Option<u64>,
        at: DateTime<Utc>,
    },

    /// Final byte received and storage finalized
    Completed {
        upload_id: UploadId,
        length: u64,
        at: DateTime<Utc>,
    },

    /// Upload was deleted by the client
    Terminated {
        upload_id: UploadId,
        at: DateTime<Utc>,
    },
}

impl UploadEvent {
    /// Get event type name as string
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Progress { .. } => "progress",
            Self::Completed { .. } => "completed",
            Self::Terminated { .. } => "terminated",
        }
    }

    pub fn upload_id(&self) -> &UploadId {
        match self {
            Self::Created { upload_id, .. }
            | Self::Progress { upload_id, .. }
            | Self::Completed { upload_id, .. }
            | Self::Terminated { upload_id, .. } => upload_id,
        }
    }
}
