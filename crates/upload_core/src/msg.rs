use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{ProjectRef, UploadFile, UploadId, UploadOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Caller submitted a file; a fresh entry is always created.
    AddUpload {
        file: UploadFile,
        project: ProjectRef,
        options: UploadOptions,
        started_at: DateTime<Utc>,
    },
    /// Bytes handed to the transport so far.
    TransferProgress {
        upload_id: UploadId,
        bytes_sent: u64,
        total_bytes: u64,
    },
    /// The submission request resolved.
    TransferFinished {
        upload_id: UploadId,
        outcome: TransferOutcome,
    },
    /// A poll returned a raw job-status payload.
    JobStatusReceived {
        upload_id: UploadId,
        job_id: String,
        raw: Value,
    },
    /// The retention grace window for a completed entry elapsed.
    SweepDue { upload_id: UploadId },
    /// User dismissed one entry.
    RemoveUpload { upload_id: UploadId },
    /// User dismissed every completed entry.
    ClearCompleted,
    /// User dismissed everything, active or not.
    ClearAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// 2xx response with its decoded JSON body.
    Accepted(Value),
    Failed {
        kind: TransferFailure,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFailure {
    /// Network or transport failure before a response arrived.
    Transport,
    /// Non-2xx response.
    ServerRejection,
}
