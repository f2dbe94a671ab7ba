use crate::{UploadFile, UploadId, UploadOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartTransfer {
        upload_id: UploadId,
        file: UploadFile,
        project_id: String,
        options: UploadOptions,
    },
    /// Start (or restart) the recurring job-status poll for an upload.
    StartPolling { upload_id: UploadId, job_id: String },
    StopPolling { upload_id: UploadId },
    /// Remove a completed entry once the grace window has passed.
    ScheduleSweep { upload_id: UploadId },
    /// Cancel every task (transfer, poll, sweep) owned by an upload that is being deleted.
    CancelTasks { upload_id: UploadId },
}
