//! Upload core: pure upload registry state machine and payload normalization.
mod effect;
mod entry;
mod msg;
mod normalize;
mod state;
mod submission;
mod update;
mod view_model;

pub use effect::Effect;
pub use entry::{
    ProjectRef, UploadEntry, UploadFile, UploadId, UploadOptions, UploadPatch, UploadStatus,
};
pub use msg::{Msg, TransferFailure, TransferOutcome};
pub use normalize::{format_count, normalize_job_status, JobState, NormalizedStatus};
pub use state::UploadState;
pub use submission::{interpret_submission, transfer_progress, SubmissionResult, TRANSFER_SHARE};
pub use update::update;
pub use view_model::UploadsView;
