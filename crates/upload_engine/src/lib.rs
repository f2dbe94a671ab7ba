//! Upload engine: network IO for file submission and job-status polling.
mod backend;
mod http;
mod types;

pub use backend::{ProgressSink, UploadBackend};
pub use http::{ClientSettings, HttpBackend, JOB_ID_PLACEHOLDER};
pub use types::{
    ClientError, FailureKind, StatusError, SubmitError, SubmitRequest, TransferProgress,
};
