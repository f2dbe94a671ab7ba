use std::sync::Arc;

use serde_json::Value;

use crate::{StatusError, SubmitError, SubmitRequest, TransferProgress};

/// Receives transfer progress while a submission body is being sent.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, progress: TransferProgress);
}

/// Remote side of the upload tracker: one submission endpoint and one job-status endpoint.
#[async_trait::async_trait]
pub trait UploadBackend: Send + Sync {
    /// Sends the file and returns the decoded JSON body of a 2xx response.
    async fn submit(
        &self,
        request: SubmitRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Value, SubmitError>;

    /// Fetches the raw status payload of an asynchronous job.
    async fn job_status(&self, job_id: &str) -> Result<Value, StatusError>;
}
