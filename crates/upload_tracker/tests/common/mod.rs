#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use serde_json::{json, Value};
use upload_engine::{
    FailureKind, ProgressSink, StatusError, SubmitError, SubmitRequest, TransferProgress,
    UploadBackend,
};
use upload_tracker::{ProjectRef, TrackerSettings, UploadFile, UploadTracker};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(upload_logging::initialize_for_tests);
}

/// Lets every ready task run without moving the paused clock by more than 1ms.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn csv(filename: &str) -> UploadFile {
    UploadFile::new(filename, "id,value\n1,10\n2,20\n".as_bytes().to_vec())
        .with_content_type("text/csv")
}

pub fn project() -> ProjectRef {
    ProjectRef::new("proj-1", "Warehouse")
}

pub fn tracker_with(backend: &Arc<FakeBackend>) -> UploadTracker {
    init_logging();
    let backend: Arc<dyn UploadBackend> = backend.clone();
    UploadTracker::new(backend, TrackerSettings::default()).expect("tracker")
}

#[derive(Debug, Clone)]
pub enum StatusStep {
    Payload(Value),
    Delayed(Duration, Value),
}

/// Scripted in-memory backend. Submissions are scripted per filename; job
/// statuses per job id, where the last step repeats forever.
#[derive(Default)]
pub struct FakeBackend {
    submissions: Mutex<HashMap<String, Result<Value, SubmitError>>>,
    statuses: Mutex<HashMap<String, VecDeque<StatusStep>>>,
    status_calls: Mutex<HashMap<String, usize>>,
    submitted: Mutex<Vec<SubmitRequest>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_submit(&self, filename: &str, response: Result<Value, SubmitError>) {
        self.submissions
            .lock()
            .unwrap()
            .insert(filename.to_string(), response);
    }

    pub fn queue_job(&self, filename: &str, job_id: &str) {
        self.on_submit(filename, Ok(json!({"job_id": job_id})));
    }

    pub fn on_status(&self, job_id: &str, steps: Vec<StatusStep>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(job_id.to_string(), steps.into());
    }

    pub fn status_calls(&self, job_id: &str) -> usize {
        self.status_calls
            .lock()
            .unwrap()
            .get(job_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_status_calls(&self) -> usize {
        self.status_calls.lock().unwrap().values().sum()
    }

    pub fn submitted(&self) -> Vec<SubmitRequest> {
        self.submitted.lock().unwrap().clone()
    }
}

pub fn rejection(status: u16, message: &str) -> SubmitError {
    SubmitError::new(FailureKind::HttpStatus(status), message)
}

#[async_trait::async_trait]
impl UploadBackend for FakeBackend {
    async fn submit(
        &self,
        request: SubmitRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Value, SubmitError> {
        let total = request.bytes.len() as u64;
        for bytes_sent in [total / 3, total / 2, total] {
            sink.emit(TransferProgress {
                bytes_sent,
                total_bytes: total,
            });
        }
        let response = self
            .submissions
            .lock()
            .unwrap()
            .get(&request.filename)
            .cloned()
            .unwrap_or_else(|| Ok(json!({})));
        self.submitted.lock().unwrap().push(request);
        response
    }

    async fn job_status(&self, job_id: &str) -> Result<Value, StatusError> {
        *self
            .status_calls
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default() += 1;

        let step = {
            let mut statuses = self.statuses.lock().unwrap();
            let Some(steps) = statuses.get_mut(job_id) else {
                return Err(StatusError::new(FailureKind::HttpStatus(404), "404 Not Found"));
            };
            if steps.len() > 1 {
                steps.pop_front()
            } else {
                steps.front().cloned()
            }
        };

        match step {
            Some(StatusStep::Payload(value)) => Ok(value),
            Some(StatusStep::Delayed(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            None => Err(StatusError::new(FailureKind::Transport, "no scripted status")),
        }
    }
}
