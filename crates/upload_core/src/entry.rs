use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Registry-unique identifier of one tracked submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct UploadId(pub u64);

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upload-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl UploadStatus {
    /// Uploading and processing entries still have work in flight.
    pub fn is_active(self) -> bool {
        matches!(self, UploadStatus::Uploading | UploadStatus::Processing)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    pub fn label(self) -> &'static str {
        match self {
            UploadStatus::Uploading => "Uploading...",
            UploadStatus::Processing => "Processing...",
            UploadStatus::Completed => "Complete",
            UploadStatus::Failed => "Processing failed",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadStatus::Uploading => "uploading",
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// File handed to the tracker for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Destination project of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRef {
    pub id: String,
    pub name: String,
}

impl ProjectRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Optional destination parameters sent alongside the file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadOptions {
    pub functional_area: Option<String>,
    /// Processing-mode switches, sent as one `"true"`/`"false"` form field each.
    pub mode_flags: BTreeMap<String, bool>,
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn functional_area(mut self, area: impl Into<String>) -> Self {
        self.functional_area = Some(area.into());
        self
    }

    pub fn flag(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.mode_flags.insert(name.into(), enabled);
        self
    }
}

/// One tracked submission, as exposed to the rest of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEntry {
    pub id: UploadId,
    pub filename: String,
    pub project_id: String,
    pub project_name: String,
    pub status: UploadStatus,
    pub progress: u8,
    pub message: String,
    pub job_id: Option<String>,
    pub error: Option<String>,
    pub result: Option<Value>,
    pub started_at: DateTime<Utc>,
}

impl UploadEntry {
    pub(crate) fn new(
        id: UploadId,
        filename: &str,
        project: &ProjectRef,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            filename: filename.to_string(),
            project_id: project.id.clone(),
            project_name: project.name.clone(),
            status: UploadStatus::Uploading,
            progress: 0,
            message: "Starting upload...".to_string(),
            job_id: None,
            error: None,
            result: None,
            started_at,
        }
    }

    /// Returns a new entry with `patch` applied; `self` is left untouched.
    ///
    /// Progress never moves backwards while the entry is active, and the
    /// descriptive fields (id, filename, project, start time) cannot change.
    pub fn merged(&self, patch: &UploadPatch) -> UploadEntry {
        let status = patch.status.unwrap_or(self.status);
        let progress = match patch.progress {
            Some(next) if self.status.is_active() => next.max(self.progress).min(100),
            Some(next) => next.min(100),
            None => self.progress,
        };

        UploadEntry {
            status,
            progress,
            message: patch.message.clone().unwrap_or_else(|| self.message.clone()),
            job_id: patch.job_id.clone().or_else(|| self.job_id.clone()),
            error: patch.error.clone().or_else(|| self.error.clone()),
            result: patch.result.clone().or_else(|| self.result.clone()),
            ..self.clone()
        }
    }
}

/// Partial update of an [`UploadEntry`]; `None` leaves a field unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadPatch {
    pub status: Option<UploadStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub job_id: Option<String>,
    pub error: Option<String>,
    pub result: Option<Value>,
}
