use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::{Map, Value};
use upload_logging::{upload_debug, upload_trace};
use url::Url;

use crate::{
    ClientError, FailureKind, ProgressSink, StatusError, SubmitError, SubmitRequest,
    TransferProgress, UploadBackend,
};

/// Placeholder substituted with the (encoded) job id in `job_status_path`.
pub const JOB_ID_PLACEHOLDER: &str = "{job_id}";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    /// Submission endpoint, relative to `base_url`.
    pub submit_path: String,
    /// Job-status endpoint template, relative to `base_url`.
    pub job_status_path: String,
    pub connect_timeout: Duration,
    /// `None` lets large uploads run as long as the connection stays up.
    pub submit_timeout: Option<Duration>,
    pub status_timeout: Duration,
    /// Size of the body chunks between two progress reports.
    pub chunk_size: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/".to_string(),
            submit_path: "api/upload".to_string(),
            job_status_path: format!("api/jobs/{JOB_ID_PLACEHOLDER}"),
            connect_timeout: Duration::from_secs(10),
            submit_timeout: None,
            status_timeout: Duration::from_secs(10),
            chunk_size: 64 * 1024,
        }
    }
}

/// reqwest-backed [`UploadBackend`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    settings: ClientSettings,
    base_url: Url,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(settings: ClientSettings) -> Result<Self, ClientError> {
        let base_url =
            parse_base_url(&settings.base_url).map_err(|source| ClientError::InvalidBaseUrl {
                url: settings.base_url.clone(),
                source,
            })?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()?;
        Ok(Self {
            settings,
            base_url,
            client,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn submit_url(&self) -> Result<Url, SubmitError> {
        self.base_url
            .join(self.settings.submit_path.trim_start_matches('/'))
            .map_err(|err| SubmitError::new(FailureKind::InvalidEndpoint, err.to_string()))
    }

    /// Each template segment is pushed as one path segment, so the job id is
    /// percent-encoded as path text (`/` and spaces included).
    fn job_status_url(&self, job_id: &str) -> Result<Url, StatusError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                StatusError::new(
                    FailureKind::InvalidEndpoint,
                    format!("{} cannot be a base url", self.base_url),
                )
            })?;
            segments.pop_if_empty();
            for segment in self
                .settings
                .job_status_path
                .split('/')
                .filter(|segment| !segment.is_empty())
            {
                segments.push(&segment.replace(JOB_ID_PLACEHOLDER, job_id));
            }
        }
        Ok(url)
    }

    fn build_form(
        &self,
        request: SubmitRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Form, SubmitError> {
        let total = request.bytes.len() as u64;
        let body = progress_body(request.bytes, self.settings.chunk_size, sink);
        let mut part = Part::stream_with_length(body, total).file_name(request.filename);
        if let Some(content_type) = request.content_type.as_deref() {
            part = part
                .mime_str(content_type)
                .map_err(|err| SubmitError::new(FailureKind::InvalidRequest, err.to_string()))?;
        }

        let mut form = Form::new()
            .part("file", part)
            .text("project", request.project_id);
        if let Some(area) = request.functional_area {
            form = form.text("functional_area", area);
        }
        for (flag, enabled) in request.mode_flags {
            form = form.text(flag, enabled.to_string());
        }
        Ok(form)
    }
}

#[async_trait::async_trait]
impl UploadBackend for HttpBackend {
    async fn submit(
        &self,
        request: SubmitRequest,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Value, SubmitError> {
        let url = self.submit_url()?;
        upload_debug!(
            "Submitting {} ({} bytes) for project {} to {}",
            request.filename,
            request.bytes.len(),
            request.project_id,
            url
        );
        let form = self.build_form(request, sink)?;

        let mut builder = self.client.post(url).multipart(form);
        if let Some(timeout) = self.settings.submit_timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder.send().await.map_err(map_submit_error)?;
        let status = response.status();
        let text = response.text().await.map_err(map_submit_error)?;

        if !status.is_success() {
            return Err(SubmitError::new(
                FailureKind::HttpStatus(status.as_u16()),
                rejection_message(status, &text),
            ));
        }
        if text.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_str(&text)
            .map_err(|err| SubmitError::new(FailureKind::InvalidResponse, err.to_string()))
    }

    async fn job_status(&self, job_id: &str) -> Result<Value, StatusError> {
        let url = self.job_status_url(job_id)?;
        upload_trace!("Polling job {} at {}", job_id, url);

        let response = self
            .client
            .get(url)
            .timeout(self.settings.status_timeout)
            .send()
            .await
            .map_err(map_status_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(StatusError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        let text = response.text().await.map_err(map_status_error)?;
        serde_json::from_str(&text)
            .map_err(|err| StatusError::new(FailureKind::InvalidResponse, err.to_string()))
    }
}

fn parse_base_url(raw: &str) -> Result<Url, url::ParseError> {
    // A base without trailing slash would drop its last segment on join.
    if raw.ends_with('/') {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{raw}/"))
    }
}

/// Streams `bytes` in chunks, reporting the running total as each chunk is handed over.
fn progress_body(bytes: Bytes, chunk_size: usize, sink: Arc<dyn ProgressSink>) -> reqwest::Body {
    let total = bytes.len() as u64;
    let chunk_size = chunk_size.max(1);
    let chunks: Vec<Bytes> = (0..bytes.len())
        .step_by(chunk_size)
        .map(|start| bytes.slice(start..(start + chunk_size).min(bytes.len())))
        .collect();

    let mut sent = 0u64;
    let stream = futures_util::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        sink.emit(TransferProgress {
            bytes_sent: sent,
            total_bytes: total,
        });
        Ok::<Bytes, std::io::Error>(chunk)
    });
    reqwest::Body::wrap_stream(stream)
}

/// Picks the server's own explanation out of an error body, if it has one.
fn rejection_message(status: StatusCode, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let detail = parsed.as_ref().and_then(|value| {
        detail_text(value.get("detail"))
            .or_else(|| non_empty_str(value.get("message")))
            .or_else(|| non_empty_str(value.get("error")))
    });
    detail.unwrap_or_else(|| format!("Upload failed: {status}"))
}

fn detail_text(detail: Option<&Value>) -> Option<String> {
    match detail? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        // Validation errors arrive as a list of `{loc, msg, type}` objects.
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn map_submit_error(err: reqwest::Error) -> SubmitError {
    SubmitError::new(classify(&err), err.to_string())
}

fn map_status_error(err: reqwest::Error) -> StatusError {
    StatusError::new(classify(&err), err.to_string())
}

fn classify(err: &reqwest::Error) -> FailureKind {
    if err.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Transport
    }
}
