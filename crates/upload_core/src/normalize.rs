//! Mapping from loosely-typed job-status payloads to [`NormalizedStatus`].
//!
//! Raw payloads look like
//! `{status, progress: {percent, step}, result_data, error_message}`, but any
//! field may be missing or carry an unexpected type. Normalization is total:
//! it never fails and only reads its input.

use serde_json::Value;

/// Progress assumed when neither the payload nor the entry carries one.
const DEFAULT_PROGRESS: u8 = 50;

const ROW_KEYS: &[&str] = &[
    "total_rows",
    "row_count",
    "rows_processed",
    "rows_inserted",
    "total_records",
    "record_count",
    "records",
];

const CHUNK_KEYS: &[&str] = &["chunks_created", "total_chunks", "chunk_count", "chunks"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Processing,
    Completed { result: Option<Value> },
    Failed { error: String },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Processing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedStatus {
    pub state: JobState,
    pub progress: u8,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl RawStatus {
    fn parse(raw: Option<&Value>) -> Self {
        let Some(text) = raw.and_then(Value::as_str) else {
            return RawStatus::Processing;
        };
        match text.trim().to_ascii_lowercase().as_str() {
            "completed" | "complete" => RawStatus::Completed,
            "failed" | "error" => RawStatus::Failed,
            "pending" | "queued" => RawStatus::Queued,
            _ => RawStatus::Processing,
        }
    }

    fn label(self) -> &'static str {
        match self {
            RawStatus::Queued => "Queued...",
            RawStatus::Processing => "Processing...",
            RawStatus::Completed => "Complete",
            RawStatus::Failed => "Processing failed",
        }
    }
}

/// Normalizes one raw job-status payload.
///
/// `previous_progress` is the entry's current progress, used when the payload
/// does not report a percentage.
pub fn normalize_job_status(raw: &Value, previous_progress: Option<u8>) -> NormalizedStatus {
    let status = RawStatus::parse(raw.get("status"));
    let progress_obj = raw.get("progress");
    let percent = progress_obj.and_then(|p| p.get("percent")).and_then(as_percent);
    let step = progress_obj
        .and_then(|p| p.get("step"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let progress = percent.or(previous_progress).unwrap_or(DEFAULT_PROGRESS);

    match status {
        RawStatus::Completed => {
            let result = raw.get("result_data").filter(|v| !v.is_null()).cloned();
            NormalizedStatus {
                message: completion_message(result.as_ref()),
                state: JobState::Completed { result },
                progress: 100,
            }
        }
        RawStatus::Failed => {
            let error = raw
                .get("error_message")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(status.label())
                .to_string();
            NormalizedStatus {
                message: error.clone(),
                state: JobState::Failed { error },
                progress,
            }
        }
        RawStatus::Queued | RawStatus::Processing => NormalizedStatus {
            state: JobState::Processing,
            progress,
            message: step.unwrap_or(status.label()).to_string(),
        },
    }
}

/// Formats an integer with `,` thousands separators.
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn completion_message(result: Option<&Value>) -> String {
    let Some(result) = result else {
        return RawStatus::Completed.label().to_string();
    };
    if let Some(rows) = first_count(result, ROW_KEYS) {
        return format!("Done: {} rows", format_count(rows));
    }
    if let Some(chunks) = first_count(result, CHUNK_KEYS) {
        return format!("Done: {} chunks", format_count(chunks));
    }
    RawStatus::Completed.label().to_string()
}

pub(crate) fn first_count(object: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(as_count)
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        Value::Array(items) => Some(items.len() as u64),
        _ => None,
    }
}

fn as_percent(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, 100.0) as u8)
}
