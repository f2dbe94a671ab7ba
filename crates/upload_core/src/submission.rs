use serde_json::Value;

use crate::normalize::{first_count, format_count};

/// Share of the progress scale reserved for the transfer itself; the rest is
/// left for server-side processing.
pub const TRANSFER_SHARE: u8 = 50;

const ROW_KEYS: &[&str] = &["row_count", "total_rows"];

/// How the submission endpoint answered a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    /// The server queued an asynchronous job that must be polled.
    Queued { job_id: String, message: String },
    /// The server finished synchronously.
    Finished { message: String, result: Value },
}

/// Maps bytes sent onto `0..=TRANSFER_SHARE`.
pub fn transfer_progress(bytes_sent: u64, total_bytes: u64) -> u8 {
    if total_bytes == 0 {
        return 0;
    }
    let sent = bytes_sent.min(total_bytes) as u128;
    (sent * u128::from(TRANSFER_SHARE) / total_bytes as u128) as u8
}

pub fn interpret_submission(body: &Value) -> SubmissionResult {
    let server_message = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());

    if let Some(job_id) = body.get("job_id").and_then(job_id_text) {
        return SubmissionResult::Queued {
            job_id,
            message: server_message.unwrap_or("Processing...").to_string(),
        };
    }

    let message = if let Some(rows) = first_count(body, ROW_KEYS) {
        format!("Done: {} rows", format_count(rows))
    } else if let Some(tables) = body
        .get("tables_created")
        .and_then(Value::as_array)
        .filter(|tables| !tables.is_empty())
    {
        format!("Done: {} tables", tables.len())
    } else {
        server_message.unwrap_or("Complete").to_string()
    };

    SubmissionResult::Finished {
        message,
        result: body.clone(),
    }
}

fn job_id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
