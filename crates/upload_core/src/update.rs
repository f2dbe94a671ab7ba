use serde_json::Value;

use crate::normalize::{normalize_job_status, JobState};
use crate::submission::{interpret_submission, transfer_progress, SubmissionResult, TRANSFER_SHARE};
use crate::{
    Effect, Msg, TransferOutcome, UploadEntry, UploadId, UploadPatch, UploadState, UploadStatus,
};

/// Pure update function: applies a message to state and returns any effects.
///
/// Messages addressed to an unknown id, or that do not fit the entry's
/// current status, leave the state untouched and produce no effects.
pub fn update(mut state: UploadState, msg: Msg) -> (UploadState, Vec<Effect>) {
    let effects = match msg {
        Msg::AddUpload {
            file,
            project,
            options,
            started_at,
        } => {
            let upload_id = state.allocate_id();
            state.insert(UploadEntry::new(upload_id, &file.filename, &project, started_at));
            vec![Effect::StartTransfer {
                upload_id,
                file,
                project_id: project.id,
                options,
            }]
        }
        Msg::TransferProgress {
            upload_id,
            bytes_sent,
            total_bytes,
        } => {
            if status_of(&state, upload_id) == Some(UploadStatus::Uploading) {
                let progress = transfer_progress(bytes_sent, total_bytes);
                state.merge(
                    upload_id,
                    &UploadPatch {
                        progress: Some(progress),
                        message: Some(format!("Uploading... {progress}%")),
                        ..UploadPatch::default()
                    },
                );
            }
            Vec::new()
        }
        Msg::TransferFinished { upload_id, outcome } => {
            if status_of(&state, upload_id) == Some(UploadStatus::Uploading) {
                apply_transfer_outcome(&mut state, upload_id, outcome)
            } else {
                Vec::new()
            }
        }
        Msg::JobStatusReceived {
            upload_id,
            job_id,
            raw,
        } => apply_job_status(&mut state, upload_id, &job_id, &raw),
        Msg::SweepDue { upload_id } => {
            if status_of(&state, upload_id) == Some(UploadStatus::Completed) {
                state.remove(upload_id);
            }
            Vec::new()
        }
        Msg::RemoveUpload { upload_id } => remove_entries(&mut state, vec![upload_id]),
        Msg::ClearCompleted => {
            let ids = state.ids_with_status(UploadStatus::Completed);
            remove_entries(&mut state, ids)
        }
        Msg::ClearAll => {
            let ids = state.ids();
            remove_entries(&mut state, ids)
        }
    };

    (state, effects)
}

fn status_of(state: &UploadState, upload_id: UploadId) -> Option<UploadStatus> {
    state.entry(upload_id).map(|entry| entry.status)
}

fn apply_transfer_outcome(
    state: &mut UploadState,
    upload_id: UploadId,
    outcome: TransferOutcome,
) -> Vec<Effect> {
    match outcome {
        TransferOutcome::Accepted(body) => match interpret_submission(&body) {
            SubmissionResult::Queued { job_id, message } => {
                state.merge(
                    upload_id,
                    &UploadPatch {
                        status: Some(UploadStatus::Processing),
                        progress: Some(TRANSFER_SHARE),
                        message: Some(message),
                        job_id: Some(job_id.clone()),
                        ..UploadPatch::default()
                    },
                );
                vec![Effect::StartPolling { upload_id, job_id }]
            }
            SubmissionResult::Finished { message, result } => {
                complete(state, upload_id, message, Some(result));
                vec![Effect::ScheduleSweep { upload_id }]
            }
        },
        TransferOutcome::Failed { message, .. } => {
            fail(state, upload_id, message);
            Vec::new()
        }
    }
}

fn apply_job_status(
    state: &mut UploadState,
    upload_id: UploadId,
    job_id: &str,
    raw: &Value,
) -> Vec<Effect> {
    let Some(entry) = state.entry(upload_id) else {
        return Vec::new();
    };
    if entry.status != UploadStatus::Processing || entry.job_id.as_deref() != Some(job_id) {
        return Vec::new();
    }

    let normalized = normalize_job_status(raw, Some(entry.progress));
    match normalized.state {
        JobState::Processing => {
            state.merge(
                upload_id,
                &UploadPatch {
                    progress: Some(normalized.progress),
                    message: Some(normalized.message),
                    ..UploadPatch::default()
                },
            );
            Vec::new()
        }
        JobState::Completed { result } => {
            complete(state, upload_id, normalized.message, result);
            vec![
                Effect::StopPolling { upload_id },
                Effect::ScheduleSweep { upload_id },
            ]
        }
        JobState::Failed { error } => {
            fail(state, upload_id, error);
            vec![Effect::StopPolling { upload_id }]
        }
    }
}

fn complete(state: &mut UploadState, upload_id: UploadId, message: String, result: Option<Value>) {
    state.merge(
        upload_id,
        &UploadPatch {
            status: Some(UploadStatus::Completed),
            progress: Some(100),
            message: Some(message),
            result,
            ..UploadPatch::default()
        },
    );
}

fn fail(state: &mut UploadState, upload_id: UploadId, message: String) {
    state.merge(
        upload_id,
        &UploadPatch {
            status: Some(UploadStatus::Failed),
            message: Some(message.clone()),
            error: Some(message),
            ..UploadPatch::default()
        },
    );
}

// Cancellation effects precede the deletion they guard.
fn remove_entries(state: &mut UploadState, ids: Vec<UploadId>) -> Vec<Effect> {
    let mut effects = Vec::with_capacity(ids.len());
    for upload_id in ids {
        if state.entry(upload_id).is_some() {
            effects.push(Effect::CancelTasks { upload_id });
            state.remove(upload_id);
        }
    }
    effects
}
