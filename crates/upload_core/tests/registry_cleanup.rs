use chrono::Utc;
use serde_json::json;
use upload_core::{
    update, Effect, Msg, ProjectRef, TransferOutcome, UploadFile, UploadId, UploadOptions,
    UploadState, UploadStatus,
};

fn add_upload(state: UploadState, filename: &str) -> (UploadState, UploadId) {
    let (state, effects) = update(
        state,
        Msg::AddUpload {
            file: UploadFile::new(filename, "x".as_bytes().to_vec()),
            project: ProjectRef::new("p", "Project"),
            options: UploadOptions::default(),
            started_at: Utc::now(),
        },
    );
    match effects.as_slice() {
        [Effect::StartTransfer { upload_id, .. }] => (state, *upload_id),
        other => panic!("unexpected effects {other:?}"),
    }
}

fn finish(state: UploadState, upload_id: UploadId, body: serde_json::Value) -> UploadState {
    update(
        state,
        Msg::TransferFinished {
            upload_id,
            outcome: TransferOutcome::Accepted(body),
        },
    )
    .0
}

/// Builds one entry per status: uploading, processing, completed, failed.
fn mixed_state() -> (UploadState, [UploadId; 4]) {
    let (state, uploading) = add_upload(UploadState::new(), "uploading.csv");
    let (state, processing) = add_upload(state, "processing.csv");
    let (state, completed) = add_upload(state, "completed.csv");
    let (state, failed) = add_upload(state, "failed.csv");

    let state = finish(state, processing, json!({"job_id": "job-p"}));
    let state = finish(state, completed, json!({"row_count": 1}));
    let (state, _) = update(
        state,
        Msg::TransferFinished {
            upload_id: failed,
            outcome: TransferOutcome::Failed {
                kind: upload_core::TransferFailure::Transport,
                message: "connection reset".to_string(),
            },
        },
    );
    (state, [uploading, processing, completed, failed])
}

#[test]
fn derived_counts_follow_entries() {
    let (state, _) = mixed_state();
    let view = state.view();

    assert_eq!(view.uploads.len(), 4);
    assert_eq!(view.active_count, 2);
    assert!(view.has_active);
    assert_eq!(view.failed_count, 1);
}

#[test]
fn remove_cancels_tasks_before_deleting() {
    let (state, [_, processing, _, _]) = mixed_state();
    let (mut state, effects) = update(state, Msg::RemoveUpload { upload_id: processing });

    assert_eq!(effects, vec![Effect::CancelTasks { upload_id: processing }]);
    assert!(state.entry(processing).is_none());
    assert_eq!(state.active_count(), 1);
    assert!(state.consume_dirty());
}

#[test]
fn removed_entry_is_not_resurrected_by_late_events() {
    let (state, [_, processing, _, _]) = mixed_state();
    let (mut state, _) = update(state, Msg::RemoveUpload { upload_id: processing });
    state.consume_dirty();
    let before = state.clone();

    let (state, effects) = update(
        state,
        Msg::JobStatusReceived {
            upload_id: processing,
            job_id: "job-p".to_string(),
            raw: json!({"status": "completed", "result_data": {"row_count": 9}}),
        },
    );
    assert!(effects.is_empty());
    let (mut state, effects) = update(
        state,
        Msg::TransferFinished {
            upload_id: processing,
            outcome: TransferOutcome::Accepted(json!({"row_count": 1})),
        },
    );
    assert!(effects.is_empty());
    assert!(!state.consume_dirty());
    assert_eq!(state, before);
}

#[test]
fn remove_unknown_id_is_noop() {
    let (mut state, _) = mixed_state();
    state.consume_dirty();
    let (mut next, effects) = update(state.clone(), Msg::RemoveUpload { upload_id: UploadId(999) });

    assert!(effects.is_empty());
    assert!(!next.consume_dirty());
    assert_eq!(next, state);
}

#[test]
fn clear_completed_keeps_failed_and_active_entries() {
    let (state, [uploading, processing, completed, failed]) = mixed_state();
    let (state, effects) = update(state, Msg::ClearCompleted);

    assert_eq!(effects, vec![Effect::CancelTasks { upload_id: completed }]);
    let remaining: Vec<_> = state.entries().map(|e| e.id).collect();
    assert_eq!(remaining, vec![uploading, processing, failed]);
    assert_eq!(
        state.entry(failed).map(|e| e.status),
        Some(UploadStatus::Failed)
    );
}

#[test]
fn clear_all_cancels_every_entry() {
    let (state, ids) = mixed_state();
    let (state, effects) = update(state, Msg::ClearAll);

    let expected: Vec<_> = ids
        .iter()
        .map(|upload_id| Effect::CancelTasks {
            upload_id: *upload_id,
        })
        .collect();
    assert_eq!(effects, expected);
    assert!(state.is_empty());
    assert_eq!(state.view().active_count, 0);
    assert!(!state.has_active());
}
