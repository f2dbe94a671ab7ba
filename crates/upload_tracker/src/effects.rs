use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use upload_core::{Effect, Msg, TransferFailure, TransferOutcome, UploadFile, UploadOptions};
use upload_engine::{ProgressSink, SubmitRequest, TransferProgress, UploadBackend};
use upload_logging::{upload_debug, upload_info, upload_warn};

use crate::tasks::{TaskKind, TaskRegistry, TaskTicket};
use crate::tracker::Inner;

impl Inner {
    pub(crate) fn run_effect(self: &Arc<Self>, tasks: &mut TaskRegistry, effect: Effect) {
        match effect {
            Effect::StartTransfer {
                upload_id,
                file,
                project_id,
                options,
            } => {
                let request = submit_request(file, project_id, options);
                let inner = Arc::downgrade(self);
                let backend = self.backend.clone();
                tasks.spawn(&self.runtime, upload_id, TaskKind::Transfer, move |ticket| {
                    run_transfer(inner, backend, request, ticket)
                });
            }
            Effect::StartPolling { upload_id, job_id } => {
                upload_info!("Polling job {} for {}", job_id, upload_id);
                let inner = Arc::downgrade(self);
                let backend = self.backend.clone();
                let interval = self.settings.poll_interval.max(Duration::from_millis(1));
                tasks.spawn(&self.runtime, upload_id, TaskKind::Poll, move |ticket| {
                    run_poller(inner, backend, job_id, interval, ticket)
                });
            }
            Effect::StopPolling { upload_id } => {
                if tasks.cancel(upload_id, TaskKind::Poll) {
                    upload_debug!("Stopped polling for {}", upload_id);
                }
            }
            Effect::ScheduleSweep { upload_id } => {
                let inner = Arc::downgrade(self);
                let grace = self.settings.retention_grace;
                tasks.spawn(&self.runtime, upload_id, TaskKind::Sweep, move |ticket| {
                    run_sweep(inner, grace, ticket)
                });
            }
            Effect::CancelTasks { upload_id } => {
                let cancelled = tasks.cancel_upload(upload_id);
                upload_debug!("Removed {} ({} task(s) cancelled)", upload_id, cancelled);
            }
        }
    }
}

fn submit_request(file: UploadFile, project_id: String, options: UploadOptions) -> SubmitRequest {
    SubmitRequest {
        filename: file.filename,
        content_type: file.content_type,
        bytes: file.bytes,
        project_id,
        functional_area: options.functional_area,
        mode_flags: options.mode_flags,
    }
}

/// Forwards transfer progress into the registry while the transfer task is live.
struct TransferSink {
    inner: Weak<Inner>,
    ticket: TaskTicket,
}

impl ProgressSink for TransferSink {
    fn emit(&self, progress: TransferProgress) {
        if let Some(inner) = self.inner.upgrade() {
            inner.dispatch_from(
                &self.ticket,
                Msg::TransferProgress {
                    upload_id: self.ticket.upload_id,
                    bytes_sent: progress.bytes_sent,
                    total_bytes: progress.total_bytes,
                },
            );
        }
    }
}

async fn run_transfer(
    inner: Weak<Inner>,
    backend: Arc<dyn UploadBackend>,
    request: SubmitRequest,
    ticket: TaskTicket,
) {
    let upload_id = ticket.upload_id;
    let sink: Arc<dyn ProgressSink> = Arc::new(TransferSink {
        inner: inner.clone(),
        ticket: ticket.clone(),
    });

    let result = tokio::select! {
        _ = ticket.token().cancelled() => {
            upload_debug!("Transfer for {} cancelled", upload_id);
            return;
        }
        result = backend.submit(request, sink) => result,
    };

    let outcome = match result {
        Ok(body) => TransferOutcome::Accepted(body),
        Err(err) => {
            upload_warn!("Transfer for {} failed: {}", upload_id, err);
            let kind = if err.is_rejection() {
                TransferFailure::ServerRejection
            } else {
                TransferFailure::Transport
            };
            TransferOutcome::Failed {
                kind,
                message: err.message,
            }
        }
    };

    if let Some(inner) = inner.upgrade() {
        inner.finish_task(&ticket, Msg::TransferFinished { upload_id, outcome });
    }
}

/// Polls immediately, then once per `interval`, until cancelled.
///
/// Terminal job states stop the poller through `Effect::StopPolling`, which
/// cancels this task's ticket. Fetch failures are only logged: some uploads
/// never get a job the endpoint knows about.
async fn run_poller(
    inner: Weak<Inner>,
    backend: Arc<dyn UploadBackend>,
    job_id: String,
    interval: Duration,
    ticket: TaskTicket,
) {
    let upload_id = ticket.upload_id;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_failures = 0u32;

    loop {
        tokio::select! {
            _ = ticket.token().cancelled() => break,
            _ = ticker.tick() => {}
        }
        let result = tokio::select! {
            _ = ticket.token().cancelled() => break,
            result = backend.job_status(&job_id) => result,
        };
        let Some(tracker) = inner.upgrade() else {
            break;
        };

        match result {
            Ok(raw) => {
                consecutive_failures = 0;
                tracker.dispatch_from(
                    &ticket,
                    Msg::JobStatusReceived {
                        upload_id,
                        job_id: job_id.clone(),
                        raw,
                    },
                );
            }
            Err(err) => {
                consecutive_failures += 1;
                if consecutive_failures == 1 {
                    upload_warn!("Status poll for job {} ({}) failed: {}", job_id, upload_id, err);
                } else {
                    upload_debug!(
                        "Status poll for job {} ({}) failed {} times in a row: {}",
                        job_id,
                        upload_id,
                        consecutive_failures,
                        err
                    );
                }
            }
        }
    }
    upload_debug!("Poller for job {} ({}) stopped", job_id, upload_id);
}

async fn run_sweep(inner: Weak<Inner>, grace: Duration, ticket: TaskTicket) {
    tokio::select! {
        _ = ticket.token().cancelled() => return,
        _ = tokio::time::sleep(grace) => {}
    }
    if let Some(inner) = inner.upgrade() {
        if inner.finish_task(&ticket, Msg::SweepDue { upload_id: ticket.upload_id }) {
            upload_debug!("Swept completed {}", ticket.upload_id);
        }
    }
}
