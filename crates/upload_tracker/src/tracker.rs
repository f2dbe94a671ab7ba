use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use upload_core::{
    update, Msg, ProjectRef, TransferFailure, TransferOutcome, UploadEntry, UploadFile, UploadId,
    UploadOptions, UploadState, UploadsView,
};
use upload_engine::{HttpBackend, UploadBackend};
use upload_logging::{upload_info, upload_warn};

use crate::tasks::{TaskRegistry, TaskTicket};
use crate::{TrackerConfig, TrackerError, TrackerSettings};

/// Handle to the background upload registry.
///
/// Cloning is cheap and every clone talks to the same registry. When the last
/// clone is dropped, all outstanding transfers, polls and sweeps are cancelled.
#[derive(Clone)]
pub struct UploadTracker {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    shared: Mutex<Shared>,
    pub(crate) backend: Arc<dyn UploadBackend>,
    pub(crate) settings: TrackerSettings,
    pub(crate) runtime: Handle,
    view_tx: watch::Sender<UploadsView>,
}

pub(crate) struct Shared {
    state: UploadState,
    pub(crate) tasks: TaskRegistry,
}

impl UploadTracker {
    /// Creates a tracker bound to the current Tokio runtime.
    pub fn new(
        backend: Arc<dyn UploadBackend>,
        settings: TrackerSettings,
    ) -> Result<Self, TrackerError> {
        let runtime = Handle::try_current()?;
        Ok(Self::with_runtime(backend, settings, runtime))
    }

    pub fn with_runtime(
        backend: Arc<dyn UploadBackend>,
        settings: TrackerSettings,
        runtime: Handle,
    ) -> Self {
        let (view_tx, _) = watch::channel(UploadsView::default());
        let inner = Inner {
            shared: Mutex::new(Shared {
                state: UploadState::new(),
                tasks: TaskRegistry::new(),
            }),
            backend,
            settings,
            runtime,
            view_tx,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Builds an HTTP-backed tracker from a validated config.
    pub fn from_config(config: &TrackerConfig) -> Result<Self, TrackerError> {
        config.validate()?;
        let backend = HttpBackend::new(config.client_settings())?;
        Self::new(Arc::new(backend), config.tracker_settings())
    }

    /// Registers a new upload and starts its transfer in the background.
    ///
    /// Always creates a fresh entry, even for a file that is already tracked.
    pub fn add(&self, file: UploadFile, project: ProjectRef, options: UploadOptions) -> UploadId {
        self.inner.add(file, project, options)
    }

    pub fn remove(&self, upload_id: UploadId) {
        self.inner.dispatch(Msg::RemoveUpload { upload_id });
    }

    pub fn clear_completed(&self) {
        self.inner.dispatch(Msg::ClearCompleted);
    }

    pub fn clear_all(&self) {
        self.inner.dispatch(Msg::ClearAll);
    }

    pub fn snapshot(&self) -> UploadsView {
        self.inner.lock().state.view()
    }

    pub fn entry(&self, upload_id: UploadId) -> Option<UploadEntry> {
        self.inner.lock().state.entry(upload_id).cloned()
    }

    /// Receiver that observes every change of the derived view.
    pub fn subscribe(&self) -> watch::Receiver<UploadsView> {
        self.inner.view_tx.subscribe()
    }

    pub fn active_count(&self) -> usize {
        self.inner.lock().state.active_count()
    }

    pub fn has_active(&self) -> bool {
        self.inner.lock().state.has_active()
    }

    pub fn failed_count(&self) -> usize {
        self.inner.lock().state.failed_count()
    }

    /// Number of transfers, polls and sweeps currently held.
    pub fn outstanding_tasks(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    /// Cancels every outstanding task. Entries stay readable; uploads added
    /// afterwards fail immediately.
    pub fn shutdown(&self) {
        let mut shared = self.inner.lock();
        let outstanding = shared.tasks.len();
        shared.tasks.shutdown();
        upload_info!("Upload tracker shut down, cancelled {} task(s)", outstanding);
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.lock().tasks.is_shut_down()
    }
}

impl Inner {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add(
        self: &Arc<Self>,
        file: UploadFile,
        project: ProjectRef,
        options: UploadOptions,
    ) -> UploadId {
        let mut shared = self.lock();
        let upload_id = shared.state.next_id();
        upload_info!(
            "Adding {} as {} ({} bytes) to project {}",
            file.filename,
            upload_id,
            file.len(),
            project.id
        );
        self.apply(
            &mut shared,
            Msg::AddUpload {
                file,
                project,
                options,
                started_at: Utc::now(),
            },
        );

        if shared.tasks.is_shut_down() {
            upload_warn!("Rejecting {}: tracker is shut down", upload_id);
            self.apply(
                &mut shared,
                Msg::TransferFinished {
                    upload_id,
                    outcome: TransferOutcome::Failed {
                        kind: TransferFailure::Transport,
                        message: "Upload tracker is shut down".to_string(),
                    },
                },
            );
        }
        upload_id
    }

    pub(crate) fn dispatch(self: &Arc<Self>, msg: Msg) {
        let mut shared = self.lock();
        self.apply(&mut shared, msg);
    }

    /// Applies a message produced by a background task, unless that task has
    /// been cancelled or replaced in the meantime.
    pub(crate) fn dispatch_from(self: &Arc<Self>, ticket: &TaskTicket, msg: Msg) -> bool {
        let mut shared = self.lock();
        // Cancellation happens under this lock, so the check cannot race it.
        if !ticket.is_live() {
            return false;
        }
        self.apply(&mut shared, msg);
        true
    }

    /// Like [`Inner::dispatch_from`], for the final message of a one-shot task.
    pub(crate) fn finish_task(self: &Arc<Self>, ticket: &TaskTicket, msg: Msg) -> bool {
        let mut shared = self.lock();
        if !ticket.is_live() {
            return false;
        }
        shared.tasks.release(ticket);
        self.apply(&mut shared, msg);
        true
    }

    /// Runs `update`, executes its effects, and publishes the new view, all
    /// before the lock is released.
    fn apply(self: &Arc<Self>, shared: &mut Shared, msg: Msg) {
        let state = std::mem::take(&mut shared.state);
        let (mut state, effects) = update(state, msg);
        for effect in effects {
            self.run_effect(&mut shared.tasks, effect);
        }
        if state.consume_dirty() {
            self.view_tx.send_replace(state.view());
        }
        shared.state = state;
    }
}
