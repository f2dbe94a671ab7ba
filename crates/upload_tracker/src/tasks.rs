use std::collections::HashMap;
use std::future::Future;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use upload_core::UploadId;
use upload_logging::{upload_debug, upload_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TaskKind {
    Transfer,
    Poll,
    Sweep,
}

/// Identity handed to a running task. Its token is cancelled as soon as the
/// task is replaced, cancelled, or the registry shuts down.
#[derive(Debug, Clone)]
pub(crate) struct TaskTicket {
    pub(crate) upload_id: UploadId,
    pub(crate) kind: TaskKind,
    token: CancellationToken,
}

impl TaskTicket {
    pub(crate) fn is_live(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Cancels and aborts its task when dropped.
struct TaskGuard {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.token.cancel();
        self.handle.abort();
    }
}

/// Owns every background task of the tracker, at most one per upload and kind.
pub(crate) struct TaskRegistry {
    root: CancellationToken,
    tasks: HashMap<(UploadId, TaskKind), TaskGuard>,
}

impl TaskRegistry {
    pub(crate) fn new() -> Self {
        Self {
            root: CancellationToken::new(),
            tasks: HashMap::new(),
        }
    }

    /// Spawns a task for `(upload_id, kind)`, cancelling any task already held for that key.
    pub(crate) fn spawn<F, Fut>(
        &mut self,
        runtime: &Handle,
        upload_id: UploadId,
        kind: TaskKind,
        make: F,
    ) where
        F: FnOnce(TaskTicket) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.root.is_cancelled() {
            upload_warn!(
                "Not starting {:?} task for {}: tracker is shut down",
                kind,
                upload_id
            );
            return;
        }
        if self.cancel(upload_id, kind) {
            upload_debug!("Replaced running {:?} task for {}", kind, upload_id);
        }

        let token = self.root.child_token();
        let ticket = TaskTicket {
            upload_id,
            kind,
            token: token.clone(),
        };
        let handle = runtime.spawn(make(ticket));
        self.tasks.insert((upload_id, kind), TaskGuard { token, handle });
    }

    pub(crate) fn cancel(&mut self, upload_id: UploadId, kind: TaskKind) -> bool {
        self.tasks.remove(&(upload_id, kind)).is_some()
    }

    pub(crate) fn cancel_upload(&mut self, upload_id: UploadId) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|(id, _), _| *id != upload_id);
        before - self.tasks.len()
    }

    /// Forgets a task that is finishing on its own. Stale tickets are ignored.
    pub(crate) fn release(&mut self, ticket: &TaskTicket) {
        if ticket.is_live() {
            self.tasks.remove(&(ticket.upload_id, ticket.kind));
        }
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, upload_id: UploadId, kind: TaskKind) -> bool {
        self.tasks.contains_key(&(upload_id, kind))
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn shutdown(&mut self) {
        self.root.cancel();
        self.tasks.clear();
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
