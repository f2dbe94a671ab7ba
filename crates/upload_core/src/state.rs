use std::collections::BTreeMap;

use crate::view_model::UploadsView;
use crate::{UploadEntry, UploadId, UploadPatch, UploadStatus};

/// Canonical store of every tracked upload.
///
/// Entries are keyed by id in a `BTreeMap`, so iteration order is creation
/// order. Ids come from a counter that never rewinds, not even after all
/// entries are cleared.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadState {
    entries: BTreeMap<UploadId, UploadEntry>,
    next_id: u64,
    dirty: bool,
}

impl UploadState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> impl Iterator<Item = &UploadEntry> {
        self.entries.values()
    }

    pub fn entry(&self, upload_id: UploadId) -> Option<&UploadEntry> {
        self.entries.get(&upload_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.status.is_active())
            .count()
    }

    pub fn has_active(&self) -> bool {
        self.entries.values().any(|entry| entry.status.is_active())
    }

    pub fn failed_count(&self) -> usize {
        self.count_with_status(UploadStatus::Failed)
    }

    pub fn view(&self) -> UploadsView {
        UploadsView {
            uploads: self.entries.values().cloned().collect(),
            active_count: self.active_count(),
            has_active: self.has_active(),
            failed_count: self.failed_count(),
        }
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn ids_with_status(&self, status: UploadStatus) -> Vec<UploadId> {
        self.entries
            .values()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.id)
            .collect()
    }

    pub(crate) fn ids(&self) -> Vec<UploadId> {
        self.entries.keys().copied().collect()
    }

    /// Id the next `Msg::AddUpload` will be given.
    pub fn next_id(&self) -> UploadId {
        UploadId(self.next_id + 1)
    }

    pub(crate) fn allocate_id(&mut self) -> UploadId {
        self.next_id += 1;
        UploadId(self.next_id)
    }

    pub(crate) fn insert(&mut self, entry: UploadEntry) {
        self.entries.insert(entry.id, entry);
        self.dirty = true;
    }

    /// Replaces the entry with `entry.merged(patch)`. Unknown ids are ignored.
    pub(crate) fn merge(&mut self, upload_id: UploadId, patch: &UploadPatch) -> bool {
        let Some(current) = self.entries.get(&upload_id) else {
            return false;
        };
        let next = current.merged(patch);
        if &next == current {
            return false;
        }
        self.entries.insert(upload_id, next);
        self.dirty = true;
        true
    }

    pub(crate) fn remove(&mut self, upload_id: UploadId) -> Option<UploadEntry> {
        let removed = self.entries.remove(&upload_id);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    fn count_with_status(&self, status: UploadStatus) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.status == status)
            .count()
    }
}
