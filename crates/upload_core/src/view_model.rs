use serde::Serialize;

use crate::UploadEntry;

/// Read contract exposed to the rest of the application.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadsView {
    pub uploads: Vec<UploadEntry>,
    pub active_count: usize,
    pub has_active: bool,
    pub failed_count: usize,
}
