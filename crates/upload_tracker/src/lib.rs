//! Upload tracker: background upload registry with job polling and retention.
//!
//! [`UploadTracker`] is the only entry point the rest of the application
//! uses. Uploads keep progressing while the caller moves on; state is read
//! through snapshots or a `watch` subscription.
mod config;
mod effects;
mod error;
mod settings;
mod tasks;
mod tracker;

pub use config::{LogTarget, LoggingConfig, PollingConfig, ServerConfig, TrackerConfig};
pub use error::{ConfigError, TrackerError};
pub use settings::{TrackerSettings, DEFAULT_POLL_INTERVAL, DEFAULT_RETENTION_GRACE};
pub use tracker::UploadTracker;

pub use upload_core::{
    ProjectRef, UploadEntry, UploadFile, UploadId, UploadOptions, UploadStatus, UploadsView,
};
