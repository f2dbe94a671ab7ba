use std::time::Duration;

/// Delay between two job-status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// How long a completed entry stays visible before it is swept.
pub const DEFAULT_RETENTION_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub poll_interval: Duration,
    pub retention_grace: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            retention_grace: DEFAULT_RETENTION_GRACE,
        }
    }
}
