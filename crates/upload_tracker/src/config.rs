//! RON configuration file for the tracker service.
//!
//! Every field has a default, so an empty `()` document is a valid config.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use upload_engine::ClientSettings;
use upload_logging::{LogDestination, LogSettings};

use crate::{ConfigError, TrackerSettings};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TrackerConfig {
    pub server: ServerConfig,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub submit_path: String,
    /// Must contain `{job_id}`.
    pub job_status_path: String,
    pub connect_timeout_secs: u64,
    pub status_timeout_secs: u64,
    pub submit_timeout_secs: Option<u64>,
    pub chunk_size_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        Self {
            base_url: client.base_url,
            submit_path: client.submit_path,
            job_status_path: client.job_status_path,
            connect_timeout_secs: client.connect_timeout.as_secs(),
            status_timeout_secs: client.status_timeout.as_secs(),
            submit_timeout_secs: client.submit_timeout.map(|t| t.as_secs()),
            chunk_size_bytes: client.chunk_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub retention_grace_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        let settings = TrackerSettings::default();
        Self {
            interval_ms: settings.poll_interval.as_millis() as u64,
            retention_grace_secs: settings.retention_grace.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LogTarget {
    File,
    #[default]
    Terminal,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub destination: LogTarget,
    /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    pub level: String,
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            destination: LogTarget::Terminal,
            level: "info".to_string(),
            file: PathBuf::from(upload_logging::DEFAULT_LOG_FILE),
        }
    }
}

impl TrackerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: TrackerConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::new();
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("server.base_url is empty".into()));
        }
        if !self
            .server
            .job_status_path
            .contains(upload_engine::JOB_ID_PLACEHOLDER)
        {
            return Err(ConfigError::Invalid(format!(
                "server.job_status_path must contain {}",
                upload_engine::JOB_ID_PLACEHOLDER
            )));
        }
        if self.server.chunk_size_bytes == 0 {
            return Err(ConfigError::Invalid("server.chunk_size_bytes must be > 0".into()));
        }
        if self.polling.interval_ms == 0 {
            return Err(ConfigError::Invalid("polling.interval_ms must be > 0".into()));
        }
        if self.polling.retention_grace_secs == 0 {
            return Err(ConfigError::Invalid(
                "polling.retention_grace_secs must be > 0".into(),
            ));
        }
        self.log_level()?;
        Ok(())
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.server.base_url.clone(),
            submit_path: self.server.submit_path.clone(),
            job_status_path: self.server.job_status_path.clone(),
            connect_timeout: Duration::from_secs(self.server.connect_timeout_secs),
            submit_timeout: self.server.submit_timeout_secs.map(Duration::from_secs),
            status_timeout: Duration::from_secs(self.server.status_timeout_secs),
            chunk_size: self.server.chunk_size_bytes,
        }
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            poll_interval: Duration::from_millis(self.polling.interval_ms),
            retention_grace: Duration::from_secs(self.polling.retention_grace_secs),
        }
    }

    pub fn log_settings(&self) -> Result<LogSettings, ConfigError> {
        Ok(LogSettings {
            destination: match self.logging.destination {
                LogTarget::File => LogDestination::File,
                LogTarget::Terminal => LogDestination::Terminal,
                LogTarget::Both => LogDestination::Both,
            },
            level: self.log_level()?,
            file: self.logging.file.clone(),
        })
    }

    /// Installs the global logger described by the `logging` section.
    pub fn init_logging(&self) -> Result<bool, ConfigError> {
        Ok(upload_logging::initialize(&self.log_settings()?))
    }

    fn log_level(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(self.logging.level.trim())
            .map_err(|_| ConfigError::Invalid(format!("unknown log level {:?}", self.logging.level)))
    }
}
