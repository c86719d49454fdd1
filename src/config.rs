//! Runtime configuration for the linking engine.
//!
//! Configuration is a JSON document; every field is optional and unknown
//! fields are rejected. A representative file is:
//!
//! ```json
//! {
//!   "value_workers": 4,
//!   "queue_capacity": 1024,
//!   "status_channel_capacity": 256,
//!   "driver_call_timeout_ms": 5000,
//!   "diff_ignored_fields": ["valueTimestamp"],
//!   "json_logs": false
//! }
//! ```

use crate::linking::{
    domain::VALUE_TIMESTAMP_FIELD,
    services::{DispatchSettings, LinkSettings},
};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration from {path}: {source}")]
    Io {
        /// Path that was being read.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid configuration JSON.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentLinkConfig {
    /// Number of workers consuming attribute value events.
    pub value_workers: usize,
    /// Capacity of each bounded event queue.
    pub queue_capacity: usize,
    /// Capacity of the connection status broadcast channel.
    pub status_channel_capacity: usize,
    /// Upper bound for a single driver call in milliseconds.
    pub driver_call_timeout_ms: Option<u64>,
    /// Attribute fields ignored when diffing agent-linked attributes.
    pub diff_ignored_fields: Vec<String>,
    /// Emits daemon logs as JSON lines.
    pub json_logs: bool,
}

impl Default for AgentLinkConfig {
    fn default() -> Self {
        Self {
            value_workers: 4,
            queue_capacity: 1024,
            status_channel_capacity: 256,
            driver_call_timeout_ms: None,
            diff_ignored_fields: vec![VALUE_TIMESTAMP_FIELD.to_owned()],
            json_logs: false,
        }
    }
}

impl AgentLinkConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or unknown fields and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise
    /// the errors of [`Self::from_json_str`].
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let file_name = path
            .file_name()
            .ok_or_else(|| ConfigError::Invalid(format!("{path} does not name a file")))?;
        let parent = path
            .parent()
            .filter(|dir| !dir.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));

        let io_error = |source| ConfigError::Io {
            path: path.to_owned(),
            source,
        };
        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(io_error)?;
        let text = dir.read_to_string(file_name).map_err(io_error)?;
        Self::from_json_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.value_workers == 0 {
            return Err(ConfigError::Invalid("value_workers must be at least 1".to_owned()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".to_owned()));
        }
        if self.status_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "status_channel_capacity must be at least 1".to_owned(),
            ));
        }
        if self.driver_call_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "driver_call_timeout_ms must be positive when set".to_owned(),
            ));
        }
        Ok(())
    }

    /// Returns the link index settings.
    #[must_use]
    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            driver_call_timeout: self.driver_call_timeout_ms.map(Duration::from_millis),
            status_channel_capacity: self.status_channel_capacity,
            diff_ignored_fields: self.diff_ignored_fields.clone(),
        }
    }

    /// Returns the dispatcher sizing.
    #[must_use]
    pub const fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            value_workers: self.value_workers,
            queue_capacity: self.queue_capacity,
        }
    }
}
