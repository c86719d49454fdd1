//! Connection status of linked protocol configurations.

use super::{AttributeRef, ParseConnectionStatusError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Health of a protocol configuration as last reported by its driver.
///
/// Transitions are not constrained: linking starts in `Connecting`, the
/// driver may report any other value at any time, and unlinking forces
/// `Disconnected` before the record is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Linking has started and the driver has not reported yet.
    Connecting,
    /// The driver reports a working connection.
    Connected,
    /// The driver lost its connection and is retrying.
    Reconnecting,
    /// The configuration is not connected.
    Disconnected,
    /// The driver failed while linking, unlinking or reporting.
    Error,
}

impl ConnectionStatus {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ConnectionStatus {
    type Error = ParseConnectionStatusError;

    fn try_from(value: &str) -> Result<Self, ParseConnectionStatusError> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "connecting" => Ok(Self::Connecting),
            "connected" => Ok(Self::Connected),
            "reconnecting" => Ok(Self::Reconnecting),
            "disconnected" => Ok(Self::Disconnected),
            "error" => Ok(Self::Error),
            _ => Err(ParseConnectionStatusError(value.to_owned())),
        }
    }
}

/// Published whenever the status of a protocol configuration changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatusChange {
    protocol_ref: AttributeRef,
    status: ConnectionStatus,
    changed_at: DateTime<Utc>,
}

impl ConnectionStatusChange {
    /// Creates a status change notification.
    #[must_use]
    pub const fn new(
        protocol_ref: AttributeRef,
        status: ConnectionStatus,
        changed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            protocol_ref,
            status,
            changed_at,
        }
    }

    /// Returns the protocol configuration reference.
    #[must_use]
    pub const fn protocol_ref(&self) -> &AttributeRef {
        &self.protocol_ref
    }

    /// Returns the new status.
    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Returns when the change was recorded.
    #[must_use]
    pub const fn changed_at(&self) -> DateTime<Utc> {
        self.changed_at
    }
}
