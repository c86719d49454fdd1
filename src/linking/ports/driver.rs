//! Driver port: the capability set every protocol driver implements.

use crate::linking::domain::{
    AttributeValueEvent, ConnectionStatus, LinkedAttribute, ProtocolConfiguration,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Callback through which a driver reports the connection status of one
/// linked protocol configuration.
///
/// Reports may arrive at any time, from any thread, including from inside
/// [`Driver::link_configuration`]. Reports made after the configuration was
/// unlinked or replaced are discarded.
pub trait ConnectionStatusSink: Send + Sync {
    /// Records a new status for the configuration this sink was issued for.
    fn report(&self, status: ConnectionStatus);
}

/// Shared handle to a [`ConnectionStatusSink`].
pub type StatusReporter = Arc<dyn ConnectionStatusSink>;

/// Protocol driver contract.
///
/// One instance exists per registered name for the whole process lifetime.
/// Drivers are trusted to report status truthfully; any error they return is
/// contained by the link index and surfaces only as an `Error` status.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Returns the driver's URN-shaped name.
    fn name(&self) -> &str;

    /// Starts serving a protocol configuration.
    ///
    /// The driver keeps `reporter` for as long as the configuration stays
    /// linked.
    async fn link_configuration(
        &self,
        configuration: &ProtocolConfiguration,
        reporter: StatusReporter,
    ) -> DriverResult<()>;

    /// Stops serving a protocol configuration.
    async fn unlink_configuration(&self, configuration: &ProtocolConfiguration)
    -> DriverResult<()>;

    /// Starts serving attributes bound to a linked configuration.
    async fn link_attributes(
        &self,
        attributes: &[LinkedAttribute],
        configuration: &ProtocolConfiguration,
    ) -> DriverResult<()>;

    /// Stops serving attributes bound to a linked configuration.
    async fn unlink_attributes(
        &self,
        attributes: &[LinkedAttribute],
        configuration: &ProtocolConfiguration,
    ) -> DriverResult<()>;

    /// Writes a value to the actuator behind a linked attribute.
    async fn write_value(
        &self,
        event: &AttributeValueEvent,
        configuration: &ProtocolConfiguration,
    ) -> DriverResult<()>;
}

/// Errors returned by driver implementations.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    /// The driver refused the request.
    #[error("driver rejected request: {0}")]
    Rejected(String),

    /// The driver did not answer within the configured call timeout.
    #[error("driver call timed out after {0:?}")]
    TimedOut(Duration),

    /// Generic driver failure.
    #[error("driver runtime error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl DriverError {
    /// Wraps a runtime error raised inside a driver.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}
