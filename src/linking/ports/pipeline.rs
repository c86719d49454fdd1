//! Asset-update pipeline port.

use crate::linking::domain::AttributeValueEvent;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for pipeline submissions.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// The generic asset-update pipeline that persists attribute values.
///
/// Sensor readings and unlinked client writes end up here; client writes to
/// agent-linked attributes never do.
#[async_trait]
pub trait AssetPipeline: Send + Sync {
    /// Submits a value event for processing.
    async fn submit(&self, event: AttributeValueEvent) -> PipelineResult<()>;
}

/// Errors returned by pipeline implementations.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// The pipeline refused the event.
    #[error("pipeline rejected event: {0}")]
    Rejected(String),

    /// Generic pipeline failure.
    #[error("pipeline runtime error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl PipelineError {
    /// Wraps a runtime error.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}
