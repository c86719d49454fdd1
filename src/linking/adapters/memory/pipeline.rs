//! Recording asset pipeline.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::linking::{
    domain::AttributeValueEvent,
    ports::{AssetPipeline, PipelineError, PipelineResult},
};

/// Asset pipeline that keeps every submitted event in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingAssetPipeline {
    events: Arc<RwLock<Vec<AttributeValueEvent>>>,
}

impl RecordingAssetPipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the submitted events.
    #[must_use]
    pub fn events(&self) -> Vec<AttributeValueEvent> {
        self.events
            .read()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Returns how many events were submitted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().map(|events| events.len()).unwrap_or(0)
    }

    /// Returns whether no event was submitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AssetPipeline for RecordingAssetPipeline {
    async fn submit(&self, event: AttributeValueEvent) -> PipelineResult<()> {
        let mut events = self
            .events
            .write()
            .map_err(|err| PipelineError::runtime(std::io::Error::other(err.to_string())))?;
        tracing::trace!(attribute_ref = %event.attribute_ref(), "asset pipeline accepted event");
        events.push(event);
        Ok(())
    }
}
