//! Event routing between the asset layer and drivers.

use super::{
    link_index::LinkIndex,
    reconciler::{ReconcileReport, Reconciler},
};
use crate::linking::{
    domain::{AssetChangeEvent, AttributeRef, AttributeState, AttributeValueEvent},
    ports::{AssetPipeline, AssetStore, AssetStoreResult},
};
use std::sync::Arc;

/// Routes persistence changes to reconciliation and value events to either
/// the asset pipeline or the owning driver.
pub struct EventRouter<S, P>
where
    S: AssetStore,
    P: AssetPipeline,
{
    index: Arc<LinkIndex>,
    reconciler: Reconciler<S>,
    store: Arc<S>,
    pipeline: Arc<P>,
}

impl<S, P> EventRouter<S, P>
where
    S: AssetStore,
    P: AssetPipeline,
{
    /// Creates a router over the shared index, store and pipeline.
    #[must_use]
    pub fn new(index: Arc<LinkIndex>, store: Arc<S>, pipeline: Arc<P>) -> Self {
        Self {
            reconciler: Reconciler::new(Arc::clone(&index), Arc::clone(&store)),
            index,
            store,
            pipeline,
        }
    }

    /// Returns the reconciler used for persistence changes.
    #[must_use]
    pub const fn reconciler(&self) -> &Reconciler<S> {
        &self.reconciler
    }

    /// Dispatches a persistence change to agent or asset reconciliation.
    pub async fn route_change_event(&self, event: &AssetChangeEvent) -> ReconcileReport {
        if event.asset().is_agent() {
            self.reconciler.reconcile_agent(event).await
        } else {
            self.reconciler.reconcile_asset(event).await
        }
    }

    /// Routes an attribute value event.
    ///
    /// Sensor events and events for attributes without an agent link are
    /// forwarded to the pipeline. Client and rule events for agent-linked
    /// attributes are written to the owning driver instead and never reach
    /// the pipeline; they end `Completed` or `Error`.
    pub async fn route_attribute_event(&self, event: AttributeValueEvent) -> AttributeState {
        let mut state = AttributeState::new(event);

        if state.event().is_sensor() {
            self.forward(&mut state).await;
            return state;
        }

        let target = state.event().attribute_ref().clone();
        let agent_link = match self.agent_link_of(&target).await {
            Ok(agent_link) => agent_link,
            Err(err) => {
                tracing::warn!(attribute_ref = %target, error = %err, "cannot resolve attribute event target");
                state.fail(err.to_string());
                return state;
            }
        };
        let Some(protocol_ref) = agent_link else {
            self.forward(&mut state).await;
            return state;
        };

        if self.index.protocol_configuration(&protocol_ref).is_none() {
            tracing::warn!(
                attribute_ref = %target,
                protocol_ref = %protocol_ref,
                "attribute event targets an agent link with no linked protocol configuration"
            );
            state.fail(format!("invalid agent link: {protocol_ref} is not linked"));
            return state;
        }

        match self.index.write_value(state.event(), &protocol_ref).await {
            Ok(()) => state.complete(),
            Err(err) => state.fail(err.to_string()),
        }
        state
    }

    async fn agent_link_of(&self, target: &AttributeRef) -> AssetStoreResult<Option<AttributeRef>> {
        let asset = self.store.find(target.asset_id()).await?;
        Ok(asset
            .as_ref()
            .and_then(|found| found.attribute(target.attribute_name()))
            .and_then(|attribute| attribute.agent_link().cloned()))
    }

    async fn forward(&self, state: &mut AttributeState) {
        match self.pipeline.submit(state.event().clone()).await {
            Ok(()) => state.forward(),
            Err(err) => {
                tracing::error!(
                    attribute_ref = %state.event().attribute_ref(),
                    error = %err,
                    "asset pipeline rejected attribute event"
                );
                state.fail(err.to_string());
            }
        }
    }
}
