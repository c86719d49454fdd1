//! Agent service: startup, shutdown and the driver-facing API.

use super::{
    link_index::{LinkIndex, LinkIndexError, LinkSettings},
    reconciler::ReconcileReport,
    registry::{DriverRegistry, DriverRegistryError},
    router::EventRouter,
};
use crate::linking::{
    domain::{
        Asset, AssetChangeEvent, AssetId, AssetType, Attribute, AttributeRef, AttributeState,
        AttributeValueEvent, ConnectionStatus, ConnectionStatusChange, EventSource,
        LinkDomainError, OwnerId, PersistenceCause, ProtocolConfiguration,
    },
    ports::{AssetPipeline, AssetQuery, AssetStore, AssetStoreError, Driver, PipelineError},
};
use mockable::Clock;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;

/// Service-level errors for agent operations.
#[derive(Debug, Error)]
pub enum AgentServiceError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] LinkDomainError),
    /// Driver registration failed during startup.
    #[error(transparent)]
    Registry(#[from] DriverRegistryError),
    /// The asset store failed.
    #[error(transparent)]
    Store(#[from] AssetStoreError),
    /// The asset pipeline refused an event.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// The link index reported an inconsistency.
    #[error(transparent)]
    Link(#[from] LinkIndexError),
}

/// Result type for agent service operations.
pub type AgentServiceResult<T> = Result<T, AgentServiceError>;

/// Orchestrates the driver registry, link index, reconciler and router.
pub struct AgentService<S, P>
where
    S: AssetStore,
    P: AssetPipeline,
{
    index: Arc<LinkIndex>,
    router: EventRouter<S, P>,
    store: Arc<S>,
    pipeline: Arc<P>,
    agents: RwLock<BTreeMap<AssetId, Asset>>,
}

impl<S, P> AgentService<S, P>
where
    S: AssetStore,
    P: AssetPipeline,
{
    /// Starts the service.
    ///
    /// Registers every driver, loads the persisted agents into the cache and
    /// links each of their protocol configurations. Linking is best-effort:
    /// one failing configuration never blocks the others.
    ///
    /// # Errors
    ///
    /// Returns [`AgentServiceError::Registry`] on a duplicate or malformed
    /// driver name and [`AgentServiceError::Store`] when agents cannot be
    /// loaded. Both abort startup.
    pub async fn start(
        drivers: impl IntoIterator<Item = Arc<dyn Driver>>,
        store: Arc<S>,
        pipeline: Arc<P>,
        clock: Arc<dyn Clock + Send + Sync>,
        settings: LinkSettings,
    ) -> AgentServiceResult<Self> {
        let registry = DriverRegistry::from_drivers(drivers)?;
        tracing::info!(drivers = registry.len(), "driver registry populated");

        let index = Arc::new(LinkIndex::new(Arc::new(registry), clock, settings));
        let agents = store
            .find_all(&AssetQuery::ByType(AssetType::agent()))
            .await?;

        let service = Self {
            router: EventRouter::new(Arc::clone(&index), Arc::clone(&store), Arc::clone(&pipeline)),
            index,
            store,
            pipeline,
            agents: RwLock::new(
                agents
                    .into_iter()
                    .map(|agent| (agent.id().clone(), agent))
                    .collect(),
            ),
        };

        let mut report = ReconcileReport::default();
        for agent in service.agents() {
            for configuration in agent.protocol_configurations() {
                service
                    .router
                    .reconciler()
                    .link_protocol_configuration(&configuration, &mut report)
                    .await;
            }
        }
        tracing::info!(
            agents = service.agent_count(),
            linked = report.linked_configurations,
            failed = report.failures,
            "agent service started"
        );
        Ok(service)
    }

    /// Unlinks every active protocol configuration.
    ///
    /// Driver failures are logged and never stop the remaining unlinks.
    /// Returns the number of configurations unlinked.
    pub async fn stop(&self) -> usize {
        let active = self.index.active_configurations();
        for configuration in &active {
            self.index
                .unlink_configuration(configuration.reference())
                .await;
        }
        tracing::info!(unlinked = active.len(), "agent service stopped");
        active.len()
    }

    /// Returns the shared link index.
    #[must_use]
    pub fn link_index(&self) -> &LinkIndex {
        &self.index
    }

    /// Returns the connection status of a protocol configuration.
    #[must_use]
    pub fn connection_status(&self, protocol_ref: &AttributeRef) -> Option<ConnectionStatus> {
        self.index.connection_status(protocol_ref)
    }

    /// Returns the configuration serving an attribute.
    #[must_use]
    pub fn linked_configuration(
        &self,
        attribute_ref: &AttributeRef,
    ) -> Option<ProtocolConfiguration> {
        self.index.linked_configuration(attribute_ref)
    }

    /// Returns a linked protocol configuration by its own reference.
    #[must_use]
    pub fn protocol_configuration(
        &self,
        protocol_ref: &AttributeRef,
    ) -> Option<ProtocolConfiguration> {
        self.index.protocol_configuration(protocol_ref)
    }

    /// Subscribes to connection status changes.
    #[must_use]
    pub fn subscribe_status(&self) -> broadcast::Receiver<ConnectionStatusChange> {
        self.index.subscribe_status()
    }

    /// Returns the cached agents, ordered by identifier.
    #[must_use]
    pub fn agents(&self) -> Vec<Asset> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Returns a cached agent.
    #[must_use]
    pub fn agent(&self, id: &AssetId) -> Option<Asset> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn agent_count(&self) -> usize {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Checks the link index invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AgentServiceError::Link`] when an attribute is bound twice.
    pub fn verify_link_invariants(&self) -> AgentServiceResult<()> {
        Ok(self.index.verify_invariants()?)
    }

    /// Merges a driver-discovered asset into the store.
    ///
    /// Drivers manage their own identifier space, so the asset keeps its id.
    ///
    /// # Errors
    ///
    /// Returns [`LinkDomainError::MissingParentId`] when the asset has no
    /// parent, or the store error when the merge fails.
    pub async fn merge_asset(
        &self,
        asset: Asset,
        owner: Option<&OwnerId>,
    ) -> AgentServiceResult<Asset> {
        if asset.parent_id().is_none() {
            return Err(LinkDomainError::MissingParentId(asset.id().clone()).into());
        }
        tracing::debug!(asset_id = %asset.id(), "merging driver-provided asset");
        Ok(self.store.merge(asset, owner).await?)
    }

    /// Deletes a driver-managed asset. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns the store error when the delete fails.
    pub async fn delete_asset(&self, id: &AssetId) -> AgentServiceResult<bool> {
        tracing::debug!(asset_id = %id, "deleting driver-managed asset");
        Ok(self.store.delete(id).await?)
    }

    /// Publishes a driver-authored value to the asset pipeline.
    ///
    /// The event is always tagged as a sensor reading.
    ///
    /// # Errors
    ///
    /// Returns [`AgentServiceError::Pipeline`] when the pipeline refuses it.
    pub async fn send_attribute_event(&self, event: AttributeValueEvent) -> AgentServiceResult<()> {
        let reading = event.with_source(EventSource::Sensor);
        tracing::trace!(attribute_ref = %reading.attribute_ref(), "publishing sensor event");
        Ok(self.pipeline.submit(reading).await?)
    }

    /// Replaces one of an agent's protocol configuration attributes on
    /// behalf of its driver.
    ///
    /// Returns `false` without touching the store when the agent or the
    /// attribute does not exist, or the content is unchanged. A merged agent
    /// flows back in as an agent update and is reconciled from there.
    ///
    /// # Errors
    ///
    /// Returns the store error when loading or merging the agent fails.
    pub async fn update_protocol_configuration(
        &self,
        agent_id: &AssetId,
        configuration: Attribute,
    ) -> AgentServiceResult<bool> {
        let Some(mut agent) = self.store.find(agent_id).await? else {
            tracing::warn!(agent_id = %agent_id, "protocol configuration does not belong to a stored agent");
            return Ok(false);
        };
        let current = match agent.attribute(configuration.name()) {
            Some(current) if agent.is_agent() && current.is_protocol_configuration() => current,
            _ => {
                tracing::warn!(
                    agent_id = %agent_id,
                    attribute = configuration.name(),
                    "protocol configuration does not belong to a valid agent"
                );
                return Ok(false);
            }
        };
        if current.content() == configuration.content() {
            return Ok(false);
        }

        tracing::debug!(agent_id = %agent_id, attribute = configuration.name(), "updating agent protocol configuration");
        agent.replace_attribute(configuration);
        self.store.merge(agent, None).await?;
        Ok(true)
    }

    /// Handles a committed persistence change.
    ///
    /// Agent changes refresh the agent cache before reconciliation.
    pub async fn handle_change_event(&self, event: &AssetChangeEvent) -> ReconcileReport {
        let asset = event.asset();
        if asset.is_agent() {
            let mut agents = self.agents.write().unwrap_or_else(PoisonError::into_inner);
            match event.cause() {
                PersistenceCause::Insert | PersistenceCause::Update => {
                    agents.insert(asset.id().clone(), asset.clone());
                }
                PersistenceCause::Delete => {
                    agents.remove(asset.id());
                }
            }
        }
        self.router.route_change_event(event).await
    }

    /// Routes a client, rule or sensor value event.
    pub async fn route_attribute_event(&self, event: AttributeValueEvent) -> AttributeState {
        self.router.route_attribute_event(event).await
    }
}
