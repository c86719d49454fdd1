//! Shared test helpers for in-memory linking integration tests.

use agentlink::linking::{
    adapters::{
        SimulatorDriver,
        memory::{InMemoryAssetStore, RecordingAssetPipeline},
    },
    domain::{
        Asset, AssetChangeEvent, AssetId, AssetType, Attribute, AttributeRef, AttributeValueEvent,
        DriverName,
    },
    ports::Driver,
    services::{AgentService, LinkSettings},
};
use mockable::{Clock, DefaultClock};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Driver URN served by the stack's simulator.
pub const DRIVER: &str = "urn:agentlink:driver:simulator";

/// Service type wired over the in-memory adapters.
pub type StackService = AgentService<InMemoryAssetStore, RecordingAssetPipeline>;

/// A running engine over in-memory collaborators.
pub struct Stack {
    /// The engine.
    pub service: Arc<StackService>,
    /// Asset store backing the engine.
    pub store: Arc<InMemoryAssetStore>,
    /// Pipeline receiving forwarded value events.
    pub pipeline: Arc<RecordingAssetPipeline>,
    /// The simulator registered with the engine.
    pub simulator: Arc<SimulatorDriver>,
    /// Store change feed.
    pub changes: mpsc::UnboundedReceiver<AssetChangeEvent>,
    /// Readings and write echoes emitted by the simulator.
    pub readings: mpsc::UnboundedReceiver<AttributeValueEvent>,
}

impl Stack {
    /// Starts an engine over a store seeded with `assets`.
    ///
    /// # Errors
    ///
    /// Returns an error when seeding or startup fails.
    pub async fn start(
        assets: Vec<Asset>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let clock: Arc<dyn Clock + Send + Sync> = Arc::new(DefaultClock);
        let (asset_store, changes) = InMemoryAssetStore::with_change_feed();
        asset_store.seed(assets)?;
        let store = Arc::new(asset_store);
        let pipeline = Arc::new(RecordingAssetPipeline::new());
        let (sensor_tx, readings) = mpsc::unbounded_channel();
        let simulator = Arc::new(
            SimulatorDriver::new(Arc::clone(&clock))
                .with_name(DRIVER)
                .with_sensor_feed(sensor_tx),
        );
        let driver: Arc<dyn Driver> = simulator.clone();
        let service = AgentService::start(
            [driver],
            Arc::clone(&store),
            Arc::clone(&pipeline),
            clock,
            LinkSettings::default(),
        )
        .await?;
        Ok(Self {
            service: Arc::new(service),
            store,
            pipeline,
            simulator,
            changes,
            readings,
        })
    }

    /// Feeds every queued store change to the engine in commit order.
    ///
    /// Returns the number of changes handled.
    pub async fn pump_changes(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.changes.try_recv() {
            self.service.handle_change_event(&event).await;
            handled += 1;
        }
        handled
    }

    /// Publishes every queued simulator reading through the engine.
    ///
    /// # Errors
    ///
    /// Returns an error when the pipeline rejects a reading.
    pub async fn pump_readings(&mut self) -> Result<usize, Box<dyn std::error::Error + Send + Sync>> {
        let mut published = 0;
        while let Ok(reading) = self.readings.try_recv() {
            self.service.send_attribute_event(reading).await?;
            published += 1;
        }
        Ok(published)
    }
}

/// Builds an asset id, panicking on blank input.
pub fn id(value: &str) -> AssetId {
    AssetId::new(value).expect("valid asset id")
}

/// Builds an attribute reference.
pub fn reference(asset: &str, attribute: &str) -> AttributeRef {
    AttributeRef::new(id(asset), attribute).expect("valid attribute reference")
}

/// Builds an agent with protocol configurations for the simulator.
pub fn agent(agent_id: &str, configurations: &[&str]) -> Asset {
    let driver = DriverName::new(DRIVER).expect("valid driver name");
    configurations.iter().fold(
        Asset::agent(id(agent_id), agent_id),
        |asset, name| {
            asset.with_attribute(
                Attribute::protocol_configuration(*name, &driver)
                    .expect("valid protocol configuration"),
            )
        },
    )
}

/// Builds a device under `parent` whose attributes link to configurations of
/// that parent, given as `(attribute, configuration)` pairs.
pub fn device(device_id: &str, parent: &str, links: &[(&str, &str)]) -> Asset {
    links.iter().fold(
        Asset::new(
            id(device_id),
            device_id,
            AssetType::new("urn:agentlink:asset:thing").expect("valid asset type"),
        )
        .with_parent(id(parent)),
        |asset, (attribute, configuration)| {
            asset.with_attribute(
                Attribute::new(*attribute)
                    .expect("valid attribute")
                    .with_value(json!(0))
                    .with_agent_link(reference(parent, configuration)),
            )
        },
    )
}
