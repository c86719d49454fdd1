//! Shared world state for agent linking BDD scenarios.

use std::collections::BTreeMap;
use std::sync::Arc;

use agentlink::linking::{
    adapters::{
        SimulatorDriver,
        memory::{InMemoryAssetStore, RecordingAssetPipeline},
    },
    domain::{
        Asset, AssetChangeEvent, AssetId, AssetType, Attribute, AttributeRef, AttributeState,
        ConnectionStatusChange, DriverName,
    },
    ports::{AssetStore, Driver},
    services::{AgentService, LinkSettings},
};
use mockable::{Clock, DefaultClock};
use rstest::fixture;
use tokio::sync::{broadcast, mpsc};

/// Service type used by the BDD world.
pub type TestAgentService = AgentService<InMemoryAssetStore, RecordingAssetPipeline>;

/// Short driver names available to every scenario.
const DRIVERS: [&str; 2] = ["sim", "modbus"];

/// Scenario world for agent linking behaviour tests.
pub struct LinkingWorld {
    /// Asset store announcing its changes on `changes`.
    pub store: Arc<InMemoryAssetStore>,
    /// Change feed of the asset store.
    pub changes: mpsc::UnboundedReceiver<AssetChangeEvent>,
    /// Pipeline receiving forwarded value events.
    pub pipeline: Arc<RecordingAssetPipeline>,
    /// Simulator drivers keyed by short name.
    pub drivers: BTreeMap<String, Arc<SimulatorDriver>>,
    /// The engine, once started.
    pub service: Option<TestAgentService>,
    /// Status changes observed since the engine started.
    pub status_rx: Option<broadcast::Receiver<ConnectionStatusChange>>,
    /// Outcome of the last routed value event.
    pub last_state: Option<AttributeState>,
}

impl LinkingWorld {
    /// Creates a world with an empty store and one simulator per driver name.
    #[must_use]
    pub fn new() -> Self {
        let clock: Arc<dyn Clock + Send + Sync> = Arc::new(DefaultClock);
        let (asset_store, changes) = InMemoryAssetStore::with_change_feed();
        let drivers = DRIVERS
            .iter()
            .map(|name| {
                let simulator =
                    SimulatorDriver::new(Arc::clone(&clock)).with_name(driver_urn(name));
                ((*name).to_owned(), Arc::new(simulator))
            })
            .collect();
        Self {
            store: Arc::new(asset_store),
            changes,
            pipeline: Arc::new(RecordingAssetPipeline::new()),
            drivers,
            service: None,
            status_rx: None,
            last_state: None,
        }
    }

    /// Starts the engine over the world's store, pipeline and drivers.
    ///
    /// # Errors
    ///
    /// Returns an error when the service fails to start.
    pub fn start(&mut self) -> Result<(), eyre::Report> {
        let drivers: Vec<Arc<dyn Driver>> = self
            .drivers
            .values()
            .map(|driver| Arc::clone(driver) as Arc<dyn Driver>)
            .collect();
        let service = run_async(AgentService::start(
            drivers,
            Arc::clone(&self.store),
            Arc::clone(&self.pipeline),
            Arc::new(DefaultClock),
            LinkSettings::default(),
        ))?;
        self.status_rx = Some(service.subscribe_status());
        self.service = Some(service);
        Ok(())
    }

    /// Returns the running engine.
    ///
    /// # Errors
    ///
    /// Returns an error when the engine has not been started.
    pub fn service(&self) -> Result<&TestAgentService, eyre::Report> {
        self.service
            .as_ref()
            .ok_or_else(|| eyre::eyre!("linking engine is not running"))
    }

    /// Returns the simulator registered under a short driver name.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown driver names.
    pub fn driver(&self, name: &str) -> Result<&SimulatorDriver, eyre::Report> {
        self.drivers
            .get(name)
            .map(Arc::as_ref)
            .ok_or_else(|| eyre::eyre!("no simulator named '{name}' in scenario world"))
    }

    /// Merges an asset into the store and reconciles every resulting change.
    ///
    /// # Errors
    ///
    /// Returns an error when the merge fails or the engine is not running.
    pub fn store_asset(&mut self, asset: Asset) -> Result<(), eyre::Report> {
        run_async(self.store.merge(asset, None))?;
        self.settle()
    }

    /// Feeds queued store changes to the engine in commit order.
    ///
    /// # Errors
    ///
    /// Returns an error when the engine is not running.
    pub fn settle(&mut self) -> Result<(), eyre::Report> {
        let service = self
            .service
            .as_ref()
            .ok_or_else(|| eyre::eyre!("linking engine is not running"))?;
        while let Ok(event) = self.changes.try_recv() {
            run_async(service.handle_change_event(&event));
        }
        Ok(())
    }
}

impl Default for LinkingWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> LinkingWorld {
    LinkingWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// Expands a short driver name into its registered URN.
pub fn driver_urn(name: &str) -> String {
    format!("urn:agentlink:driver:{name}")
}

/// Builds a reference to an attribute of an asset.
///
/// # Errors
///
/// Returns an error when either identifier is blank.
pub fn attribute_ref(asset: &str, attribute: &str) -> Result<AttributeRef, eyre::Report> {
    Ok(AttributeRef::new(AssetId::new(asset)?, attribute)?)
}

/// Builds an agent with a single protocol configuration.
///
/// # Errors
///
/// Returns an error for invalid identifiers or driver names.
pub fn agent_with_configuration(
    agent: &str,
    configuration: &str,
    driver: &str,
) -> Result<Asset, eyre::Report> {
    let driver_name = DriverName::new(driver_urn(driver))?;
    Ok(Asset::agent(AssetId::new(agent)?, agent)
        .with_attribute(Attribute::protocol_configuration(configuration, &driver_name)?))
}

/// Builds a device under `agent` with one attribute linked to `configuration`.
///
/// # Errors
///
/// Returns an error for invalid identifiers.
pub fn device_with_linked_attribute(
    device: &str,
    agent: &str,
    attribute: &str,
    configuration: &str,
) -> Result<Asset, eyre::Report> {
    let linked = Attribute::new(attribute)?
        .with_value(serde_json::json!(0))
        .with_agent_link(attribute_ref(agent, configuration)?);
    Ok(Asset::new(
        AssetId::new(device)?,
        device,
        AssetType::new("urn:agentlink:asset:thing")?,
    )
    .with_parent(AssetId::new(agent)?)
    .with_attribute(linked))
}
