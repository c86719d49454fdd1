//! Builders and doubles shared by the linking unit tests.

use crate::linking::{
    adapters::memory::{InMemoryAssetStore, RecordingAssetPipeline},
    domain::{
        Asset, AssetId, AssetType, Attribute, AttributeRef, AttributeValueEvent, DriverName,
        LinkedAttribute, ProtocolConfiguration,
    },
    ports::{Driver, DriverResult, StatusReporter},
    services::{AgentService, DriverRegistry, LinkIndex, LinkSettings},
};
use async_trait::async_trait;
use mockable::{Clock, DefaultClock};
use mockall::mock;
use serde_json::json;
use std::sync::Arc;

pub const SIM_DRIVER: &str = "urn:agentlink:driver:sim";
pub const MODBUS_DRIVER: &str = "urn:agentlink:driver:modbus";

mock! {
    pub Driver {}

    #[async_trait]
    impl Driver for Driver {
        fn name(&self) -> &str;
        async fn link_configuration(
            &self,
            configuration: &ProtocolConfiguration,
            reporter: StatusReporter,
        ) -> DriverResult<()>;
        async fn unlink_configuration(&self, configuration: &ProtocolConfiguration)
        -> DriverResult<()>;
        async fn link_attributes(
            &self,
            attributes: &[LinkedAttribute],
            configuration: &ProtocolConfiguration,
        ) -> DriverResult<()>;
        async fn unlink_attributes(
            &self,
            attributes: &[LinkedAttribute],
            configuration: &ProtocolConfiguration,
        ) -> DriverResult<()>;
        async fn write_value(
            &self,
            event: &AttributeValueEvent,
            configuration: &ProtocolConfiguration,
        ) -> DriverResult<()>;
    }
}

/// Creates a mock driver that only answers its name.
pub fn named_mock(name: &str) -> MockDriver {
    let mut driver = MockDriver::new();
    driver.expect_name().return_const(name.to_owned());
    driver
}

pub fn clock() -> Arc<dyn Clock + Send + Sync> {
    Arc::new(DefaultClock)
}

pub fn asset_id(value: &str) -> AssetId {
    AssetId::new(value).expect("valid asset id")
}

pub fn attribute_ref(asset: &str, name: &str) -> AttributeRef {
    AttributeRef::new(asset_id(asset), name).expect("valid attribute ref")
}

pub fn driver_name(value: &str) -> DriverName {
    DriverName::new(value).expect("valid driver name")
}

pub fn config_attribute(name: &str, driver: &str) -> Attribute {
    Attribute::protocol_configuration(name, &driver_name(driver)).expect("valid configuration")
}

pub fn configuration(agent: &str, name: &str, driver: &str) -> ProtocolConfiguration {
    ProtocolConfiguration::from_attribute(&asset_id(agent), &config_attribute(name, driver))
        .expect("valid configuration")
        .expect("attribute is a protocol configuration")
}

pub fn linked_attribute(name: &str, protocol_ref: &AttributeRef) -> Attribute {
    Attribute::new(name)
        .expect("valid attribute")
        .with_value(json!(0))
        .with_agent_link(protocol_ref.clone())
}

pub fn linked(asset: &str, name: &str, protocol_ref: &AttributeRef) -> LinkedAttribute {
    LinkedAttribute::new(&asset_id(asset), linked_attribute(name, protocol_ref))
        .expect("valid linked attribute")
}

pub fn agent(id: &str, configurations: &[(&str, &str)]) -> Asset {
    configurations
        .iter()
        .fold(Asset::agent(asset_id(id), id), |agent, (name, driver)| {
            agent.with_attribute(config_attribute(name, driver))
        })
}

pub fn device(id: &str, parent: &str, attributes: Vec<Attribute>) -> Asset {
    let asset_type = AssetType::new("urn:agentlink:asset:thing").expect("valid asset type");
    attributes.into_iter().fold(
        Asset::new(asset_id(id), id, asset_type).with_parent(asset_id(parent)),
        Asset::with_attribute,
    )
}

pub fn index_with(drivers: Vec<Arc<dyn Driver>>) -> LinkIndex {
    let registry = DriverRegistry::from_drivers(drivers).expect("valid drivers");
    LinkIndex::new(Arc::new(registry), clock(), LinkSettings::default())
}

pub type TestService = AgentService<InMemoryAssetStore, RecordingAssetPipeline>;

pub async fn start_service(
    drivers: Vec<Arc<dyn Driver>>,
    store: &Arc<InMemoryAssetStore>,
    pipeline: &Arc<RecordingAssetPipeline>,
) -> TestService {
    AgentService::start(
        drivers,
        Arc::clone(store),
        Arc::clone(pipeline),
        clock(),
        LinkSettings::default(),
    )
    .await
    .expect("service should start")
}
