//! When steps for agent linking BDD scenarios.

use super::world::{
    LinkingWorld, agent_with_configuration, attribute_ref, device_with_linked_attribute,
    driver_urn, run_async,
};
use agentlink::linking::domain::{
    AssetId, Attribute, AttributeValueEvent, DriverName, EventSource,
};
use chrono::Utc;
use eyre::WrapErr;
use rstest_bdd_macros::when;

#[when(r#"agent "{agent}" is stored with protocol configuration "{configuration}" for driver "{driver}""#)]
fn agent_is_stored(
    world: &mut LinkingWorld,
    agent: String,
    configuration: String,
    driver: String,
) -> Result<(), eyre::Report> {
    let asset = agent_with_configuration(&agent, &configuration, &driver)?;
    world.store_asset(asset).wrap_err("store agent")
}

#[when(r#"device "{device}" under "{agent}" is stored with attribute "{attribute}" linked to configuration "{configuration}""#)]
fn device_is_stored(
    world: &mut LinkingWorld,
    device: String,
    agent: String,
    attribute: String,
    configuration: String,
) -> Result<(), eyre::Report> {
    let asset = device_with_linked_attribute(&device, &agent, &attribute, &configuration)?;
    world.store_asset(asset).wrap_err("store device")
}

#[when(r#"protocol configuration "{configuration}" of agent "{agent}" is switched to driver "{driver}""#)]
fn configuration_switched(
    world: &mut LinkingWorld,
    configuration: String,
    agent: String,
    driver: String,
) -> Result<(), eyre::Report> {
    let replacement =
        Attribute::protocol_configuration(configuration, &DriverName::new(driver_urn(&driver))?)?;
    let agent_id = AssetId::new(agent)?;
    let updated = run_async(
        world
            .service()?
            .update_protocol_configuration(&agent_id, replacement),
    )
    .wrap_err("update protocol configuration")?;
    if !updated {
        return Err(eyre::eyre!("protocol configuration update was skipped"));
    }
    world.settle()
}

#[when(r#"a client writes "{value}" to attribute "{attribute}" of "{device}""#)]
fn client_writes(
    world: &mut LinkingWorld,
    value: String,
    attribute: String,
    device: String,
) -> Result<(), eyre::Report> {
    let event = AttributeValueEvent::new(
        attribute_ref(&device, &attribute)?,
        serde_json::from_str(&value)?,
        Utc::now(),
    );
    let state = run_async(world.service()?.route_attribute_event(event));
    world.last_state = Some(state);
    Ok(())
}

#[when(r#"a sensor reading of "{value}" arrives for attribute "{attribute}" of "{device}""#)]
fn sensor_reading_arrives(
    world: &mut LinkingWorld,
    value: String,
    attribute: String,
    device: String,
) -> Result<(), eyre::Report> {
    let event = AttributeValueEvent::new(
        attribute_ref(&device, &attribute)?,
        serde_json::from_str(&value)?,
        Utc::now(),
    )
    .with_source(EventSource::Sensor);
    let state = run_async(world.service()?.route_attribute_event(event));
    world.last_state = Some(state);
    Ok(())
}
