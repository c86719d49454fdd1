//! Given steps for agent linking BDD scenarios.

use super::world::{LinkingWorld, agent_with_configuration, device_with_linked_attribute};
use eyre::WrapErr;
use rstest_bdd_macros::given;

#[given("the linking engine is running")]
fn engine_running(world: &mut LinkingWorld) -> Result<(), eyre::Report> {
    world.start().wrap_err("start linking engine")
}

#[given(r#"an agent "{agent}" with protocol configuration "{configuration}" for driver "{driver}""#)]
fn an_agent_with_configuration(
    world: &mut LinkingWorld,
    agent: String,
    configuration: String,
    driver: String,
) -> Result<(), eyre::Report> {
    let asset = agent_with_configuration(&agent, &configuration, &driver)?;
    world.store_asset(asset).wrap_err("store agent for scenario")
}

#[given(r#"a device "{device}" under "{agent}" with attribute "{attribute}" linked to configuration "{configuration}""#)]
fn a_device_with_linked_attribute(
    world: &mut LinkingWorld,
    device: String,
    agent: String,
    attribute: String,
    configuration: String,
) -> Result<(), eyre::Report> {
    let asset = device_with_linked_attribute(&device, &agent, &attribute, &configuration)?;
    world.store_asset(asset).wrap_err("store device for scenario")
}
