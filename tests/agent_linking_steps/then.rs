//! Then steps for agent linking BDD scenarios.

use super::world::{LinkingWorld, attribute_ref, driver_urn};
use agentlink::linking::domain::{ConnectionStatus, ProcessingStatus};
use rstest_bdd_macros::then;

fn parse_status(value: &str) -> Result<ConnectionStatus, eyre::Report> {
    ConnectionStatus::try_from(value).map_err(|err| eyre::eyre!("{err}"))
}

#[then(r#"protocol configuration "{configuration}" of agent "{agent}" reported "{first}" then "{second}""#)]
fn status_sequence(
    world: &mut LinkingWorld,
    configuration: String,
    agent: String,
    first: String,
    second: String,
) -> Result<(), eyre::Report> {
    let protocol_ref = attribute_ref(&agent, &configuration)?;
    let expected = vec![parse_status(&first)?, parse_status(&second)?];
    let status_rx = world
        .status_rx
        .as_mut()
        .ok_or_else(|| eyre::eyre!("linking engine is not running"))?;
    let mut observed = Vec::new();
    while let Ok(change) = status_rx.try_recv() {
        if change.protocol_ref() == &protocol_ref {
            observed.push(change.status());
        }
    }
    if observed != expected {
        return Err(eyre::eyre!(
            "expected status changes {expected:?} for {protocol_ref}, observed {observed:?}"
        ));
    }
    Ok(())
}

#[then(r#"protocol configuration "{configuration}" of agent "{agent}" is "{status}""#)]
fn status_is(
    world: &mut LinkingWorld,
    configuration: String,
    agent: String,
    status: String,
) -> Result<(), eyre::Report> {
    let protocol_ref = attribute_ref(&agent, &configuration)?;
    let expected = parse_status(&status)?;
    let actual = world.service()?.connection_status(&protocol_ref);
    if actual != Some(expected) {
        return Err(eyre::eyre!(
            "expected {protocol_ref} to be {expected}, found {actual:?}"
        ));
    }
    Ok(())
}

#[then(r#"attribute "{attribute}" of "{device}" is not linked"#)]
fn attribute_not_linked(
    world: &mut LinkingWorld,
    attribute: String,
    device: String,
) -> Result<(), eyre::Report> {
    let target = attribute_ref(&device, &attribute)?;
    if let Some(configuration) = world.service()?.linked_configuration(&target) {
        return Err(eyre::eyre!(
            "expected {target} to be unlinked, found it bound to {}",
            configuration.reference()
        ));
    }
    Ok(())
}

#[then(r#"attribute "{attribute}" of "{device}" is linked to driver "{driver}""#)]
fn attribute_linked_to_driver(
    world: &mut LinkingWorld,
    attribute: String,
    device: String,
    driver: String,
) -> Result<(), eyre::Report> {
    let target = attribute_ref(&device, &attribute)?;
    let configuration = world
        .service()?
        .linked_configuration(&target)
        .ok_or_else(|| eyre::eyre!("expected {target} to be linked"))?;
    if configuration.driver_value() != driver_urn(&driver) {
        return Err(eyre::eyre!(
            "expected {target} to be served by '{driver}', found '{}'",
            configuration.driver_value()
        ));
    }
    let served = world
        .driver(&driver)?
        .linked_attributes(configuration.reference());
    if !served.contains(&target) {
        return Err(eyre::eyre!("driver '{driver}' does not serve {target}"));
    }
    Ok(())
}

#[then(r#"driver "{driver}" no longer serves configuration "{configuration}" of agent "{agent}""#)]
fn driver_released_configuration(
    world: &mut LinkingWorld,
    driver: String,
    configuration: String,
    agent: String,
) -> Result<(), eyre::Report> {
    let protocol_ref = attribute_ref(&agent, &configuration)?;
    if world.driver(&driver)?.is_linked(&protocol_ref) {
        return Err(eyre::eyre!(
            "driver '{driver}' still serves {protocol_ref}"
        ));
    }
    Ok(())
}

#[then(r#"the value event ends as "{status}""#)]
fn value_event_outcome(world: &mut LinkingWorld, status: String) -> Result<(), eyre::Report> {
    let state = world
        .last_state
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no value event was routed"))?;
    let expected = match status.as_str() {
        "completed" => ProcessingStatus::Completed,
        "forwarded" => ProcessingStatus::Forwarded,
        "error" => ProcessingStatus::Error,
        other => return Err(eyre::eyre!("unknown processing status '{other}'")),
    };
    if state.status() != expected {
        return Err(eyre::eyre!(
            "expected value event to end {expected:?}, got {:?} ({:?})",
            state.status(),
            state.error()
        ));
    }
    Ok(())
}

#[then(r#"driver "{driver}" holds value "{value}" for attribute "{attribute}" of "{device}""#)]
fn driver_holds_value(
    world: &mut LinkingWorld,
    driver: String,
    value: String,
    attribute: String,
    device: String,
) -> Result<(), eyre::Report> {
    let target = attribute_ref(&device, &attribute)?;
    let expected: serde_json::Value = serde_json::from_str(&value)?;
    let actual = world.driver(&driver)?.value(&target);
    if actual.as_ref() != Some(&expected) {
        return Err(eyre::eyre!(
            "expected driver '{driver}' to hold {expected} for {target}, found {actual:?}"
        ));
    }
    Ok(())
}

#[then("the asset pipeline received {count:usize} events")]
fn pipeline_received(world: &mut LinkingWorld, count: usize) -> Result<(), eyre::Report> {
    let received = world.pipeline.len();
    if received != count {
        return Err(eyre::eyre!(
            "expected {count} pipeline events, found {received}"
        ));
    }
    Ok(())
}
