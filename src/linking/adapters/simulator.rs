//! Reference driver that simulates devices in memory.
//!
//! Every linked configuration reports `Connected` straight away. Linked
//! attributes keep their last value; actuator writes update that value and
//! are echoed back as sensor readings on the optional sensor feed, the way a
//! real device would confirm a command.

use async_trait::async_trait;
use mockable::Clock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;

use crate::linking::{
    domain::{
        AttributeRef, AttributeValueEvent, ConnectionStatus, EventSource, LinkedAttribute,
        ProtocolConfiguration,
    },
    ports::{Driver, DriverError, DriverResult, StatusReporter},
};

/// Registered name of the simulator driver.
pub const SIMULATOR_DRIVER_NAME: &str = "urn:agentlink:driver:simulator";

#[derive(Default)]
struct SimulatorState {
    reporters: HashMap<AttributeRef, StatusReporter>,
    // attribute -> (protocol configuration, current value)
    values: HashMap<AttributeRef, (AttributeRef, Option<Value>)>,
}

/// In-memory device simulator.
pub struct SimulatorDriver {
    name: String,
    clock: Arc<dyn Clock + Send + Sync>,
    sensor_tx: Option<mpsc::UnboundedSender<AttributeValueEvent>>,
    state: RwLock<SimulatorState>,
}

impl SimulatorDriver {
    /// Creates a simulator registered as [`SIMULATOR_DRIVER_NAME`].
    #[must_use]
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            name: SIMULATOR_DRIVER_NAME.to_owned(),
            clock,
            sensor_tx: None,
            state: RwLock::new(SimulatorState::default()),
        }
    }

    /// Registers the simulator under a different name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Echoes sensor readings to `sensor_tx`.
    #[must_use]
    pub fn with_sensor_feed(mut self, sensor_tx: mpsc::UnboundedSender<AttributeValueEvent>) -> Self {
        self.sensor_tx = Some(sensor_tx);
        self
    }

    /// Returns whether a configuration is linked to this simulator.
    #[must_use]
    pub fn is_linked(&self, protocol_ref: &AttributeRef) -> bool {
        self.read().reporters.contains_key(protocol_ref)
    }

    /// Returns the attributes linked through `protocol_ref`, sorted.
    #[must_use]
    pub fn linked_attributes(&self, protocol_ref: &AttributeRef) -> Vec<AttributeRef> {
        let mut linked: Vec<AttributeRef> = self
            .read()
            .values
            .iter()
            .filter(|(_, (owner, _))| owner == protocol_ref)
            .map(|(attribute_ref, _)| attribute_ref.clone())
            .collect();
        linked.sort();
        linked
    }

    /// Returns the simulated value of a linked attribute.
    #[must_use]
    pub fn value(&self, attribute_ref: &AttributeRef) -> Option<Value> {
        self.read()
            .values
            .get(attribute_ref)
            .and_then(|(_, value)| value.clone())
    }

    /// Pushes a connection status for a linked configuration, as if the
    /// simulated device had changed state. Returns `false` when unlinked.
    #[must_use]
    pub fn report_status(&self, protocol_ref: &AttributeRef, status: ConnectionStatus) -> bool {
        let Some(reporter) = self.read().reporters.get(protocol_ref).cloned() else {
            return false;
        };
        reporter.report(status);
        true
    }

    /// Simulates a device reading for a linked attribute.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Rejected`] when the attribute is not linked.
    pub fn simulate_reading(&self, attribute_ref: &AttributeRef, value: Value) -> DriverResult<()> {
        {
            let mut state = self.write();
            let (_, current) = state
                .values
                .get_mut(attribute_ref)
                .ok_or_else(|| DriverError::Rejected(format!("attribute {attribute_ref} is not linked")))?;
            *current = Some(value.clone());
        }
        self.emit(attribute_ref, value);
        Ok(())
    }

    fn emit(&self, attribute_ref: &AttributeRef, value: Value) {
        let Some(sensor_tx) = &self.sensor_tx else {
            return;
        };
        let event = AttributeValueEvent::new(attribute_ref.clone(), value, self.clock.utc())
            .with_source(EventSource::Sensor);
        if sensor_tx.send(event).is_err() {
            tracing::debug!(attribute_ref = %attribute_ref, "sensor feed closed");
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SimulatorState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SimulatorState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Driver for SimulatorDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn link_configuration(
        &self,
        configuration: &ProtocolConfiguration,
        reporter: StatusReporter,
    ) -> DriverResult<()> {
        self.write()
            .reporters
            .insert(configuration.reference().clone(), Arc::clone(&reporter));
        reporter.report(ConnectionStatus::Connected);
        Ok(())
    }

    async fn unlink_configuration(&self, configuration: &ProtocolConfiguration) -> DriverResult<()> {
        let protocol_ref = configuration.reference();
        let mut state = self.write();
        state.reporters.remove(protocol_ref);
        state.values.retain(|_, (owner, _)| owner != protocol_ref);
        Ok(())
    }

    async fn link_attributes(
        &self,
        attributes: &[LinkedAttribute],
        configuration: &ProtocolConfiguration,
    ) -> DriverResult<()> {
        let protocol_ref = configuration.reference();
        let mut state = self.write();
        if !state.reporters.contains_key(protocol_ref) {
            return Err(DriverError::Rejected(format!(
                "protocol configuration {protocol_ref} is not linked"
            )));
        }
        for attribute in attributes {
            state.values.insert(
                attribute.reference().clone(),
                (protocol_ref.clone(), attribute.attribute().value().cloned()),
            );
        }
        Ok(())
    }

    async fn unlink_attributes(
        &self,
        attributes: &[LinkedAttribute],
        _configuration: &ProtocolConfiguration,
    ) -> DriverResult<()> {
        let mut state = self.write();
        for attribute in attributes {
            state.values.remove(attribute.reference());
        }
        Ok(())
    }

    async fn write_value(
        &self,
        event: &AttributeValueEvent,
        configuration: &ProtocolConfiguration,
    ) -> DriverResult<()> {
        let attribute_ref = event.attribute_ref();
        {
            let mut state = self.write();
            match state.values.get_mut(attribute_ref) {
                Some((owner, current)) if owner == configuration.reference() => {
                    *current = Some(event.value().clone());
                }
                _ => {
                    return Err(DriverError::Rejected(format!(
                        "attribute {attribute_ref} is not linked to {}",
                        configuration.reference()
                    )));
                }
            }
        }
        self.emit(attribute_ref, event.value().clone());
        Ok(())
    }
}
