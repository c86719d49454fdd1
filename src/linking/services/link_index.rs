//! Attribute link index and connection status tracker.
//!
//! [`LinkIndex`] is the authoritative in-memory record of which protocol
//! configurations are linked, what their connection status is, and which
//! attributes are bound to each of them. Two locks are involved:
//!
//! - an async operation lock serialises every link and unlink so that, for a
//!   single configuration, link, status and unlink are totally ordered;
//! - a synchronous table lock protects the record map and the attribute
//!   ownership map together. It is never held across an await, so drivers
//!   may report status from inside their own link call.
//!
//! Actuator writes only take the table lock long enough to resolve the
//! driver, so a slow link does not stall value routing.

use super::DriverRegistry;
use crate::linking::{
    domain::{
        AttributeRef, AttributeValueEvent, ConnectionStatus, ConnectionStatusChange,
        LinkedAttribute, ProtocolConfiguration, VALUE_TIMESTAMP_FIELD,
    },
    ports::{ConnectionStatusSink, Driver, DriverError, DriverResult, StatusReporter},
};
use mockable::Clock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

/// Default capacity of the status broadcast channel.
const DEFAULT_STATUS_CHANNEL_CAPACITY: usize = 256;

/// Result type for link index operations.
pub type LinkIndexResult<T> = Result<T, LinkIndexError>;

/// Errors returned by link index operations.
#[derive(Debug, Clone, Error)]
pub enum LinkIndexError {
    /// The configuration names a driver that is not registered.
    #[error("no driver '{driver}' registered for protocol configuration {protocol_ref}")]
    DriverNotFound {
        /// Protocol configuration reference.
        protocol_ref: AttributeRef,
        /// Raw driver value of the configuration.
        driver: String,
    },

    /// The protocol configuration has no link record.
    #[error("protocol configuration {0} is not linked")]
    ConfigurationNotLinked(AttributeRef),

    /// The driver failed during a link, unlink or write call.
    #[error("driver '{driver}' failed for protocol configuration {protocol_ref}: {source}")]
    DriverOperation {
        /// Protocol configuration reference.
        protocol_ref: AttributeRef,
        /// Driver name.
        driver: String,
        /// Error returned by the driver.
        #[source]
        source: DriverError,
    },

    /// An attribute was found bound to more than one configuration, or the
    /// ownership map disagrees with the records. Indicates a defect.
    #[error("link invariant violated for attribute {attribute_ref}: {detail}")]
    LinkInvariantViolation {
        /// Offending attribute reference.
        attribute_ref: AttributeRef,
        /// Description of the inconsistency.
        detail: String,
    },
}

/// Tunables for the link index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// Upper bound for a single driver call; `None` waits indefinitely.
    pub driver_call_timeout: Option<Duration>,
    /// Capacity of the status change broadcast channel.
    pub status_channel_capacity: usize,
    /// Top-level attribute fields ignored when comparing linked attributes.
    pub diff_ignored_fields: Vec<String>,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            driver_call_timeout: None,
            status_channel_capacity: DEFAULT_STATUS_CHANNEL_CAPACITY,
            diff_ignored_fields: vec![VALUE_TIMESTAMP_FIELD.to_owned()],
        }
    }
}

/// Result of a configuration link request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A new record was created and the driver accepted the configuration.
    Linked,
    /// An identical configuration is already linked; nothing was done.
    Unchanged,
}

/// Result of a configuration unlink request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlinkOutcome {
    /// The record was removed.
    Unlinked,
    /// No record exists for the reference.
    NotLinked,
    /// The linked configuration differs from the one asked to be unlinked.
    Superseded,
}

struct LinkRecord {
    configuration: ProtocolConfiguration,
    driver: Arc<dyn Driver>,
    status: ConnectionStatus,
    generation: u64,
    attributes: HashMap<AttributeRef, LinkedAttribute>,
}

#[derive(Default)]
struct LinkTable {
    records: HashMap<AttributeRef, LinkRecord>,
    // attribute -> owning protocol configuration
    linked: HashMap<AttributeRef, AttributeRef>,
    next_generation: u64,
}

struct LinkState {
    table: Mutex<LinkTable>,
    status_tx: broadcast::Sender<ConnectionStatusChange>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl LinkState {
    fn table(&self) -> MutexGuard<'_, LinkTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply_status(
        &self,
        protocol_ref: &AttributeRef,
        status: ConnectionStatus,
        generation: Option<u64>,
    ) -> bool {
        let mut table = self.table();
        let Some(record) = table.records.get_mut(protocol_ref) else {
            return false;
        };
        if generation.is_some_and(|expected| expected != record.generation) {
            return false;
        }
        record.status = status;
        self.publish(protocol_ref, status);
        true
    }

    fn publish(&self, protocol_ref: &AttributeRef, status: ConnectionStatus) {
        tracing::debug!(protocol_ref = %protocol_ref, status = %status, "connection status updated");
        let change = ConnectionStatusChange::new(protocol_ref.clone(), status, self.clock.utc());
        if self.status_tx.send(change).is_err() {
            tracing::trace!("no connection status subscribers");
        }
    }
}

struct RecordStatusSink {
    state: Weak<LinkState>,
    protocol_ref: AttributeRef,
    generation: u64,
}

impl ConnectionStatusSink for RecordStatusSink {
    fn report(&self, status: ConnectionStatus) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        if !state.apply_status(&self.protocol_ref, status, Some(self.generation)) {
            tracing::debug!(
                protocol_ref = %self.protocol_ref,
                status = %status,
                "discarded status report for a configuration that is no longer linked"
            );
        }
    }
}

/// Link records, connection status and attribute bindings.
pub struct LinkIndex {
    registry: Arc<DriverRegistry>,
    state: Arc<LinkState>,
    operations: tokio::sync::Mutex<()>,
    settings: LinkSettings,
}

impl LinkIndex {
    /// Creates an empty index over the given driver registry.
    #[must_use]
    pub fn new(
        registry: Arc<DriverRegistry>,
        clock: Arc<dyn Clock + Send + Sync>,
        settings: LinkSettings,
    ) -> Self {
        let (status_tx, _) = broadcast::channel(settings.status_channel_capacity.max(1));
        Self {
            registry,
            state: Arc::new(LinkState {
                table: Mutex::new(LinkTable::default()),
                status_tx,
                clock,
            }),
            operations: tokio::sync::Mutex::new(()),
            settings,
        }
    }

    /// Returns the index settings.
    #[must_use]
    pub const fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Subscribes to connection status changes.
    #[must_use]
    pub fn subscribe_status(&self) -> broadcast::Receiver<ConnectionStatusChange> {
        self.state.status_tx.subscribe()
    }

    /// Returns the status of a linked configuration.
    #[must_use]
    pub fn connection_status(&self, protocol_ref: &AttributeRef) -> Option<ConnectionStatus> {
        self.state
            .table()
            .records
            .get(protocol_ref)
            .map(|record| record.status)
    }

    /// Stores and republishes a status for a linked configuration.
    ///
    /// Returns `false` when the configuration is not linked.
    #[must_use]
    pub fn set_status(&self, protocol_ref: &AttributeRef, status: ConnectionStatus) -> bool {
        self.state.apply_status(protocol_ref, status, None)
    }

    /// Returns the linked configuration with the given reference.
    #[must_use]
    pub fn protocol_configuration(
        &self,
        protocol_ref: &AttributeRef,
    ) -> Option<ProtocolConfiguration> {
        self.state
            .table()
            .records
            .get(protocol_ref)
            .map(|record| record.configuration.clone())
    }

    /// Returns the configuration an attribute is currently bound to.
    #[must_use]
    pub fn linked_configuration(
        &self,
        attribute_ref: &AttributeRef,
    ) -> Option<ProtocolConfiguration> {
        let table = self.state.table();
        table
            .linked
            .get(attribute_ref)
            .and_then(|owner| table.records.get(owner))
            .map(|record| record.configuration.clone())
    }

    /// Returns whether an attribute is bound to any configuration.
    #[must_use]
    pub fn is_linked(&self, attribute_ref: &AttributeRef) -> bool {
        self.state.table().linked.contains_key(attribute_ref)
    }

    /// Returns the attributes bound to a configuration, sorted.
    #[must_use]
    pub fn linked_attributes(&self, protocol_ref: &AttributeRef) -> Vec<AttributeRef> {
        let mut references: Vec<AttributeRef> = self
            .state
            .table()
            .records
            .get(protocol_ref)
            .map(|record| record.attributes.keys().cloned().collect())
            .unwrap_or_default();
        references.sort();
        references
    }

    /// Returns every linked configuration, sorted by reference.
    #[must_use]
    pub fn active_configurations(&self) -> Vec<ProtocolConfiguration> {
        let mut configurations: Vec<ProtocolConfiguration> = self
            .state
            .table()
            .records
            .values()
            .map(|record| record.configuration.clone())
            .collect();
        configurations.sort_by(|left, right| left.reference().cmp(right.reference()));
        configurations
    }

    /// Checks that every attribute is bound to at most one configuration and
    /// that the ownership map agrees with the records.
    ///
    /// # Errors
    ///
    /// Returns [`LinkIndexError::LinkInvariantViolation`] describing the first
    /// inconsistency found.
    pub fn verify_invariants(&self) -> LinkIndexResult<()> {
        let table = self.state.table();
        let mut owners: HashMap<&AttributeRef, &AttributeRef> = HashMap::new();

        for (protocol_ref, record) in &table.records {
            for attribute_ref in record.attributes.keys() {
                if let Some(first) = owners.insert(attribute_ref, protocol_ref) {
                    return Err(violation(
                        attribute_ref,
                        format!("bound to both {first} and {protocol_ref}"),
                    ));
                }
                if table.linked.get(attribute_ref) != Some(protocol_ref) {
                    return Err(violation(
                        attribute_ref,
                        format!("record {protocol_ref} is not the recorded owner"),
                    ));
                }
            }
        }

        if let Some(orphan) = table
            .linked
            .keys()
            .find(|attribute_ref| !owners.contains_key(attribute_ref))
        {
            return Err(violation(orphan, "owner has no matching record".to_owned()));
        }

        Ok(())
    }

    /// Links a protocol configuration to its driver.
    ///
    /// The record is created in `Connecting` state before the driver is
    /// called. Linking content that is already linked is a no-op; linking a
    /// changed configuration under an existing reference unlinks the old one
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`LinkIndexError::DriverNotFound`] without creating a record
    /// when the driver is not registered, or
    /// [`LinkIndexError::DriverOperation`] when the driver fails; the record
    /// then stays present with status `Error`.
    pub async fn link_configuration(
        &self,
        configuration: &ProtocolConfiguration,
    ) -> LinkIndexResult<LinkOutcome> {
        let _operation = self.operations.lock().await;
        self.link_configuration_locked(configuration).await
    }

    /// Unlinks whatever configuration is linked under `protocol_ref`.
    ///
    /// Bound attributes are unlinked first, then the driver is told to drop
    /// the configuration. Driver failures are logged and never stop the local
    /// unlink.
    pub async fn unlink_configuration(&self, protocol_ref: &AttributeRef) -> UnlinkOutcome {
        let _operation = self.operations.lock().await;
        self.unlink_configuration_locked(protocol_ref, None).await
    }

    /// Unlinks `configuration` only if it is the one currently linked.
    ///
    /// Reconciliation uses this so that replaying an old change event never
    /// tears down a newer configuration.
    pub async fn unlink_configuration_matching(
        &self,
        configuration: &ProtocolConfiguration,
    ) -> UnlinkOutcome {
        let _operation = self.operations.lock().await;
        self.unlink_configuration_locked(configuration.reference(), Some(configuration))
            .await
    }

    /// Binds attributes to a linked configuration and hands them to its
    /// driver.
    ///
    /// Attributes already bound (to this or any other configuration) are
    /// skipped. Returns the references actually linked.
    ///
    /// # Errors
    ///
    /// Returns [`LinkIndexError::ConfigurationNotLinked`] when no record
    /// exists, or [`LinkIndexError::DriverOperation`] when the driver fails;
    /// the bindings are kept and the status becomes `Error`.
    pub async fn link_attributes(
        &self,
        protocol_ref: &AttributeRef,
        attributes: Vec<LinkedAttribute>,
    ) -> LinkIndexResult<Vec<AttributeRef>> {
        let _operation = self.operations.lock().await;
        self.link_attributes_locked(protocol_ref, attributes).await
    }

    /// Releases attributes from a linked configuration and tells its driver.
    ///
    /// Only attributes bound to this configuration whose bound content still
    /// matches (ignoring the configured fields) are released. Returns the
    /// references actually unlinked.
    ///
    /// # Errors
    ///
    /// Returns [`LinkIndexError::ConfigurationNotLinked`] when no record
    /// exists, or [`LinkIndexError::DriverOperation`] when the driver fails;
    /// the bindings are still released and the status becomes `Error`.
    pub async fn unlink_attributes(
        &self,
        protocol_ref: &AttributeRef,
        attributes: Vec<LinkedAttribute>,
    ) -> LinkIndexResult<Vec<AttributeRef>> {
        let _operation = self.operations.lock().await;
        self.unlink_attributes_locked(protocol_ref, attributes, true)
            .await
    }

    /// Forwards an actuator write to the driver serving `protocol_ref`.
    ///
    /// Does not take the operation lock.
    ///
    /// # Errors
    ///
    /// Returns [`LinkIndexError::ConfigurationNotLinked`] when no record
    /// exists, or [`LinkIndexError::DriverOperation`] when the driver fails.
    pub async fn write_value(
        &self,
        event: &AttributeValueEvent,
        protocol_ref: &AttributeRef,
    ) -> LinkIndexResult<()> {
        let (driver, configuration) = {
            let table = self.state.table();
            let record = table
                .records
                .get(protocol_ref)
                .ok_or_else(|| LinkIndexError::ConfigurationNotLinked(protocol_ref.clone()))?;
            (Arc::clone(&record.driver), record.configuration.clone())
        };

        tracing::debug!(
            attribute_ref = %event.attribute_ref(),
            protocol_ref = %protocol_ref,
            driver = driver.name(),
            "sending value to actuator"
        );
        self.call_driver(driver.write_value(event, &configuration))
            .await
            .map_err(|source| {
                tracing::error!(
                    attribute_ref = %event.attribute_ref(),
                    driver = driver.name(),
                    error = %source,
                    "driver failed to write actuator value"
                );
                LinkIndexError::DriverOperation {
                    protocol_ref: protocol_ref.clone(),
                    driver: driver.name().to_owned(),
                    source,
                }
            })
    }

    async fn link_configuration_locked(
        &self,
        configuration: &ProtocolConfiguration,
    ) -> LinkIndexResult<LinkOutcome> {
        let protocol_ref = configuration.reference();
        let driver = self.resolve_driver(configuration)?;

        let current = self
            .state
            .table()
            .records
            .get(protocol_ref)
            .map(|record| record.configuration.clone());
        if let Some(linked) = current {
            if linked.same_content(configuration) {
                return Ok(LinkOutcome::Unchanged);
            }
            tracing::info!(protocol_ref = %protocol_ref, "replacing changed protocol configuration");
            self.unlink_configuration_locked(protocol_ref, None).await;
        }

        let generation = {
            let mut table = self.state.table();
            table.next_generation += 1;
            let next = table.next_generation;
            table.records.insert(
                protocol_ref.clone(),
                LinkRecord {
                    configuration: configuration.clone(),
                    driver: Arc::clone(&driver),
                    status: ConnectionStatus::Connecting,
                    generation: next,
                    attributes: HashMap::new(),
                },
            );
            self.state.publish(protocol_ref, ConnectionStatus::Connecting);
            next
        };

        let reporter: StatusReporter = Arc::new(RecordStatusSink {
            state: Arc::downgrade(&self.state),
            protocol_ref: protocol_ref.clone(),
            generation,
        });

        tracing::debug!(protocol_ref = %protocol_ref, driver = driver.name(), "linking protocol configuration");
        match self
            .call_driver(driver.link_configuration(configuration, reporter))
            .await
        {
            Ok(()) => Ok(LinkOutcome::Linked),
            Err(source) => {
                tracing::error!(
                    protocol_ref = %protocol_ref,
                    driver = driver.name(),
                    error = %source,
                    "driver failed to link protocol configuration"
                );
                self.state
                    .apply_status(protocol_ref, ConnectionStatus::Error, Some(generation));
                Err(LinkIndexError::DriverOperation {
                    protocol_ref: protocol_ref.clone(),
                    driver: driver.name().to_owned(),
                    source,
                })
            }
        }
    }

    async fn unlink_configuration_locked(
        &self,
        protocol_ref: &AttributeRef,
        expected: Option<&ProtocolConfiguration>,
    ) -> UnlinkOutcome {
        let snapshot = self.state.table().records.get(protocol_ref).map(|record| {
            (
                record.configuration.clone(),
                Arc::clone(&record.driver),
                record.attributes.values().cloned().collect::<Vec<_>>(),
            )
        });
        let Some((configuration, driver, attributes)) = snapshot else {
            return UnlinkOutcome::NotLinked;
        };
        if let Some(wanted) = expected
            && !configuration.same_content(wanted)
        {
            tracing::debug!(protocol_ref = %protocol_ref, "skipping unlink of superseded protocol configuration");
            return UnlinkOutcome::Superseded;
        }

        if !attributes.is_empty() {
            // Failures are logged by the attribute unlink itself.
            let _released = self
                .unlink_attributes_locked(protocol_ref, attributes, false)
                .await;
        }

        tracing::debug!(protocol_ref = %protocol_ref, driver = driver.name(), "unlinking protocol configuration");
        if let Err(source) = self
            .call_driver(driver.unlink_configuration(&configuration))
            .await
        {
            tracing::error!(
                protocol_ref = %protocol_ref,
                driver = driver.name(),
                error = %source,
                "driver failed to unlink protocol configuration"
            );
        }

        let mut table = self.state.table();
        if let Some(record) = table.records.get_mut(protocol_ref) {
            record.status = ConnectionStatus::Disconnected;
        }
        self.state
            .publish(protocol_ref, ConnectionStatus::Disconnected);
        table.records.remove(protocol_ref);
        table.linked.retain(|_, owner| owner != protocol_ref);
        UnlinkOutcome::Unlinked
    }

    async fn link_attributes_locked(
        &self,
        protocol_ref: &AttributeRef,
        attributes: Vec<LinkedAttribute>,
    ) -> LinkIndexResult<Vec<AttributeRef>> {
        let (driver, configuration, generation, added) = {
            let mut table = self.state.table();
            let LinkTable {
                records, linked, ..
            } = &mut *table;
            let record = records
                .get_mut(protocol_ref)
                .ok_or_else(|| LinkIndexError::ConfigurationNotLinked(protocol_ref.clone()))?;

            let mut added = Vec::new();
            for candidate in attributes {
                if let Some(owner) = linked.get(candidate.reference()) {
                    if owner != protocol_ref {
                        tracing::warn!(
                            attribute_ref = %candidate.reference(),
                            linked_to = %owner,
                            requested = %protocol_ref,
                            "attribute is already linked to another protocol configuration"
                        );
                    }
                    continue;
                }
                linked.insert(candidate.reference().clone(), protocol_ref.clone());
                record
                    .attributes
                    .insert(candidate.reference().clone(), candidate.clone());
                added.push(candidate);
            }
            (
                Arc::clone(&record.driver),
                record.configuration.clone(),
                record.generation,
                added,
            )
        };

        if added.is_empty() {
            return Ok(Vec::new());
        }

        let references: Vec<AttributeRef> = added
            .iter()
            .map(|attribute| attribute.reference().clone())
            .collect();
        tracing::debug!(
            protocol_ref = %protocol_ref,
            driver = driver.name(),
            count = added.len(),
            "linking attributes"
        );
        match self
            .call_driver(driver.link_attributes(&added, &configuration))
            .await
        {
            Ok(()) => Ok(references),
            Err(source) => {
                tracing::error!(
                    protocol_ref = %protocol_ref,
                    driver = driver.name(),
                    error = %source,
                    "driver failed to link attributes"
                );
                self.state
                    .apply_status(protocol_ref, ConnectionStatus::Error, Some(generation));
                Err(LinkIndexError::DriverOperation {
                    protocol_ref: protocol_ref.clone(),
                    driver: driver.name().to_owned(),
                    source,
                })
            }
        }
    }

    async fn unlink_attributes_locked(
        &self,
        protocol_ref: &AttributeRef,
        attributes: Vec<LinkedAttribute>,
        match_content: bool,
    ) -> LinkIndexResult<Vec<AttributeRef>> {
        let ignored_fields = &self.settings.diff_ignored_fields;
        let (driver, configuration, generation, removed) = {
            let mut table = self.state.table();
            let LinkTable {
                records, linked, ..
            } = &mut *table;
            let record = records
                .get_mut(protocol_ref)
                .ok_or_else(|| LinkIndexError::ConfigurationNotLinked(protocol_ref.clone()))?;

            let mut removed = Vec::new();
            for candidate in attributes {
                let reference = candidate.reference();
                if linked.get(reference) != Some(protocol_ref) {
                    continue;
                }
                let bound_matches = record.attributes.get(reference).is_some_and(|bound| {
                    !match_content
                        || bound
                            .attribute()
                            .content_eq_ignoring(candidate.attribute(), ignored_fields)
                });
                if !bound_matches {
                    continue;
                }
                linked.remove(reference);
                if let Some(bound) = record.attributes.remove(reference) {
                    removed.push(bound);
                }
            }
            (
                Arc::clone(&record.driver),
                record.configuration.clone(),
                record.generation,
                removed,
            )
        };

        if removed.is_empty() {
            return Ok(Vec::new());
        }

        let references: Vec<AttributeRef> = removed
            .iter()
            .map(|attribute| attribute.reference().clone())
            .collect();
        tracing::debug!(
            protocol_ref = %protocol_ref,
            driver = driver.name(),
            count = removed.len(),
            "unlinking attributes"
        );
        match self
            .call_driver(driver.unlink_attributes(&removed, &configuration))
            .await
        {
            Ok(()) => Ok(references),
            Err(source) => {
                tracing::error!(
                    protocol_ref = %protocol_ref,
                    driver = driver.name(),
                    error = %source,
                    "driver failed to unlink attributes"
                );
                self.state
                    .apply_status(protocol_ref, ConnectionStatus::Error, Some(generation));
                Err(LinkIndexError::DriverOperation {
                    protocol_ref: protocol_ref.clone(),
                    driver: driver.name().to_owned(),
                    source,
                })
            }
        }
    }

    fn resolve_driver(
        &self,
        configuration: &ProtocolConfiguration,
    ) -> LinkIndexResult<Arc<dyn Driver>> {
        configuration
            .driver_name()
            .ok()
            .and_then(|name| self.registry.lookup(&name))
            .ok_or_else(|| LinkIndexError::DriverNotFound {
                protocol_ref: configuration.reference().clone(),
                driver: configuration.driver_value().to_owned(),
            })
    }

    async fn call_driver(
        &self,
        call: impl Future<Output = DriverResult<()>>,
    ) -> DriverResult<()> {
        let Some(limit) = self.settings.driver_call_timeout else {
            return call.await;
        };
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(DriverError::TimedOut(limit)))
    }
}

fn violation(attribute_ref: &AttributeRef, detail: String) -> LinkIndexError {
    tracing::error!(attribute_ref = %attribute_ref, detail = %detail, "link invariant violated");
    LinkIndexError::LinkInvariantViolation {
        attribute_ref: attribute_ref.clone(),
        detail,
    }
}
