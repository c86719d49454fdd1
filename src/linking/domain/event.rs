//! Persistence-change and attribute-value events.

use super::{Asset, Attribute, AttributeRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of committed persistence change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceCause {
    /// The entity was created.
    Insert,
    /// The entity was modified.
    Update,
    /// The entity was removed.
    Delete,
}

impl fmt::Display for PersistenceCause {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Notification that an asset (or agent) was committed to the store.
///
/// Updates carry the attribute sets before and after the change. When both
/// are absent the update did not touch attributes and is ignored by
/// reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetChangeEvent {
    cause: PersistenceCause,
    asset: Asset,
    previous_attributes: Option<Vec<Attribute>>,
    current_attributes: Option<Vec<Attribute>>,
}

impl AssetChangeEvent {
    /// Creates an insert notification.
    #[must_use]
    pub const fn insert(asset: Asset) -> Self {
        Self {
            cause: PersistenceCause::Insert,
            asset,
            previous_attributes: None,
            current_attributes: None,
        }
    }

    /// Creates an update notification with the attribute sets before and
    /// after the change.
    #[must_use]
    pub const fn update(asset: Asset, previous: Vec<Attribute>, current: Vec<Attribute>) -> Self {
        Self {
            cause: PersistenceCause::Update,
            asset,
            previous_attributes: Some(previous),
            current_attributes: Some(current),
        }
    }

    /// Creates an update notification for a change that left attributes
    /// untouched.
    #[must_use]
    pub const fn update_without_attributes(asset: Asset) -> Self {
        Self {
            cause: PersistenceCause::Update,
            asset,
            previous_attributes: None,
            current_attributes: None,
        }
    }

    /// Creates a delete notification.
    #[must_use]
    pub const fn delete(asset: Asset) -> Self {
        Self {
            cause: PersistenceCause::Delete,
            asset,
            previous_attributes: None,
            current_attributes: None,
        }
    }

    /// Returns the change cause.
    #[must_use]
    pub const fn cause(&self) -> PersistenceCause {
        self.cause
    }

    /// Returns the changed asset in its committed state.
    #[must_use]
    pub const fn asset(&self) -> &Asset {
        &self.asset
    }

    /// Returns the attribute set before an update.
    #[must_use]
    pub fn previous_attributes(&self) -> Option<&[Attribute]> {
        self.previous_attributes.as_deref()
    }

    /// Returns the attribute set after an update.
    #[must_use]
    pub fn current_attributes(&self) -> Option<&[Attribute]> {
        self.current_attributes.as_deref()
    }
}

/// Origin of an attribute value event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// Written by a driver reporting a sensor reading.
    Sensor,
    /// Written by a client.
    Client,
    /// Written by the rules engine.
    Rules,
}

/// A value change for one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValueEvent {
    attribute_ref: AttributeRef,
    value: Value,
    timestamp: DateTime<Utc>,
    source: EventSource,
}

impl AttributeValueEvent {
    /// Creates a client-authored value event.
    #[must_use]
    pub const fn new(attribute_ref: AttributeRef, value: Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            attribute_ref,
            value,
            timestamp,
            source: EventSource::Client,
        }
    }

    /// Sets the event origin.
    #[must_use]
    pub const fn with_source(mut self, source: EventSource) -> Self {
        self.source = source;
        self
    }

    /// Returns the target attribute.
    #[must_use]
    pub const fn attribute_ref(&self) -> &AttributeRef {
        &self.attribute_ref
    }

    /// Returns the new value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the event timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the event origin.
    #[must_use]
    pub const fn source(&self) -> EventSource {
        self.source
    }

    /// Returns whether a driver authored this event.
    #[must_use]
    pub const fn is_sensor(&self) -> bool {
        matches!(self.source, EventSource::Sensor)
    }
}

/// Outcome of routing an attribute value event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Not yet routed.
    Pending,
    /// Handed to the generic asset-update pipeline.
    Forwarded,
    /// Consumed by the linking engine (sent to a driver as an actuator write).
    Completed,
    /// Rejected; see [`AttributeState::error`].
    Error,
}

/// An attribute value event moving through the router.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeState {
    event: AttributeValueEvent,
    status: ProcessingStatus,
    error: Option<String>,
}

impl AttributeState {
    /// Wraps an event in the `Pending` state.
    #[must_use]
    pub const fn new(event: AttributeValueEvent) -> Self {
        Self {
            event,
            status: ProcessingStatus::Pending,
            error: None,
        }
    }

    /// Marks the event as handed to the asset pipeline.
    pub const fn forward(&mut self) {
        self.status = ProcessingStatus::Forwarded;
    }

    /// Marks the event as consumed by the linking engine.
    pub const fn complete(&mut self) {
        self.status = ProcessingStatus::Completed;
    }

    /// Marks the event as failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = ProcessingStatus::Error;
        self.error = Some(error.into());
    }

    /// Returns the event.
    #[must_use]
    pub const fn event(&self) -> &AttributeValueEvent {
        &self.event
    }

    /// Returns the processing status.
    #[must_use]
    pub const fn status(&self) -> ProcessingStatus {
        self.status
    }

    /// Returns the failure description, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
