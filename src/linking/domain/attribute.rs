//! Asset attributes and their linking metadata.

use super::{AssetId, AttributeRef, DriverName, LinkDomainError, content_eq_ignoring};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Serialized name of the attribute value timestamp.
///
/// Timestamp-only changes must not re-link an attribute, so this field is
/// excluded by default when diffing agent-linked attributes.
pub const VALUE_TIMESTAMP_FIELD: &str = "valueTimestamp";

/// Linking metadata carried by an attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeMeta {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    protocol_configuration: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    agent_link: Option<AttributeRef>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl AttributeMeta {
    /// Returns whether the attribute is flagged as a protocol configuration.
    #[must_use]
    pub const fn is_protocol_configuration(&self) -> bool {
        self.protocol_configuration
    }

    /// Returns the protocol configuration this attribute links to.
    #[must_use]
    pub const fn agent_link(&self) -> Option<&AttributeRef> {
        self.agent_link.as_ref()
    }
}

/// A named, typed value slot on an asset.
///
/// An attribute is a protocol configuration when its metadata carries the
/// protocol-configuration flag and its value names a driver; it is linked
/// when its metadata carries an agent link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    meta: AttributeMeta,
}

impl Attribute {
    /// Creates an attribute with no value and no metadata.
    ///
    /// # Errors
    ///
    /// Returns [`LinkDomainError::EmptyAttributeName`] when the name is
    /// empty after trimming.
    pub fn new(name: impl Into<String>) -> Result<Self, LinkDomainError> {
        let normalized = name.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(LinkDomainError::EmptyAttributeName);
        }
        Ok(Self {
            name: normalized,
            value: None,
            value_timestamp: None,
            meta: AttributeMeta::default(),
        })
    }

    /// Creates a protocol configuration attribute naming `driver`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkDomainError::EmptyAttributeName`] when the name is
    /// empty after trimming.
    pub fn protocol_configuration(
        name: impl Into<String>,
        driver: &DriverName,
    ) -> Result<Self, LinkDomainError> {
        let mut attribute = Self::new(name)?.with_value(Value::String(driver.to_string()));
        attribute.meta.protocol_configuration = true;
        Ok(attribute)
    }

    /// Sets the attribute value.
    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Sets the value timestamp.
    #[must_use]
    pub const fn with_value_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.value_timestamp = Some(timestamp);
        self
    }

    /// Links the attribute to a protocol configuration.
    #[must_use]
    pub fn with_agent_link(mut self, protocol_ref: AttributeRef) -> Self {
        self.meta.agent_link = Some(protocol_ref);
        self
    }

    /// Replaces the value and its timestamp.
    pub fn set_value(&mut self, value: Value, timestamp: DateTime<Utc>) {
        self.value = Some(value);
        self.value_timestamp = Some(timestamp);
    }

    /// Returns the attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the attribute value.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Returns the value as a string slice when it is a JSON string.
    #[must_use]
    pub fn value_as_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(Value::as_str)
    }

    /// Returns the value timestamp.
    #[must_use]
    pub const fn value_timestamp(&self) -> Option<DateTime<Utc>> {
        self.value_timestamp
    }

    /// Returns the protocol configuration this attribute links to.
    #[must_use]
    pub const fn agent_link(&self) -> Option<&AttributeRef> {
        self.meta.agent_link()
    }

    /// Returns whether this attribute is a protocol configuration.
    #[must_use]
    pub fn is_protocol_configuration(&self) -> bool {
        self.meta.is_protocol_configuration() && self.value_as_str().is_some()
    }

    /// Returns the attribute reference within the given asset.
    ///
    /// # Errors
    ///
    /// Returns [`LinkDomainError::EmptyAttributeName`] when the name is
    /// empty, which cannot happen for attributes built through [`Self::new`].
    pub fn reference(&self, asset_id: &AssetId) -> Result<AttributeRef, LinkDomainError> {
        AttributeRef::new(asset_id.clone(), self.name.clone())
    }

    /// Returns the serialized content used for deep comparisons.
    #[must_use]
    pub fn content(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Compares serialized content, skipping the named top-level fields.
    #[must_use]
    pub fn content_eq_ignoring(&self, other: &Self, ignored_fields: &[String]) -> bool {
        content_eq_ignoring(&self.content(), &other.content(), ignored_fields)
    }
}

/// An attribute together with its reference, as handed to drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedAttribute {
    reference: AttributeRef,
    attribute: Attribute,
}

impl LinkedAttribute {
    /// Pairs an attribute with the asset that owns it.
    ///
    /// # Errors
    ///
    /// Returns [`LinkDomainError::EmptyAttributeName`] when the attribute
    /// reference cannot be formed.
    pub fn new(asset_id: &AssetId, attribute: Attribute) -> Result<Self, LinkDomainError> {
        let reference = attribute.reference(asset_id)?;
        Ok(Self {
            reference,
            attribute,
        })
    }

    /// Returns the attribute reference.
    #[must_use]
    pub const fn reference(&self) -> &AttributeRef {
        &self.reference
    }

    /// Returns the attribute.
    #[must_use]
    pub const fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    /// Returns the protocol configuration the attribute links to.
    #[must_use]
    pub const fn agent_link(&self) -> Option<&AttributeRef> {
        self.attribute.agent_link()
    }
}
