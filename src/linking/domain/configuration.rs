//! Protocol configuration value type.

use super::{AssetId, Attribute, AttributeRef, DriverName, LinkDomainError};
use serde::{Deserialize, Serialize};

/// A protocol configuration: an agent attribute whose value names a driver.
///
/// Two configurations are the same only when their attribute content is
/// equal; a configuration whose value changed is a different configuration
/// even though its reference is unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfiguration {
    reference: AttributeRef,
    attribute: Attribute,
}

impl ProtocolConfiguration {
    /// Builds a configuration from an agent attribute.
    ///
    /// Returns `Ok(None)` when the attribute is not a protocol configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LinkDomainError::EmptyAttributeName`] when the attribute
    /// reference cannot be formed.
    pub fn from_attribute(
        agent_id: &AssetId,
        attribute: &Attribute,
    ) -> Result<Option<Self>, LinkDomainError> {
        if !attribute.is_protocol_configuration() {
            return Ok(None);
        }
        Ok(Some(Self {
            reference: attribute.reference(agent_id)?,
            attribute: attribute.clone(),
        }))
    }

    /// Returns the reference of the configuration attribute.
    #[must_use]
    pub const fn reference(&self) -> &AttributeRef {
        &self.reference
    }

    /// Returns the configuration attribute.
    #[must_use]
    pub const fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    /// Returns the driver name held in the configuration value.
    ///
    /// # Errors
    ///
    /// Returns [`LinkDomainError::MissingDriverValue`] when the value is not a
    /// string, or a driver name validation error when the string is not a
    /// valid URN.
    pub fn driver_name(&self) -> Result<DriverName, LinkDomainError> {
        let raw = self
            .attribute
            .value_as_str()
            .ok_or_else(|| LinkDomainError::MissingDriverValue(self.reference.to_string()))?;
        DriverName::new(raw)
    }

    /// Returns the raw driver value for diagnostics.
    #[must_use]
    pub fn driver_value(&self) -> &str {
        self.attribute.value_as_str().unwrap_or_default()
    }

    /// Returns whether both configurations have identical content.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.reference == other.reference && self.attribute.content() == other.attribute.content()
    }
}
