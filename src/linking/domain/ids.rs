//! Identifier types for assets, attributes and owners.

use super::LinkDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a persisted asset.
///
/// Drivers manage their own identifier space, so any non-empty string is
/// accepted. [`AssetId::generate`] produces a fresh random identifier for
/// callers that do not have one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Creates an asset identifier from an existing value.
    ///
    /// # Errors
    ///
    /// Returns [`LinkDomainError::EmptyAssetId`] when the value is empty
    /// after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, LinkDomainError> {
        let normalized = value.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(LinkDomainError::EmptyAssetId);
        }
        Ok(Self(normalized))
    }

    /// Creates a new random asset identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for AssetId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Identifier of the user on whose behalf a driver merges an asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Creates an owner identifier.
    ///
    /// # Errors
    ///
    /// Returns [`LinkDomainError::EmptyOwnerId`] when the value is empty
    /// after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, LinkDomainError> {
        let normalized = value.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(LinkDomainError::EmptyOwnerId);
        }
        Ok(Self(normalized))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Reference to a single attribute of an asset.
///
/// Protocol configurations and agent links are both expressed as attribute
/// references: the former names the configuration attribute on its agent,
/// the latter points from a linked attribute to that configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeRef {
    asset_id: AssetId,
    attribute_name: String,
}

impl AttributeRef {
    /// Creates an attribute reference.
    ///
    /// # Errors
    ///
    /// Returns [`LinkDomainError::EmptyAttributeName`] when the attribute
    /// name is empty after trimming.
    pub fn new(
        asset_id: AssetId,
        attribute_name: impl Into<String>,
    ) -> Result<Self, LinkDomainError> {
        let name = attribute_name.into().trim().to_owned();
        if name.is_empty() {
            return Err(LinkDomainError::EmptyAttributeName);
        }
        Ok(Self {
            asset_id,
            attribute_name: name,
        })
    }

    /// Returns the owning asset identifier.
    #[must_use]
    pub const fn asset_id(&self) -> &AssetId {
        &self.asset_id
    }

    /// Returns the attribute name.
    #[must_use]
    pub fn attribute_name(&self) -> &str {
        &self.attribute_name
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.asset_id, self.attribute_name)
    }
}
