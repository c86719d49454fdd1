//! Asset aggregate and asset type.

use super::{
    AssetId, Attribute, LinkDomainError, LinkedAttribute, OwnerId, ProtocolConfiguration,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Asset type identifier.
///
/// Only the agent type matters to the linking engine; every other type is
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetType(String);

/// Canonical type string of agent assets.
const AGENT_TYPE: &str = "urn:agentlink:asset:agent";

impl AssetType {
    /// Creates an asset type.
    ///
    /// # Errors
    ///
    /// Returns [`LinkDomainError::EmptyAssetType`] when the value is empty
    /// after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, LinkDomainError> {
        let normalized = value.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(LinkDomainError::EmptyAssetType);
        }
        Ok(Self(normalized))
    }

    /// Returns the agent asset type.
    #[must_use]
    pub fn agent() -> Self {
        Self(AGENT_TYPE.to_owned())
    }

    /// Returns whether this is the agent type.
    #[must_use]
    pub fn is_agent(&self) -> bool {
        self.0 == AGENT_TYPE
    }

    /// Returns the type as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// A persisted entity in the asset graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    id: AssetId,
    name: String,
    asset_type: AssetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<AssetId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner_id: Option<OwnerId>,
    #[serde(default)]
    attributes: Vec<Attribute>,
}

impl Asset {
    /// Creates an asset without parent or attributes.
    #[must_use]
    pub fn new(id: AssetId, name: impl Into<String>, asset_type: AssetType) -> Self {
        Self {
            id,
            name: name.into(),
            asset_type,
            parent_id: None,
            owner_id: None,
            attributes: Vec::new(),
        }
    }

    /// Creates an agent asset.
    #[must_use]
    pub fn agent(id: AssetId, name: impl Into<String>) -> Self {
        Self::new(id, name, AssetType::agent())
    }

    /// Sets the parent asset.
    #[must_use]
    pub fn with_parent(mut self, parent_id: AssetId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Adds or replaces an attribute by name.
    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.replace_attribute(attribute);
        self
    }

    /// Adds or replaces an attribute by name.
    pub fn replace_attribute(&mut self, attribute: Attribute) {
        if let Some(existing) = self
            .attributes
            .iter_mut()
            .find(|existing| existing.name() == attribute.name())
        {
            *existing = attribute;
        } else {
            self.attributes.push(attribute);
        }
    }

    /// Records the owner the asset was merged on behalf of.
    pub fn set_owner(&mut self, owner_id: OwnerId) {
        self.owner_id = Some(owner_id);
    }

    /// Returns the asset identifier.
    #[must_use]
    pub const fn id(&self) -> &AssetId {
        &self.id
    }

    /// Returns the asset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the asset type.
    #[must_use]
    pub const fn asset_type(&self) -> &AssetType {
        &self.asset_type
    }

    /// Returns whether the asset is an agent.
    #[must_use]
    pub fn is_agent(&self) -> bool {
        self.asset_type.is_agent()
    }

    /// Returns the parent identifier.
    #[must_use]
    pub const fn parent_id(&self) -> Option<&AssetId> {
        self.parent_id.as_ref()
    }

    /// Returns the owner identifier.
    #[must_use]
    pub const fn owner_id(&self) -> Option<&OwnerId> {
        self.owner_id.as_ref()
    }

    /// Returns all attributes.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Returns the attribute with the given name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name() == name)
    }

    /// Returns a mutable reference to the attribute with the given name.
    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attributes
            .iter_mut()
            .find(|attribute| attribute.name() == name)
    }

    /// Returns the protocol configurations declared by this asset.
    #[must_use]
    pub fn protocol_configurations(&self) -> Vec<ProtocolConfiguration> {
        protocol_configurations(&self.id, &self.attributes)
    }

    /// Returns the attributes of this asset that carry an agent link.
    #[must_use]
    pub fn agent_linked_attributes(&self) -> Vec<LinkedAttribute> {
        agent_linked_attributes(&self.id, &self.attributes)
    }
}

/// Extracts protocol configurations from an attribute set of `agent_id`.
#[must_use]
pub(crate) fn protocol_configurations(
    agent_id: &AssetId,
    attributes: &[Attribute],
) -> Vec<ProtocolConfiguration> {
    attributes
        .iter()
        .filter_map(|attribute| {
            ProtocolConfiguration::from_attribute(agent_id, attribute)
                .ok()
                .flatten()
        })
        .collect()
}

/// Extracts agent-linked attributes from an attribute set of `asset_id`.
#[must_use]
pub(crate) fn agent_linked_attributes(
    asset_id: &AssetId,
    attributes: &[Attribute],
) -> Vec<LinkedAttribute> {
    attributes
        .iter()
        .filter(|attribute| attribute.agent_link().is_some())
        .filter_map(|attribute| LinkedAttribute::new(asset_id, attribute.clone()).ok())
        .collect()
}
