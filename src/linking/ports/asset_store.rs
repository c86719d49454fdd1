//! Asset store port.

use crate::linking::domain::{Asset, AssetId, AssetType, AttributeRef, OwnerId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for asset store operations.
pub type AssetStoreResult<T> = Result<T, AssetStoreError>;

/// Query predicates used by the linking engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetQuery {
    /// All assets of the given type.
    ByType(AssetType),
    /// All assets with at least one attribute whose agent link points at the
    /// given protocol configuration.
    ByAgentLink(AttributeRef),
}

impl AssetQuery {
    /// Returns whether `asset` satisfies the query.
    #[must_use]
    pub fn matches(&self, asset: &Asset) -> bool {
        match self {
            Self::ByType(asset_type) => asset.asset_type() == asset_type,
            Self::ByAgentLink(protocol_ref) => asset
                .attributes()
                .iter()
                .any(|attribute| attribute.agent_link() == Some(protocol_ref)),
        }
    }
}

/// Persistence contract for the asset graph.
///
/// Committed changes are expected to be announced to the linking engine as
/// [`crate::linking::domain::AssetChangeEvent`]s by whoever owns the store.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Finds an asset by identifier.
    ///
    /// Returns `None` when the asset does not exist.
    async fn find(&self, id: &AssetId) -> AssetStoreResult<Option<Asset>>;

    /// Returns all assets matching the query.
    async fn find_all(&self, query: &AssetQuery) -> AssetStoreResult<Vec<Asset>>;

    /// Inserts or replaces an asset, keeping the caller-supplied identifier.
    async fn merge(&self, asset: Asset, owner: Option<&OwnerId>) -> AssetStoreResult<Asset>;

    /// Deletes an asset.
    ///
    /// Returns `false` when the asset did not exist.
    async fn delete(&self, id: &AssetId) -> AssetStoreResult<bool>;
}

/// Errors returned by asset store implementations.
#[derive(Debug, Clone, Error)]
pub enum AssetStoreError {
    /// The asset was expected to exist.
    #[error("asset not found: {0}")]
    NotFound(AssetId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl AssetStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
