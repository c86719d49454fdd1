//! In-memory asset store.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

use crate::linking::{
    domain::{Asset, AssetChangeEvent, AssetId, AttributeValueEvent, OwnerId},
    ports::{AssetQuery, AssetStore, AssetStoreError, AssetStoreResult},
};

/// Thread-safe in-memory asset store.
///
/// When a change feed is attached, every committed merge or delete is
/// announced as an [`AssetChangeEvent`], the way a database-backed store
/// would publish its persistence events.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssetStore {
    state: Arc<RwLock<BTreeMap<AssetId, Asset>>>,
    changes: Option<mpsc::UnboundedSender<AssetChangeEvent>>,
}

impl InMemoryAssetStore {
    /// Creates an empty store without a change feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that announces changes on the returned
    /// receiver.
    #[must_use]
    pub fn with_change_feed() -> (Self, mpsc::UnboundedReceiver<AssetChangeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Self {
            state: Arc::default(),
            changes: Some(tx),
        };
        (store, rx)
    }

    /// Stores assets directly, without announcing them.
    ///
    /// # Errors
    ///
    /// Returns [`AssetStoreError::Persistence`] when the store lock is
    /// poisoned.
    pub fn seed(&self, assets: impl IntoIterator<Item = Asset>) -> AssetStoreResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        for asset in assets {
            state.insert(asset.id().clone(), asset);
        }
        Ok(())
    }

    /// Records a value event on the stored attribute.
    ///
    /// Value writes are not structural changes, so nothing is announced on
    /// the change feed. Returns `false` when the asset has no attribute of
    /// that name.
    ///
    /// # Errors
    ///
    /// Returns [`AssetStoreError::NotFound`] when the asset does not exist,
    /// or [`AssetStoreError::Persistence`] when the store lock is poisoned.
    pub fn apply_value(&self, event: &AttributeValueEvent) -> AssetStoreResult<bool> {
        let target = event.attribute_ref();
        let mut state = self.state.write().map_err(lock_error)?;
        let asset = state
            .get_mut(target.asset_id())
            .ok_or_else(|| AssetStoreError::NotFound(target.asset_id().clone()))?;
        let Some(attribute) = asset.attribute_mut(target.attribute_name()) else {
            return Ok(false);
        };
        attribute.set_value(event.value().clone(), event.timestamp());
        Ok(true)
    }

    fn announce(&self, event: AssetChangeEvent) {
        if let Some(changes) = &self.changes
            && changes.send(event).is_err()
        {
            tracing::debug!("asset change feed receiver dropped");
        }
    }
}

fn lock_error(err: impl std::fmt::Display) -> AssetStoreError {
    AssetStoreError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl AssetStore for InMemoryAssetStore {
    async fn find(&self, id: &AssetId) -> AssetStoreResult<Option<Asset>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.get(id).cloned())
    }

    async fn find_all(&self, query: &AssetQuery) -> AssetStoreResult<Vec<Asset>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .values()
            .filter(|asset| query.matches(asset))
            .cloned()
            .collect())
    }

    async fn merge(&self, mut asset: Asset, owner: Option<&OwnerId>) -> AssetStoreResult<Asset> {
        if let Some(owner_id) = owner {
            asset.set_owner(owner_id.clone());
        }
        let previous = {
            let mut state = self.state.write().map_err(lock_error)?;
            state.insert(asset.id().clone(), asset.clone())
        };

        let event = previous.map_or_else(
            || AssetChangeEvent::insert(asset.clone()),
            |old| {
                AssetChangeEvent::update(
                    asset.clone(),
                    old.attributes().to_vec(),
                    asset.attributes().to_vec(),
                )
            },
        );
        self.announce(event);
        Ok(asset)
    }

    async fn delete(&self, id: &AssetId) -> AssetStoreResult<bool> {
        let removed = {
            let mut state = self.state.write().map_err(lock_error)?;
            state.remove(id)
        };
        let Some(asset) = removed else {
            return Ok(false);
        };
        self.announce(AssetChangeEvent::delete(asset));
        Ok(true)
    }
}
