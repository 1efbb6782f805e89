//! Digital Asset Registry
//!
//! The registry owns the actual asset records. The resource holder only asks
//! it who owns an item and tells it to move an item between accounts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::types::{AccountId, ItemId};

/// Ownership interface of an external asset registry.
#[async_trait]
pub trait AssetRegistry: Send + Sync {
    /// Current owner of `item_id`, or `None` if the registry does not know it.
    async fn owner_of(&self, item_id: &ItemId) -> Option<AccountId>;

    /// Move `item_id` from `from` to `to`.
    async fn transfer(
        &self,
        item_id: &ItemId,
        from: &AccountId,
        to: &AccountId,
    ) -> Result<(), RegistryError>;
}

// ============================================================================
// IN-MEMORY REGISTRY
// ============================================================================

/// Asset record kept by the in-memory registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    pub item_id: ItemId,
    pub owner: AccountId,
}

#[derive(Default)]
struct RegistryState {
    assets: HashMap<ItemId, AssetRecord>,
    next_id: u64,
}

/// Registry held entirely in memory.
///
/// Minted items get sequential ids ("0", "1", ...).
#[derive(Default)]
pub struct InMemoryRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new item owned by `owner`.
    pub async fn mint(&self, owner: &AccountId) -> ItemId {
        let mut state = self.state.write().await;
        let item_id = ItemId::new(state.next_id.to_string());
        state.next_id += 1;
        state.assets.insert(
            item_id.clone(),
            AssetRecord {
                item_id: item_id.clone(),
                owner: owner.clone(),
            },
        );
        info!("Minted item {} to {}", item_id, owner);
        item_id
    }

    /// Mint the items listed in the `[registry]` config section.
    ///
    /// Returns the number of items minted.
    pub async fn seed(&self, config: &RegistryConfig) -> usize {
        let mut minted = 0;
        for seed in &config.seed {
            let owner = AccountId::new(seed.owner.clone());
            for _ in 0..seed.count {
                self.mint(&owner).await;
                minted += 1;
            }
        }
        minted
    }

    /// Item ids currently owned by `owner`, sorted.
    pub async fn items_owned_by(&self, owner: &AccountId) -> Vec<ItemId> {
        let state = self.state.read().await;
        let mut items: Vec<ItemId> = state
            .assets
            .values()
            .filter(|record| &record.owner == owner)
            .map(|record| record.item_id.clone())
            .collect();
        items.sort();
        items
    }
}

#[async_trait]
impl AssetRegistry for InMemoryRegistry {
    async fn owner_of(&self, item_id: &ItemId) -> Option<AccountId> {
        let state = self.state.read().await;
        state.assets.get(item_id).map(|record| record.owner.clone())
    }

    async fn transfer(
        &self,
        item_id: &ItemId,
        from: &AccountId,
        to: &AccountId,
    ) -> Result<(), RegistryError> {
        let mut state = self.state.write().await;
        let record = state
            .assets
            .get_mut(item_id)
            .ok_or_else(|| RegistryError::UnknownItem(item_id.to_string()))?;

        if &record.owner != from {
            return Err(RegistryError::NotOwner {
                item_id: item_id.to_string(),
                account: from.to_string(),
            });
        }

        record.owner = to.clone();
        Ok(())
    }
}
