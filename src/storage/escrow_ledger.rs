//! Escrow Ledger Module
//!
//! In-memory record of items held in custody for Ethereum addresses. Entries
//! are discoverable only through the address they were deposited for; one
//! address may hold many items, an item sits in at most one entry.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::address::EthAddress;
use crate::error::ClaimError;
use crate::types::{AccountId, ItemId};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// An item held in custody until claimed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowEntry {
    /// Escrowed item
    pub item_id: ItemId,
    /// Address whose key holder may claim the item
    pub foreign_address: EthAddress,
    /// Native account the item was deposited from (used for reclaim)
    pub depositor: AccountId,
    /// Deposit time (Unix timestamp)
    pub deposited_at: u64,
}

#[derive(Default)]
struct LedgerState {
    /// address -> entries in deposit order
    buckets: HashMap<EthAddress, Vec<EscrowEntry>>,
    /// item_id -> address it is escrowed under
    index: HashMap<ItemId, EthAddress>,
}

impl LedgerState {
    fn insert(&mut self, entry: EscrowEntry) -> Result<(), ClaimError> {
        if self.index.contains_key(&entry.item_id) {
            return Err(ClaimError::ItemAlreadyEscrowed);
        }
        self.index
            .insert(entry.item_id.clone(), entry.foreign_address);
        self.buckets
            .entry(entry.foreign_address)
            .or_default()
            .push(entry);
        Ok(())
    }

    fn remove(&mut self, item_id: &ItemId, address: &EthAddress) -> Option<EscrowEntry> {
        let bucket = self.buckets.get_mut(address)?;
        let position = bucket.iter().position(|entry| &entry.item_id == item_id)?;
        let entry = bucket.remove(position);
        if bucket.is_empty() {
            self.buckets.remove(address);
        }
        self.index.remove(item_id);
        Some(entry)
    }
}

// ============================================================================
// STORAGE IMPLEMENTATION
// ============================================================================

/// In-memory escrow ledger.
///
/// A single RwLock guards both the address buckets and the item index, so every
/// removal is all-or-nothing and at most one caller can take a given entry.
pub struct EscrowLedger {
    state: RwLock<LedgerState>,
}

impl EscrowLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
        }
    }

    /// Record a new escrow entry.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the entry was recorded
    /// * `Err(ClaimError::ItemAlreadyEscrowed)` if the item is already held
    pub async fn deposit(&self, entry: EscrowEntry) -> Result<(), ClaimError> {
        let mut state = self.state.write().await;
        debug!(
            "Escrowing item {} for {}",
            entry.item_id, entry.foreign_address
        );
        state.insert(entry)
    }

    /// Item ids held for `address`, in deposit order.
    ///
    /// Returns an empty list for addresses with nothing escrowed.
    pub async fn list_items(&self, address: &EthAddress) -> Vec<ItemId> {
        let state = self.state.read().await;
        state
            .buckets
            .get(address)
            .map(|bucket| bucket.iter().map(|entry| entry.item_id.clone()).collect())
            .unwrap_or_default()
    }

    /// Entries held for `address`, in deposit order.
    pub async fn entries_for(&self, address: &EthAddress) -> Vec<EscrowEntry> {
        let state = self.state.read().await;
        state.buckets.get(address).cloned().unwrap_or_default()
    }

    /// Look up the entry holding `item_id`, if any.
    pub async fn entry(&self, item_id: &ItemId) -> Option<EscrowEntry> {
        let state = self.state.read().await;
        let address = state.index.get(item_id)?;
        state
            .buckets
            .get(address)?
            .iter()
            .find(|entry| &entry.item_id == item_id)
            .cloned()
    }

    /// Remove and return the entry for `item_id` if it is held under exactly `address`.
    ///
    /// # Returns
    ///
    /// * `Ok(EscrowEntry)` - The caller now owns the entry
    /// * `Err(ClaimError::NoSuchEscrowedItem)` - Never deposited, already taken, or held
    ///   under a different address
    pub async fn take_for_claim(
        &self,
        item_id: &ItemId,
        address: &EthAddress,
    ) -> Result<EscrowEntry, ClaimError> {
        let mut state = self.state.write().await;
        state
            .remove(item_id, address)
            .ok_or(ClaimError::NoSuchEscrowedItem)
    }

    /// Remove and return the entry for `item_id` regardless of its address.
    ///
    /// Administrative path; shares the write lock with `take_for_claim` so the
    /// two can never both succeed for one item.
    pub async fn take_for_reclaim(&self, item_id: &ItemId) -> Result<EscrowEntry, ClaimError> {
        let mut state = self.state.write().await;
        let address = *state
            .index
            .get(item_id)
            .ok_or(ClaimError::NoSuchEscrowedItem)?;
        state
            .remove(item_id, &address)
            .ok_or(ClaimError::NoSuchEscrowedItem)
    }

    /// Put back an entry taken by `take_for_claim` or `take_for_reclaim`.
    ///
    /// The restored entry is appended to the end of its address bucket.
    pub async fn restore(&self, entry: EscrowEntry) -> Result<(), ClaimError> {
        let mut state = self.state.write().await;
        debug!(
            "Restoring item {} for {}",
            entry.item_id, entry.foreign_address
        );
        state.insert(entry)
    }

    /// Number of escrowed items across all addresses.
    pub async fn len(&self) -> usize {
        self.state.read().await.index.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for EscrowLedger {
    fn default() -> Self {
        Self::new()
    }
}
