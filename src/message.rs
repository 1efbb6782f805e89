//! Signed Message Encoding
//!
//! Claims and deposits are both authorized by a secp256k1 signature from an
//! Ethereum key. Each message binds every field the service acts on:
//!
//! - a claim covers the item, the deadline and the native account the item
//!   will be delivered to, so a signature cannot be replayed against another
//!   item, after expiry, or toward another recipient
//! - a deposit covers the depositor, the item, the escrow address and a
//!   deadline, so nobody but the depositor can choose where their item goes
//!
//! Encoding: `domain || BCS(message)`, where `domain` names the message kind.
//! Digest: `keccak256("\x19Ethereum Signed Message:\n32" || keccak256(encoding))`,
//! which is what `personal_sign` produces for the 32-byte message hash.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::address::EthAddress;
use crate::types::{AccountId, ItemId};

/// Ethereum signed message prefix for a 32-byte payload.
const ETH_SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// A message that an Ethereum key signs to authorize an action.
pub trait SignedMessage: Serialize {
    /// Prefix that keeps the encodings of different message kinds apart.
    const DOMAIN: &'static [u8];

    /// Canonical bytes: domain tag followed by the BCS encoding.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Self::DOMAIN.to_vec();
        bytes.extend(bcs::to_bytes(self).context("Failed to BCS-encode signed message")?);
        Ok(bytes)
    }

    /// keccak256 of the canonical bytes.
    fn message_hash(&self) -> Result<[u8; 32]> {
        let mut hasher = Keccak256::new();
        hasher.update(self.to_bytes()?);
        Ok(hasher.finalize().into())
    }

    /// Digest that the signer's wallet signs.
    fn signing_digest(&self) -> Result<[u8; 32]> {
        Ok(eth_signed_message_digest(&self.message_hash()?))
    }
}

// ============================================================================
// CLAIM MESSAGE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimMessage {
    pub item_id: ItemId,
    /// Unix seconds
    pub deadline: u64,
    pub claimant: AccountId,
}

impl ClaimMessage {
    pub fn new(item_id: ItemId, deadline: u64, claimant: AccountId) -> Self {
        Self {
            item_id,
            deadline,
            claimant,
        }
    }
}

impl SignedMessage for ClaimMessage {
    const DOMAIN: &'static [u8] = b"resource-holder:claim";
}

// ============================================================================
// DEPOSIT MESSAGE
// ============================================================================

/// Authorization from a depositor to escrow one of their items for an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositMessage {
    pub depositor: AccountId,
    pub item_id: ItemId,
    pub foreign_address: EthAddress,
    /// Unix seconds
    pub deadline: u64,
}

impl DepositMessage {
    pub fn new(
        depositor: AccountId,
        item_id: ItemId,
        foreign_address: EthAddress,
        deadline: u64,
    ) -> Self {
        Self {
            depositor,
            item_id,
            foreign_address,
            deadline,
        }
    }
}

impl SignedMessage for DepositMessage {
    const DOMAIN: &'static [u8] = b"resource-holder:deposit";
}

/// `keccak256("\x19Ethereum Signed Message:\n32" || message_hash)`
pub fn eth_signed_message_digest(message_hash: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(ETH_SIGNED_MESSAGE_PREFIX);
    hasher.update(message_hash);
    hasher.finalize().into()
}
