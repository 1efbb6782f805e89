//! Error types
//!
//! Every failure a deposit or claim can hit is a `ClaimError`. All of them are
//! recoverable by the caller: the operation simply did not happen.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimError {
    #[error("Invalid public key encoding")]
    InvalidKeyEncoding,

    #[error("Public key does not match the escrow address")]
    AddressMismatch,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Claim deadline has passed")]
    ClaimExpired,

    #[error("No such escrowed item")]
    NoSuchEscrowedItem,

    #[error("Item not owned by depositor")]
    ItemNotOwnedByDepositor,

    #[error("Depositor did not authorize this deposit")]
    UnauthorizedDepositor,

    #[error("Item already escrowed")]
    ItemAlreadyEscrowed,

    #[error("Registry transfer failed")]
    RegistryTransferFailed,
}

/// Failures reported by a digital asset registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Account {account} does not own item {item_id}")]
    NotOwner { item_id: String, account: String },

    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}
