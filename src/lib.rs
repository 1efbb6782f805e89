//! Resource Holder Service Library
//!
//! This crate holds NFTs in escrow for Ethereum addresses and releases them to
//! native accounts on presentation of a secp256k1 signature from the address key.

pub mod address;
pub mod api;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod holder;
pub mod message;
pub mod registry;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use address::{derive_address, EthAddress};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ApiConfig, Config, HolderConfig};
pub use crypto::{verify, ClaimSigner};
pub use error::{ClaimError, RegistryError};
pub use holder::{ClaimReceipt, ClaimRequest, ClaimStage, DepositAuthorization, ResourceHolder};
pub use message::{ClaimMessage, DepositMessage, SignedMessage};
pub use registry::{AssetRegistry, InMemoryRegistry};
pub use storage::{EscrowEntry, EscrowLedger};
pub use types::{AccountId, ItemId};
