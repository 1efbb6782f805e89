//! Resource Holder
//!
//! Orchestrates deposits into escrow and claims out of it.
//!
//! ## Claim stages
//!
//! ```text
//! Received -> AddressVerified -> SignatureVerified -> DeadlineChecked
//!          -> EntryReserved -> TransferCompleted
//! ```
//!
//! Every gate before `EntryReserved` fails fast without touching the ledger.
//! `EntryReserved` is the commit point: the entry has left the ledger and only
//! the registry transfer remains. If that transfer fails or exceeds the
//! configured timeout, the registry is asked who owns the item now:
//!
//! - the claimant: the transfer went through, the claim completes
//! - the holder account: the entry is put back and the claim reports
//!   `RegistryTransferFailed`
//! - anyone else: the item has left custody, the entry is dropped
//! - no answer in time: the entry is put back; a later attempt settles it
//!
//! ## Deposits
//!
//! Deposits over the API carry a `DepositAuthorization` signed by the Ethereum
//! key registered for the depositor account. The holder account itself can
//! never deposit.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::address::{derive_address, parse_public_key_hex, EthAddress};
use crate::clock::Clock;
use crate::config::HolderConfig;
use crate::crypto;
use crate::error::{ClaimError, RegistryError};
use crate::message::{ClaimMessage, DepositMessage, SignedMessage};
use crate::registry::AssetRegistry;
use crate::storage::{EscrowEntry, EscrowLedger};
use crate::types::{AccountId, ItemId};

// ============================================================================
// REQUEST / RESPONSE STRUCTURES
// ============================================================================

/// A single claim attempt as received from the claimant.
///
/// `public_key` and `signature` are kept as the hex strings the wallet produced;
/// decoding them is part of the claim checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    /// Uncompressed secp256k1 public key, hex (65 or 64 bytes)
    pub public_key: String,
    /// Signature over the claim message, hex (`r || s || v`)
    pub signature: String,
    /// Address the item was escrowed for
    pub foreign_address: EthAddress,
    pub item_id: ItemId,
    /// Unix seconds; the claim is honored while `deadline >= now`
    pub deadline: u64,
}

/// Result of a successful claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub item_id: ItemId,
    pub new_owner: AccountId,
    pub foreign_address: EthAddress,
}

/// A deposit signed by the key registered for `depositor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositAuthorization {
    pub depositor: AccountId,
    pub item_id: ItemId,
    /// Address that will be able to claim the item
    pub foreign_address: EthAddress,
    /// Unix seconds; the authorization is honored while `deadline >= now`
    pub deadline: u64,
    /// Uncompressed secp256k1 public key of the depositor's registered address, hex
    pub public_key: String,
    /// Signature over the deposit message, hex (`r || s || v`)
    pub signature: String,
}

/// Progress of a claim attempt through its gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStage {
    Received,
    AddressVerified,
    SignatureVerified,
    DeadlineChecked,
    EntryReserved,
    TransferCompleted,
}

impl fmt::Display for ClaimStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// RESOURCE HOLDER
// ============================================================================

/// Escrow-and-claim service on top of an asset registry.
pub struct ResourceHolder<R: AssetRegistry> {
    ledger: Arc<EscrowLedger>,
    registry: Arc<R>,
    /// Account that custodies escrowed items in the registry
    holder_account: AccountId,
    clock: Arc<dyn Clock>,
    transfer_timeout: Duration,
    /// depositor account -> address of the key that signs its deposits
    depositors: HashMap<AccountId, EthAddress>,
}

impl<R: AssetRegistry> ResourceHolder<R> {
    pub fn new(
        ledger: Arc<EscrowLedger>,
        registry: Arc<R>,
        holder_account: AccountId,
        clock: Arc<dyn Clock>,
        transfer_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            registry,
            holder_account,
            clock,
            transfer_timeout,
            depositors: HashMap::new(),
        }
    }

    /// Registers the accounts allowed to deposit through `authorized_deposit`.
    pub fn with_depositors(
        mut self,
        depositors: impl IntoIterator<Item = (AccountId, EthAddress)>,
    ) -> Self {
        self.depositors.extend(depositors);
        self
    }

    /// Builds a holder with a fresh ledger from the `[holder]` config section.
    pub fn from_config(config: &HolderConfig, registry: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Arc::new(EscrowLedger::new()),
            registry,
            AccountId::new(config.account.clone()),
            clock,
            config.transfer_timeout(),
        )
        .with_depositors(
            config
                .depositors
                .iter()
                .map(|d| (AccountId::new(d.account.clone()), d.eth_address)),
        )
    }

    pub fn ledger(&self) -> &Arc<EscrowLedger> {
        &self.ledger
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    pub fn holder_account(&self) -> &AccountId {
        &self.holder_account
    }

    /// Escrow an item on the strength of a signed deposit authorization.
    ///
    /// The public key must hash to the address registered for the depositor
    /// and must have signed the `DepositMessage` for exactly this item,
    /// address and deadline.
    ///
    /// # Returns
    ///
    /// * `Ok(EscrowEntry)` - The item is now held for `auth.foreign_address`
    /// * `Err(ClaimError::UnauthorizedDepositor)` - Unknown depositor or key of another address
    /// * `Err(ClaimError::InvalidKeyEncoding)` / `Err(ClaimError::InvalidSignature)` - Bad proof
    /// * `Err(ClaimError::ClaimExpired)` - The authorization deadline has passed
    /// * Any error of `deposit`
    pub async fn authorized_deposit(
        &self,
        auth: &DepositAuthorization,
    ) -> Result<EscrowEntry, ClaimError> {
        let registered = match self.depositors.get(&auth.depositor) {
            Some(address) => *address,
            None => {
                warn!("Deposit rejected: {} is not a registered depositor", auth.depositor);
                return Err(ClaimError::UnauthorizedDepositor);
            }
        };

        let public_key = parse_public_key_hex(&auth.public_key)?;
        if !derive_address(&public_key)?.ct_eq(&registered) {
            warn!(
                "Deposit rejected: key does not belong to depositor {}",
                auth.depositor
            );
            return Err(ClaimError::UnauthorizedDepositor);
        }

        let message = DepositMessage::new(
            auth.depositor.clone(),
            auth.item_id.clone(),
            auth.foreign_address,
            auth.deadline,
        );
        if !signature_valid(&public_key, &auth.signature, &message) {
            warn!("Deposit rejected: invalid signature from {}", auth.depositor);
            return Err(ClaimError::InvalidSignature);
        }

        if auth.deadline < self.clock.now() {
            warn!("Deposit rejected: authorization from {} expired", auth.depositor);
            return Err(ClaimError::ClaimExpired);
        }

        self.deposit(&auth.depositor, &auth.item_id, auth.foreign_address)
            .await
    }

    /// Escrow `item_id` for `address`, taking it out of the depositor's custody.
    ///
    /// The caller is responsible for having authenticated `depositor`; the API
    /// goes through `authorized_deposit`.
    ///
    /// # Returns
    ///
    /// * `Ok(EscrowEntry)` - The item is now held for `address`
    /// * `Err(ClaimError::ItemNotOwnedByDepositor)` - Depositor does not hold the item,
    ///   or the depositor is the holder account
    /// * `Err(ClaimError::RegistryTransferFailed)` - The registry did not answer in time
    pub async fn deposit(
        &self,
        depositor: &AccountId,
        item_id: &ItemId,
        address: EthAddress,
    ) -> Result<EscrowEntry, ClaimError> {
        // Items owned by the holder are either escrowed or mid-claim.
        if depositor == &self.holder_account {
            warn!("Deposit of item {} rejected: holder account cannot deposit", item_id);
            return Err(ClaimError::ItemNotOwnedByDepositor);
        }

        match self.registry.owner_of(item_id).await {
            Some(owner) if &owner == depositor => {}
            _ => {
                warn!(
                    "Deposit of item {} rejected: not owned by {}",
                    item_id, depositor
                );
                return Err(ClaimError::ItemNotOwnedByDepositor);
            }
        }

        if let Err(e) = self
            .transfer_with_timeout(item_id, depositor, &self.holder_account)
            .await
        {
            match e {
                RegistryError::UnknownItem(_) | RegistryError::NotOwner { .. } => {
                    return Err(ClaimError::ItemNotOwnedByDepositor);
                }
                RegistryError::Unavailable(_) => match self.owner_with_timeout(item_id).await {
                    Ok(Some(owner)) if owner == self.holder_account => {
                        warn!(
                            "Custody transfer of item {} reported '{}' but was applied",
                            item_id, e
                        );
                    }
                    _ => {
                        warn!("Custody transfer of item {} failed: {}", item_id, e);
                        return Err(ClaimError::RegistryTransferFailed);
                    }
                },
            }
        }

        let entry = EscrowEntry {
            item_id: item_id.clone(),
            foreign_address: address,
            depositor: depositor.clone(),
            deposited_at: self.clock.now(),
        };

        // The ledger only refuses an item it already holds an entry for. That
        // entry owns the holder's custody, so the item is not sent back.
        if let Err(e) = self.ledger.deposit(entry.clone()).await {
            error!(
                "Item {} reached custody but is already escrowed: {}",
                item_id, e
            );
            return Err(e);
        }

        info!("Item {} escrowed for {} by {}", item_id, address, depositor);
        Ok(entry)
    }

    /// Items waiting to be claimed by `address`.
    pub async fn list_items(&self, address: &EthAddress) -> Vec<ItemId> {
        self.ledger.list_items(address).await
    }

    /// Claim an escrowed item into `claimant`'s account.
    ///
    /// # Arguments
    ///
    /// * `request` - Key, signature, address, item and deadline presented by the claimant
    /// * `claimant` - Native account that receives the item and that the signature must name
    ///
    /// # Returns
    ///
    /// * `Ok(ClaimReceipt)` - The item now belongs to `claimant`
    /// * `Err(ClaimError)` - The gate that rejected the claim
    pub async fn claim(
        &self,
        request: &ClaimRequest,
        claimant: &AccountId,
    ) -> Result<ClaimReceipt, ClaimError> {
        let attempt_id = Uuid::new_v4();
        let span = info_span!(
            "claim",
            %attempt_id,
            item_id = %request.item_id,
            address = %request.foreign_address
        );
        self.process_claim(request, claimant).instrument(span).await
    }

    async fn process_claim(
        &self,
        request: &ClaimRequest,
        claimant: &AccountId,
    ) -> Result<ClaimReceipt, ClaimError> {
        let mut stage = ClaimStage::Received;
        debug!("Claim received from {}", claimant);

        // The presented key must hash to the escrow bucket being claimed from.
        let public_key =
            parse_public_key_hex(&request.public_key).map_err(|e| reject(stage, e))?;
        let derived = derive_address(&public_key).map_err(|e| reject(stage, e))?;
        if !derived.ct_eq(&request.foreign_address) {
            return Err(reject(stage, ClaimError::AddressMismatch));
        }
        stage = advance(ClaimStage::AddressVerified);

        let message = ClaimMessage::new(request.item_id.clone(), request.deadline, claimant.clone());
        if !signature_valid(&public_key, &request.signature, &message) {
            return Err(reject(stage, ClaimError::InvalidSignature));
        }
        stage = advance(ClaimStage::SignatureVerified);

        let now = self.clock.now();
        if request.deadline < now {
            return Err(reject(stage, ClaimError::ClaimExpired));
        }
        stage = advance(ClaimStage::DeadlineChecked);

        let entry = self
            .ledger
            .take_for_claim(&request.item_id, &request.foreign_address)
            .await
            .map_err(|e| reject(stage, e))?;
        stage = advance(ClaimStage::EntryReserved);

        let entry = match self
            .transfer_with_timeout(&entry.item_id, &self.holder_account, claimant)
            .await
        {
            Ok(()) => entry,
            Err(e) => {
                warn!("Registry transfer failed at {}: {}", stage, e);
                self.settle_failed_release(entry, claimant).await?
            }
        };
        advance(ClaimStage::TransferCompleted);

        info!("Item {} claimed by {}", entry.item_id, claimant);
        Ok(ClaimReceipt {
            item_id: entry.item_id,
            new_owner: claimant.clone(),
            foreign_address: entry.foreign_address,
        })
    }

    /// Administrative return of an escrowed item to its depositor.
    ///
    /// Mutually exclusive with `claim`: whichever removes the ledger entry
    /// first wins, the other sees `NoSuchEscrowedItem`.
    pub async fn reclaim(&self, item_id: &ItemId) -> Result<EscrowEntry, ClaimError> {
        let entry = self.ledger.take_for_reclaim(item_id).await?;
        let depositor = entry.depositor.clone();

        let entry = match self
            .transfer_with_timeout(&entry.item_id, &self.holder_account, &depositor)
            .await
        {
            Ok(()) => entry,
            Err(e) => {
                warn!("Reclaim of item {} failed: {}", item_id, e);
                self.settle_failed_release(entry, &depositor).await?
            }
        };

        info!("Item {} returned to depositor {}", item_id, depositor);
        Ok(entry)
    }

    /// Decides the fate of an entry whose release transfer reported failure.
    ///
    /// Returns the entry when the registry shows `recipient` as owner, so the
    /// release counts as done. Otherwise returns `RegistryTransferFailed`,
    /// restoring the entry only while the holder still owns the item.
    async fn settle_failed_release(
        &self,
        entry: EscrowEntry,
        recipient: &AccountId,
    ) -> Result<EscrowEntry, ClaimError> {
        match self.owner_with_timeout(&entry.item_id).await {
            Ok(Some(owner)) if &owner == recipient => {
                warn!(
                    "Transfer of item {} to {} reported failure but was applied",
                    entry.item_id, recipient
                );
                Ok(entry)
            }
            Ok(Some(owner)) if owner == self.holder_account => {
                self.restore(entry).await;
                Err(ClaimError::RegistryTransferFailed)
            }
            Ok(owner) => {
                error!(
                    "Item {} left custody (owner {:?}); dropping its escrow entry for {}",
                    entry.item_id, owner, entry.foreign_address
                );
                Err(ClaimError::RegistryTransferFailed)
            }
            Err(e) => {
                warn!("Owner of item {} unknown: {}", entry.item_id, e);
                self.restore(entry).await;
                Err(ClaimError::RegistryTransferFailed)
            }
        }
    }

    async fn restore(&self, entry: EscrowEntry) {
        let item_id = entry.item_id.clone();
        match self.ledger.restore(entry).await {
            Ok(()) => info!("Escrow entry for item {} restored", item_id),
            Err(e) => error!("Failed to restore escrow entry for item {}: {}", item_id, e),
        }
    }

    /// Registry transfer bounded by the configured timeout.
    async fn transfer_with_timeout(
        &self,
        item_id: &ItemId,
        from: &AccountId,
        to: &AccountId,
    ) -> Result<(), RegistryError> {
        match tokio::time::timeout(
            self.transfer_timeout,
            self.registry.transfer(item_id, from, to),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RegistryError::Unavailable(format!(
                "transfer of item {} timed out after {}ms",
                item_id,
                self.transfer_timeout.as_millis()
            ))),
        }
    }

    /// Ownership lookup bounded by the configured timeout.
    async fn owner_with_timeout(&self, item_id: &ItemId) -> Result<Option<AccountId>, RegistryError> {
        tokio::time::timeout(self.transfer_timeout, self.registry.owner_of(item_id))
            .await
            .map_err(|_| {
                RegistryError::Unavailable(format!("owner lookup of item {} timed out", item_id))
            })
    }
}

/// Hex-decodes `signature` (with or without `0x`) and verifies it over `message`.
fn signature_valid<M: SignedMessage>(public_key: &[u8], signature: &str, message: &M) -> bool {
    let signature_hex = signature.strip_prefix("0x").unwrap_or(signature);
    match hex::decode(signature_hex) {
        Ok(signature) => crypto::verify(public_key, &signature, message),
        Err(_) => false,
    }
}

fn advance(stage: ClaimStage) -> ClaimStage {
    debug!("Claim stage: {}", stage);
    stage
}

fn reject(stage: ClaimStage, err: ClaimError) -> ClaimError {
    warn!("Claim rejected after {}: {}", stage, err);
    err
}
