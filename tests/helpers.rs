//! Shared test helpers
//!
//! The module is organized into several categories:
//! - **Constants**: Accounts, addresses and well-known keys
//! - **Environment Builders**: Holder + registry + clock wired together
//! - **Claim Builders**: Signed claim requests and deposit authorizations
//! - **Registries**: A registry whose transfers can be made to fail, stall,
//!   or apply and then report failure

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use resource_holder::clock::{Clock, ManualClock};
use resource_holder::config::{ApiConfig, Config, DepositorConfig, HolderConfig, RegistryConfig};
use resource_holder::crypto::ClaimSigner;
use resource_holder::error::RegistryError;
use resource_holder::holder::{ClaimRequest, DepositAuthorization, ResourceHolder};
use resource_holder::message::{ClaimMessage, DepositMessage};
use resource_holder::registry::{AssetRegistry, InMemoryRegistry};
use resource_holder::storage::EscrowLedger;
use resource_holder::types::{AccountId, ItemId};
use resource_holder::EthAddress;

// ============================================================================
// CONSTANTS
// ============================================================================

// ------------------------------ ADDRESSES -------------------------------

/// Ethereum address used by the MetaMask integration scenario
pub const TEST_ETH_ADDRESS: &str = "0x97514895ee81704cb2cc6f08d65a90a420e9ff20";

/// Address nothing is ever deposited for
pub const EMPTY_ETH_ADDRESS: &str = "0x000000000000000000000000000000000000dead";

// -------------------------------- KEYS ----------------------------------

/// Hardhat default account #0 private key
pub const HARDHAT_KEY_0: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Address of Hardhat default account #0
pub const HARDHAT_ADDR_0: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

/// Hardhat default account #1 private key
pub const HARDHAT_KEY_1: &str =
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

/// Address of Hardhat default account #1
pub const HARDHAT_ADDR_1: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

// ------------------------------ ACCOUNTS --------------------------------

/// Account that custodies escrowed items
pub const HOLDER_ACCOUNT: &str = "0xf8d6e0586b0a20c7";

/// Account that owns minted items and deposits them
pub const DEPOSITOR_ACCOUNT: &str = "0x179b6b1cb6755e31";

/// Key registered for `DEPOSITOR_ACCOUNT` (Hardhat account #1)
pub const DEPOSITOR_KEY: &str = HARDHAT_KEY_1;

/// Account that claims escrowed items
pub const CLAIMANT_ACCOUNT: &str = "0x01cf0e2f2f715450";

// -------------------------------- TIME ----------------------------------

/// Current logical time in tests
pub const NOW: u64 = 1_700_000_000;

/// Deadline far in the future
pub const FAR_FUTURE_DEADLINE: u64 = 99_999_999_999_999;

/// Transfer timeout used by test holders
pub const TEST_TRANSFER_TIMEOUT: Duration = Duration::from_millis(200);

// ============================================================================
// ENVIRONMENT BUILDERS
// ============================================================================

pub fn holder_account() -> AccountId {
    AccountId::from(HOLDER_ACCOUNT)
}

pub fn depositor() -> AccountId {
    AccountId::from(DEPOSITOR_ACCOUNT)
}

pub fn claimant() -> AccountId {
    AccountId::from(CLAIMANT_ACCOUNT)
}

pub fn eth(address: &str) -> EthAddress {
    address.parse().unwrap()
}

/// Holder wired to a registry and a manual clock set to `NOW`.
pub struct TestEnv<R: AssetRegistry> {
    pub holder: Arc<ResourceHolder<R>>,
    pub registry: Arc<R>,
    pub clock: Arc<ManualClock>,
}

impl<R: AssetRegistry> TestEnv<R> {
    pub fn with_registry(registry: R) -> Self {
        let registry = Arc::new(registry);
        let clock = Arc::new(ManualClock::new(NOW));
        let holder = Arc::new(ResourceHolder::new(
            Arc::new(EscrowLedger::new()),
            registry.clone(),
            holder_account(),
            clock.clone() as Arc<dyn Clock>,
            TEST_TRANSFER_TIMEOUT,
        )
        .with_depositors([(depositor(), eth(HARDHAT_ADDR_1))]));
        Self {
            holder,
            registry,
            clock,
        }
    }
}

/// Environment backed by the in-memory registry.
pub fn setup() -> TestEnv<InMemoryRegistry> {
    TestEnv::with_registry(InMemoryRegistry::new())
}

/// Environment backed by a registry whose transfers can be made to fail.
pub fn setup_flaky() -> TestEnv<FlakyRegistry> {
    TestEnv::with_registry(FlakyRegistry::new())
}

/// Mint an item to the depositor and escrow it for `address`.
pub async fn mint_and_deposit(env: &TestEnv<InMemoryRegistry>, address: &str) -> ItemId {
    let item_id = env.registry.mint(&depositor()).await;
    env.holder
        .deposit(&depositor(), &item_id, eth(address))
        .await
        .unwrap();
    item_id
}

/// Configuration used by config and API tests.
pub fn build_test_config() -> Config {
    Config {
        holder: HolderConfig {
            account: HOLDER_ACCOUNT.to_string(),
            transfer_timeout_ms: TEST_TRANSFER_TIMEOUT.as_millis() as u64,
            depositors: vec![DepositorConfig {
                account: DEPOSITOR_ACCOUNT.to_string(),
                eth_address: eth(HARDHAT_ADDR_1),
            }],
        },
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 3340,
            cors_origins: vec![],
        },
        registry: RegistryConfig::default(),
    }
}

// ============================================================================
// CLAIM BUILDERS
// ============================================================================

/// Claim request for `item_id` signed by `signer` naming `claimant`.
pub fn signed_claim(
    signer: &ClaimSigner,
    item_id: &ItemId,
    deadline: u64,
    claimant: &AccountId,
) -> ClaimRequest {
    let message = ClaimMessage::new(item_id.clone(), deadline, claimant.clone());
    ClaimRequest {
        public_key: signer.public_key_hex(),
        signature: signer.sign_claim_hex(&message).unwrap(),
        foreign_address: signer.address(),
        item_id: item_id.clone(),
        deadline,
    }
}

/// Deposit authorization for `item_id` from `depositor` signed by `signer`.
pub fn signed_deposit(
    signer: &ClaimSigner,
    depositor: &AccountId,
    item_id: &ItemId,
    address: EthAddress,
    deadline: u64,
) -> DepositAuthorization {
    let message = DepositMessage::new(depositor.clone(), item_id.clone(), address, deadline);
    DepositAuthorization {
        depositor: depositor.clone(),
        item_id: item_id.clone(),
        foreign_address: address,
        deadline,
        public_key: signer.public_key_hex(),
        signature: signer.sign_hex(&message).unwrap(),
    }
}

// ============================================================================
// REGISTRIES
// ============================================================================

/// In-memory registry whose transfers can be switched to fail or stall.
pub struct FlakyRegistry {
    pub inner: InMemoryRegistry,
    fail_transfers: AtomicBool,
    lose_acks: AtomicBool,
    delay_ms: AtomicU64,
}

impl FlakyRegistry {
    pub fn new() -> Self {
        Self {
            inner: InMemoryRegistry::new(),
            fail_transfers: AtomicBool::new(false),
            lose_acks: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
        }
    }

    pub fn fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }

    /// Apply transfers, then report them as failed.
    pub fn lose_acks(&self, lose: bool) {
        self.lose_acks.store(lose, Ordering::SeqCst);
    }

    pub fn delay_transfers(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl AssetRegistry for FlakyRegistry {
    async fn owner_of(&self, item_id: &ItemId) -> Option<AccountId> {
        self.inner.owner_of(item_id).await
    }

    async fn transfer(
        &self,
        item_id: &ItemId,
        from: &AccountId,
        to: &AccountId,
    ) -> Result<(), RegistryError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable("injected failure".to_string()));
        }
        self.inner.transfer(item_id, from, to).await?;
        if self.lose_acks.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable("ack lost".to_string()));
        }
        Ok(())
    }
}
