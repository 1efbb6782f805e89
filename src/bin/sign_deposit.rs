//! Deposit Signing Utility
//!
//! Signs a deposit authorization with the depositor's registered Ethereum key
//! and prints the JSON body to send to `POST /deposit`.
//!
//! ## Usage
//!
//! ```bash
//! DEPOSITOR_PRIVATE_KEY=0x... cargo run --bin sign_deposit -- \
//!     --depositor 0x179b6b1cb6755e31 --item 0 \
//!     --eth-address 0x97514895ee81704cb2cc6f08d65a90a420e9ff20 --deadline 1900000000
//! ```

use anyhow::{Context, Result};

use resource_holder::address::EthAddress;
use resource_holder::api::DepositRequest;
use resource_holder::crypto::ClaimSigner;
use resource_holder::message::DepositMessage;
use resource_holder::types::{AccountId, ItemId};

const PRIVATE_KEY_ENV: &str = "DEPOSITOR_PRIVATE_KEY";

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!(
            "Usage: sign_deposit --depositor <account> --item <id> --eth-address <0x...> --deadline <unix secs>"
        );
        println!();
        println!("Environment variables:");
        println!("  {}    Private key registered for the depositor (hex)", PRIVATE_KEY_ENV);
        return Ok(());
    }

    let depositor = arg_value(&args, "--depositor").context("Missing --depositor")?;
    let item_id = arg_value(&args, "--item").context("Missing --item")?;
    let eth_address: EthAddress = arg_value(&args, "--eth-address")
        .context("Missing --eth-address")?
        .parse()?;
    let deadline: u64 = arg_value(&args, "--deadline")
        .context("Missing --deadline")?
        .parse()
        .context("Invalid --deadline")?;

    let private_key = std::env::var(PRIVATE_KEY_ENV).map_err(|_| {
        anyhow::anyhow!(
            "Environment variable '{}' not set. Please set it with the private key (hex) registered for the depositor.",
            PRIVATE_KEY_ENV
        )
    })?;
    let signer = ClaimSigner::from_hex(&private_key)?;

    let message = DepositMessage::new(
        AccountId::new(depositor),
        ItemId::new(item_id),
        eth_address,
        deadline,
    );
    let signature = signer.sign_hex(&message)?;

    let request = DepositRequest {
        depositor: message.depositor,
        item_id: message.item_id,
        eth_address: message.foreign_address,
        deadline: message.deadline,
        public_key: signer.public_key_hex(),
        signature,
    };

    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}
