//! Claim Signing Utility
//!
//! Signs a claim message with the key of an Ethereum address and prints the
//! JSON body to send to `POST /claim`.
//!
//! ## Usage
//!
//! ```bash
//! CLAIMANT_PRIVATE_KEY=0x... cargo run --bin sign_claim -- \
//!     --item 0 --deadline 1900000000 --claimant 0x01cf0e2f2f715450
//! ```

use anyhow::{Context, Result};

use resource_holder::api::ClaimApiRequest;
use resource_holder::crypto::ClaimSigner;
use resource_holder::message::ClaimMessage;
use resource_holder::types::{AccountId, ItemId};

const PRIVATE_KEY_ENV: &str = "CLAIMANT_PRIVATE_KEY";

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("Usage: sign_claim --item <id> --deadline <unix secs> --claimant <account>");
        println!();
        println!("Environment variables:");
        println!("  {}    Private key of the Ethereum address (hex)", PRIVATE_KEY_ENV);
        return Ok(());
    }

    let item_id = arg_value(&args, "--item").context("Missing --item")?;
    let deadline: u64 = arg_value(&args, "--deadline")
        .context("Missing --deadline")?
        .parse()
        .context("Invalid --deadline")?;
    let claimant = arg_value(&args, "--claimant").context("Missing --claimant")?;

    let private_key = std::env::var(PRIVATE_KEY_ENV).map_err(|_| {
        anyhow::anyhow!(
            "Environment variable '{}' not set. Please set it with the private key (hex) of the Ethereum address.",
            PRIVATE_KEY_ENV
        )
    })?;
    let signer = ClaimSigner::from_hex(&private_key)?;

    let message = ClaimMessage::new(ItemId::new(item_id), deadline, AccountId::new(claimant));
    let signature = signer.sign_claim_hex(&message)?;

    let request = ClaimApiRequest {
        public_key: signer.public_key_hex(),
        signature,
        eth_address: signer.address(),
        item_id: message.item_id,
        deadline: message.deadline,
        claimant: message.claimant,
    };

    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}
