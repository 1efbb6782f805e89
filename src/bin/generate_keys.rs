//! secp256k1 Key Generation Utility
//!
//! Generates a key pair a claimant can use to receive escrowed items.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin generate_keys
//! ```
//!
//! ## Output
//!
//! - Private key (hex) - keep secret, used by `sign_claim`
//! - Public key (hex, uncompressed) - presented when claiming
//! - Ethereum address - the address to deposit items for

use resource_holder::crypto::ClaimSigner;

fn main() {
    let signer = ClaimSigner::generate();

    println!("Generated secp256k1 Key Pair:");
    println!("Private Key (hex): {}", signer.private_key_hex());
    println!("Public Key (hex): {}", signer.public_key_hex());
    println!("Ethereum Address: {}", signer.address());
}
