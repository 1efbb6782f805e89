//! Cryptographic Operations Module
//!
//! This module verifies secp256k1 claim signatures the way an EVM `ecrecover`
//! consumer would, and provides the matching signer used by the key tooling
//! binaries and tests.
//!
//! ## Security Requirements
//!
//! **CRITICAL**: Verification fails closed. Any malformed key, malformed
//! signature or mismatch yields `false`; callers must not learn which check
//! failed. Private keys must never be logged.

use anyhow::{Context, Result};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{
    RecoveryId, Signature as EcdsaSignature, SigningKey as EcdsaSigningKey,
    VerifyingKey as EcdsaVerifyingKey,
};
use tracing::debug;

use crate::address::{address_of, decode_public_key, EthAddress};
use crate::message::{ClaimMessage, SignedMessage};

// ============================================================================
// SIGNATURE VERIFICATION
// ============================================================================

/// Verifies that `signature` over `message` was produced by `public_key`.
///
/// # Arguments
///
/// * `public_key` - Uncompressed secp256k1 public key (65 or 64 bytes)
/// * `signature` - `r || s || v` (65 bytes) or `r || s` (64 bytes)
/// * `message` - The claim or deposit message the signature must cover
///
/// # Returns
///
/// `true` only if the signature is well formed and valid for this key.
pub fn verify<M: SignedMessage>(public_key: &[u8], signature: &[u8], message: &M) -> bool {
    match message.signing_digest() {
        Ok(digest) => verify_prehash(public_key, signature, &digest),
        Err(_) => false,
    }
}

/// Verifies a signature over an already computed 32-byte digest.
///
/// High-S signatures are normalized before verification. When a recovery byte
/// is present, the key recovered from the signature must also equal
/// `public_key`.
pub fn verify_prehash(public_key: &[u8], signature: &[u8], digest: &[u8; 32]) -> bool {
    let verifying_key = match decode_public_key(public_key) {
        Ok(key) => key,
        Err(_) => return false,
    };

    let (rs, v) = match signature.len() {
        65 => (&signature[..64], Some(signature[64])),
        64 => (signature, None),
        _ => return false,
    };

    let signature = match EcdsaSignature::from_slice(rs) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    // Normalizing s negates the nonce point, which flips the recovery parity.
    let (normalized, flipped) = match signature.normalize_s() {
        Some(low_s) => (low_s, true),
        None => (signature, false),
    };

    if verifying_key.verify_prehash(digest, &normalized).is_err() {
        return false;
    }

    match v {
        Some(v) => {
            let recovery_id = match recovery_id_from_v(v) {
                Some(id) => RecoveryId::new(id.is_y_odd() ^ flipped, id.is_x_reduced()),
                None => return false,
            };
            match EcdsaVerifyingKey::recover_from_prehash(digest, &normalized, recovery_id) {
                Ok(recovered) => recovered == verifying_key,
                Err(_) => false,
            }
        }
        None => true,
    }
}

/// Accepts both raw (0/1) and Ethereum (27/28) recovery bytes.
fn recovery_id_from_v(v: u8) -> Option<RecoveryId> {
    let id = match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        _ => return None,
    };
    RecoveryId::try_from(id).ok()
}

// ============================================================================
// CLAIM SIGNER
// ============================================================================

/// secp256k1 key holder that signs claim messages the way an Ethereum wallet does.
pub struct ClaimSigner {
    signing_key: EcdsaSigningKey,
}

impl ClaimSigner {
    /// Loads a signer from a 32-byte private key in hex (with or without `0x`).
    pub fn from_hex(private_key: &str) -> Result<Self> {
        let hex_part = private_key.strip_prefix("0x").unwrap_or(private_key);
        let bytes = hex::decode(hex_part).context("Invalid private key hex")?;

        if bytes.len() != 32 {
            return Err(anyhow::anyhow!(
                "Invalid private key length: expected 32 bytes, got {}",
                bytes.len()
            ));
        }

        let signing_key = EcdsaSigningKey::from_slice(&bytes)
            .map_err(|e| anyhow::anyhow!("Failed to create ECDSA signing key: {}", e))?;

        Ok(Self { signing_key })
    }

    /// Generates a fresh key from the OS random number generator.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self {
            signing_key: EcdsaSigningKey::random(&mut rng),
        }
    }

    pub fn private_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.signing_key.to_bytes()))
    }

    /// Uncompressed SEC1 public key (`0x04 || x || y`).
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    pub fn public_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.public_key_bytes()))
    }

    pub fn address(&self) -> EthAddress {
        address_of(self.signing_key.verifying_key())
    }

    /// Signs a 32-byte digest, returning `r || s || v` with `v` in {27, 28}.
    pub fn sign_prehash(&self, digest: &[u8; 32]) -> Result<Vec<u8>> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| anyhow::anyhow!("Failed to sign precomputed hash: {}", e))?;

        let mut out = Vec::with_capacity(65);
        out.extend_from_slice(&signature.to_bytes());
        out.push(recovery_id.to_byte() + 27);
        Ok(out)
    }

    /// Signs any claim or deposit message.
    pub fn sign<M: SignedMessage>(&self, message: &M) -> Result<Vec<u8>> {
        let digest = message.signing_digest()?;
        self.sign_prehash(&digest)
    }

    /// Signs a message and hex-encodes the signature with a `0x` prefix.
    pub fn sign_hex<M: SignedMessage>(&self, message: &M) -> Result<String> {
        Ok(format!("0x{}", hex::encode(self.sign(message)?)))
    }

    /// Signs a claim message.
    pub fn sign_claim(&self, message: &ClaimMessage) -> Result<Vec<u8>> {
        let signature = self.sign(message)?;
        debug!(
            "Signed claim for item {} by {} (deadline {})",
            message.item_id,
            self.address(),
            message.deadline
        );
        Ok(signature)
    }

    pub fn sign_claim_hex(&self, message: &ClaimMessage) -> Result<String> {
        Ok(format!("0x{}", hex::encode(self.sign_claim(message)?)))
    }
}
