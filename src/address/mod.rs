//! Ethereum Address Codec
//!
//! Derives the 20-byte Ethereum address that an escrow is keyed by from a raw
//! secp256k1 public key:
//!
//! ```text
//! address = keccak256(x || y)[12..32]
//! ```
//!
//! where `x || y` are the 64 bytes of the uncompressed point without its
//! `0x04` SEC1 tag.

use elliptic_curve::subtle::ConstantTimeEq;
use k256::ecdsa::VerifyingKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

use crate::error::ClaimError;

/// Length of an Ethereum address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// SEC1 tag of an uncompressed curve point.
const UNCOMPRESSED_TAG: u8 = 0x04;

// ============================================================================
// ADDRESS TYPE
// ============================================================================

/// Ethereum-style account address.
///
/// Used only as an opaque lookup key for escrowed items; it is never treated
/// as key material.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EthAddress([u8; ADDRESS_LEN]);

impl EthAddress {
    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Compares two addresses without short-circuiting on the first differing byte.
    pub fn ct_eq(&self, other: &EthAddress) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EthAddress({})", self)
    }
}

/// Error returned when a string is not a `0x`-prefixed 40-hex-digit address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid Ethereum address: {0}")]
pub struct ParseAddressError(String);

impl FromStr for EthAddress {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_part = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if hex_part.len() != ADDRESS_LEN * 2 {
            return Err(ParseAddressError(s.to_string()));
        }

        let mut bytes = [0u8; ADDRESS_LEN];
        hex::decode_to_slice(hex_part, &mut bytes).map_err(|_| ParseAddressError(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for EthAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EthAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// DERIVATION
// ============================================================================

/// Decodes a secp256k1 public key given in uncompressed form.
///
/// Accepts either the 65-byte SEC1 encoding (`0x04 || x || y`) or the bare
/// 64-byte `x || y` form most wallets export. The point must lie on the curve.
pub fn decode_public_key(public_key: &[u8]) -> Result<VerifyingKey, ClaimError> {
    let sec1 = match public_key.len() {
        65 if public_key[0] == UNCOMPRESSED_TAG => public_key.to_vec(),
        64 => {
            let mut tagged = Vec::with_capacity(65);
            tagged.push(UNCOMPRESSED_TAG);
            tagged.extend_from_slice(public_key);
            tagged
        }
        _ => return Err(ClaimError::InvalidKeyEncoding),
    };

    VerifyingKey::from_sec1_bytes(&sec1).map_err(|_| ClaimError::InvalidKeyEncoding)
}

/// Decodes a hex public key (with or without `0x`) into raw bytes.
pub fn parse_public_key_hex(public_key: &str) -> Result<Vec<u8>, ClaimError> {
    let hex_part = public_key.strip_prefix("0x").unwrap_or(public_key);
    hex::decode(hex_part).map_err(|_| ClaimError::InvalidKeyEncoding)
}

/// Derives the Ethereum address of a raw public key.
///
/// # Returns
///
/// * `Ok(EthAddress)` - Last 20 bytes of `keccak256(x || y)`
/// * `Err(ClaimError::InvalidKeyEncoding)` - Wrong length, wrong tag, or not a curve point
pub fn derive_address(public_key: &[u8]) -> Result<EthAddress, ClaimError> {
    let verifying_key = decode_public_key(public_key)?;
    Ok(address_of(&verifying_key))
}

/// Ethereum address of an already decoded verifying key.
pub fn address_of(verifying_key: &VerifyingKey) -> EthAddress {
    let point = verifying_key.to_encoded_point(false);

    let mut hasher = Keccak256::new();
    hasher.update(&point.as_bytes()[1..]);
    let hash = hasher.finalize();

    let mut address = [0u8; ADDRESS_LEN];
    address.copy_from_slice(&hash[12..32]);
    EthAddress(address)
}
