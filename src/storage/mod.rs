//! Storage Module
//!
//! This module provides storage for the resource holder service: the escrow
//! ledger of items awaiting a claim.

pub mod escrow_ledger;

// Re-export for convenience
pub use escrow_ledger::{EscrowEntry, EscrowLedger};
