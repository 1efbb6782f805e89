//! REST API Server Module
//!
//! Exposes the resource holder over HTTP: escrow an item for an Ethereum
//! address, list what an address can claim, and claim with a signature.

mod generic;

pub use generic::{
    claim_error_status, ApiResponse, ApiServer, ClaimApiRequest, DepositRequest,
};
