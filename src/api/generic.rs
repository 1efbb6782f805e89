//! Generic API structures and handlers
//!
//! This module contains the request/response structures, warp filter helpers
//! and handlers for the resource holder REST API.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{error, info};
use warp::{http::StatusCode, Filter, Rejection, Reply};

use crate::address::EthAddress;
use crate::config::Config;
use crate::error::ClaimError;
use crate::holder::{ClaimRequest, DepositAuthorization, ResourceHolder};
use crate::registry::AssetRegistry;
use crate::types::{AccountId, ItemId};

// ============================================================================
// SHARED REQUEST/RESPONSE STRUCTURES
// ============================================================================

/// Standardized response structure for all API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (if successful)
    pub data: Option<T>,
    /// Error message (if failed)
    pub error: Option<String>,
}

/// Body of `POST /deposit`.
///
/// Signed by the Ethereum key registered for `depositor` in `[holder]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    /// Account currently owning the item
    pub depositor: AccountId,
    pub item_id: ItemId,
    /// Address that will be able to claim the item
    pub eth_address: EthAddress,
    /// Unix seconds
    pub deadline: u64,
    /// Uncompressed secp256k1 public key of the depositor's key (hex)
    pub public_key: String,
    /// Signature over the deposit message (hex, `r || s || v`)
    pub signature: String,
}

impl From<DepositRequest> for DepositAuthorization {
    fn from(request: DepositRequest) -> Self {
        Self {
            depositor: request.depositor,
            item_id: request.item_id,
            foreign_address: request.eth_address,
            deadline: request.deadline,
            public_key: request.public_key,
            signature: request.signature,
        }
    }
}

/// Body of `POST /claim`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimApiRequest {
    /// Uncompressed secp256k1 public key (hex)
    pub public_key: String,
    /// Signature over the claim message (hex, `r || s || v`)
    pub signature: String,
    pub eth_address: EthAddress,
    pub item_id: ItemId,
    /// Unix seconds
    pub deadline: u64,
    /// Account that receives the item
    pub claimant: AccountId,
}

impl ClaimApiRequest {
    fn split(self) -> (ClaimRequest, AccountId) {
        (
            ClaimRequest {
                public_key: self.public_key,
                signature: self.signature,
                foreign_address: self.eth_address,
                item_id: self.item_id,
                deadline: self.deadline,
            },
            self.claimant,
        )
    }
}

// ============================================================================
// RESPONSE HELPERS
// ============================================================================

/// HTTP status reported for each claim error.
pub fn claim_error_status(err: &ClaimError) -> StatusCode {
    match err {
        ClaimError::InvalidKeyEncoding => StatusCode::BAD_REQUEST,
        ClaimError::AddressMismatch
        | ClaimError::InvalidSignature
        | ClaimError::UnauthorizedDepositor => StatusCode::FORBIDDEN,
        ClaimError::ClaimExpired => StatusCode::GONE,
        ClaimError::NoSuchEscrowedItem => StatusCode::NOT_FOUND,
        ClaimError::ItemNotOwnedByDepositor | ClaimError::ItemAlreadyEscrowed => {
            StatusCode::CONFLICT
        }
        ClaimError::RegistryTransferFailed => StatusCode::BAD_GATEWAY,
    }
}

fn success_reply<T: Serialize>(data: T) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }),
        StatusCode::OK,
    )
}

fn error_reply(status: StatusCode, message: String) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
        }),
        status,
    )
}

// ============================================================================
// HANDLERS
// ============================================================================

/// Handler for `POST /deposit`.
pub async fn deposit_handler<R: AssetRegistry>(
    request: DepositRequest,
    holder: Arc<ResourceHolder<R>>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let auth = DepositAuthorization::from(request);
    match holder.authorized_deposit(&auth).await {
        Ok(entry) => Ok(success_reply(entry)),
        Err(e) => Ok(error_reply(claim_error_status(&e), e.to_string())),
    }
}

/// Handler for `GET /escrow/:eth_address/items`.
pub async fn list_items_handler<R: AssetRegistry>(
    eth_address: String,
    holder: Arc<ResourceHolder<R>>,
) -> Result<impl warp::Reply, warp::Rejection> {
    match eth_address.parse::<EthAddress>() {
        Ok(address) => Ok(success_reply(holder.list_items(&address).await)),
        Err(e) => Ok(error_reply(StatusCode::BAD_REQUEST, e.to_string())),
    }
}

/// Handler for `POST /claim`.
pub async fn claim_handler<R: AssetRegistry>(
    request: ClaimApiRequest,
    holder: Arc<ResourceHolder<R>>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let (claim, claimant) = request.split();
    match holder.claim(&claim, &claimant).await {
        Ok(receipt) => Ok(success_reply(receipt)),
        Err(e) => Ok(error_reply(claim_error_status(&e), e.to_string())),
    }
}

// ============================================================================
// WARP FILTER HELPERS
// ============================================================================

/// Creates a warp filter that provides access to the resource holder.
pub fn with_holder<R: AssetRegistry + 'static>(
    holder: Arc<ResourceHolder<R>>,
) -> impl Filter<Extract = (Arc<ResourceHolder<R>>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || holder.clone())
}

// ============================================================================
// REJECTION HANDLER
// ============================================================================

/// Global rejection handler for all API routes.
///
/// Converts warp rejections into standardized API responses with appropriate
/// HTTP status codes.
pub async fn handle_rejection(rej: Rejection) -> Result<impl Reply, std::convert::Infallible> {
    let (status, message) = if let Some(err) = rej.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid JSON: {}", err))
    } else if rej.is_not_found() {
        (StatusCode::NOT_FOUND, "Endpoint not found".to_string())
    } else if rej.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        error!("Unhandled rejection: {:?}", rej);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    Ok(error_reply(status, message))
}

// ============================================================================
// API SERVER IMPLEMENTATION
// ============================================================================

/// REST API server exposing deposit, listing and claim.
pub struct ApiServer<R: AssetRegistry + 'static> {
    config: Arc<Config>,
    holder: Arc<ResourceHolder<R>>,
}

impl<R: AssetRegistry + 'static> ApiServer<R> {
    pub fn new(config: Config, holder: Arc<ResourceHolder<R>>) -> Self {
        Self {
            config: Arc::new(config),
            holder,
        }
    }

    /// Starts the API server and serves until the process is stopped.
    pub async fn run(&self) -> Result<()> {
        let host: IpAddr = self.config.api.host.parse()?;
        info!("Starting API server on {}:{}", host, self.config.api.port);

        let cors = warp::cors()
            .allow_methods(vec!["GET", "POST"])
            .allow_headers(vec!["content-type"]);
        let cors = if self.config.api.cors_origins.is_empty() {
            cors.allow_any_origin()
        } else {
            cors.allow_origins(self.config.api.cors_origins.iter().map(String::as_str))
        };

        warp::serve(self.create_routes().with(cors))
            .run((host, self.config.api.port))
            .await;

        Ok(())
    }

    /// Creates all API routes for the server.
    pub(crate) fn create_routes(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        let holder = self.holder.clone();

        // Health check endpoint - returns service status
        let health = warp::path("health")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| {
                warp::reply::json(&ApiResponse::<String> {
                    success: true,
                    data: Some("Resource Holder Service is running".to_string()),
                    error: None,
                })
            });

        // POST /deposit - escrow an item for an Ethereum address
        let deposit = warp::path("deposit")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::body::json())
            .and(with_holder(holder.clone()))
            .and_then(deposit_handler::<R>);

        // GET /escrow/:eth_address/items - item ids waiting for an address
        let list_items = warp::path("escrow")
            .and(warp::path::param::<String>())
            .and(warp::path("items"))
            .and(warp::path::end())
            .and(warp::get())
            .and(with_holder(holder.clone()))
            .and_then(list_items_handler::<R>);

        // POST /claim - claim an item with a signature from the address key
        let claim = warp::path("claim")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::body::json())
            .and(with_holder(holder))
            .and_then(claim_handler::<R>);

        health
            .or(deposit)
            .or(list_items)
            .or(claim)
            .recover(handle_rejection)
    }

    /// Public method for testing - exposes routes for integration tests
    pub fn test_routes(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        self.create_routes()
    }
}
