//! Resource Holder Service
//!
//! Holds NFTs in escrow for Ethereum addresses and releases them to native
//! accounts when the address owner proves control with a signature.
//!
//! ## Overview
//!
//! The service:
//! 1. Accepts deposits of items into escrow, keyed by Ethereum address
//! 2. Lists the items waiting for an address
//! 3. Verifies claim signatures and transfers claimed items exactly once

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use resource_holder::api::ApiServer;
use resource_holder::clock::SystemClock;
use resource_holder::config::{Config, CONFIG_PATH_ENV};
use resource_holder::holder::ResourceHolder;
use resource_holder::registry::InMemoryRegistry;

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

/// Main application entry point that initializes and runs the resource holder service.
///
/// This function:
/// 1. Initializes logging and tracing
/// 2. Loads configuration from TOML file
/// 3. Seeds the in-memory registry and builds the holder
/// 4. Runs the API server until shutdown
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging for debugging and monitoring
    tracing_subscriber::fmt::init();

    info!("Starting Resource Holder Service");

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("Resource Holder Service");
        println!();
        println!("Usage: resource-holder [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --config <path>   Use custom config file path");
        println!("  --help, -h        Show this help message");
        println!();
        println!("Environment variables:");
        println!("  {}    Path to config file", CONFIG_PATH_ENV);
        return Ok(());
    }

    let mut i = 1; // Skip program name
    while i < args.len() {
        if args[i] == "--config" && i + 1 < args.len() {
            std::env::set_var(CONFIG_PATH_ENV, &args[i + 1]);
            info!("Using custom config: {}", args[i + 1]);
            i += 1;
        }
        i += 1;
    }

    let config = Config::load()?;
    info!("Configuration loaded successfully");

    let registry = Arc::new(InMemoryRegistry::new());
    let minted = registry.seed(&config.registry).await;
    info!("Registry seeded with {} items", minted);

    let holder = Arc::new(ResourceHolder::from_config(
        &config.holder,
        registry,
        Arc::new(SystemClock),
    ));
    info!("Holding items in account {}", holder.holder_account());

    let api_server = ApiServer::new(config, holder);

    // Run the service (this blocks until shutdown)
    api_server.run().await
}
