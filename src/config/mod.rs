//! Configuration Management Module
//!
//! This module handles loading and managing configuration for the resource holder service.
//! Configuration includes the custody account, claim timing, API settings and the
//! initial contents of the in-memory registry.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

use crate::address::EthAddress;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "RESOURCE_HOLDER_CONFIG_PATH";

/// Config file used when no override is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/resource-holder.toml";

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Custody and claim settings
    pub holder: HolderConfig,
    /// API server configuration (host, port, CORS settings)
    pub api: ApiConfig,
    /// In-memory registry contents at startup
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Custody account and claim timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderConfig {
    /// Native account that holds escrowed items
    pub account: String,
    /// Upper bound on a single registry transfer in milliseconds.
    /// A transfer that exceeds it is treated as failed and the escrow entry is restored.
    #[serde(default = "default_transfer_timeout_ms")]
    pub transfer_timeout_ms: u64,
    /// Accounts allowed to deposit over the API, each with the Ethereum key
    /// address that signs its deposit authorizations
    #[serde(default)]
    pub depositors: Vec<DepositorConfig>,
}

/// Native account and the address of the key that authorizes its deposits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositorConfig {
    pub account: String,
    pub eth_address: EthAddress,
}

fn default_transfer_timeout_ms() -> u64 {
    10_000
}

impl HolderConfig {
    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }
}

/// Items minted into the in-memory registry when the service starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub seed: Vec<SeedConfig>,
}

/// `count` items minted to `owner`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    pub owner: String,
    pub count: u32,
}

/// API server configuration for external communication.
///
/// Controls how the resource holder exposes its REST API endpoints
/// and handles cross-origin requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host address to bind the API server to
    pub host: String,
    /// Port number to bind the API server to
    pub port: u16,
    /// Allowed CORS origins for cross-origin requests
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

// ============================================================================
// CONFIGURATION LOADING AND MANAGEMENT
// ============================================================================

impl Config {
    /// Validates the configuration.
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Configuration is valid
    /// - `Err(anyhow::Error)` - Empty holder account, zero timeout, unparsable host,
    ///   bad depositor entry or seed without owner
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.holder.account.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "Configuration error: holder.account must not be empty"
            ));
        }

        if self.holder.transfer_timeout_ms == 0 {
            return Err(anyhow::anyhow!(
                "Configuration error: holder.transfer_timeout_ms must be greater than zero"
            ));
        }

        self.api.host.parse::<IpAddr>().map_err(|_| {
            anyhow::anyhow!(
                "Configuration error: api.host '{}' is not a valid IP address",
                self.api.host
            )
        })?;

        for depositor in &self.holder.depositors {
            if depositor.account.trim().is_empty() {
                return Err(anyhow::anyhow!(
                    "Configuration error: holder.depositors entry for {} has an empty account",
                    depositor.eth_address
                ));
            }
            if depositor.account == self.holder.account {
                return Err(anyhow::anyhow!(
                    "Configuration error: holder account {} cannot be a depositor",
                    depositor.account
                ));
            }
        }

        if let Some(seed) = self.registry.seed.iter().find(|s| s.owner.trim().is_empty()) {
            return Err(anyhow::anyhow!(
                "Configuration error: registry seed of {} items has an empty owner",
                seed.count
            ));
        }

        Ok(())
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from the TOML file.
    ///
    /// This function:
    /// 1. Uses `RESOURCE_HOLDER_CONFIG_PATH` if set, else config/resource-holder.toml
    /// 2. If the file exists, loads, parses and validates it
    /// 3. If it doesn't exist, returns an error asking user to copy template
    pub fn load() -> anyhow::Result<Self> {
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml_str(&content)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/resource-holder.template.toml config/resource-holder.toml\n\
                Then edit config/resource-holder.toml with your actual values.",
                config_path
            ))
        }
    }

    /// Creates a default configuration suitable for local development and testing.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self {
            holder: HolderConfig {
                account: "0xf8d6e0586b0a20c7".to_string(),
                transfer_timeout_ms: default_transfer_timeout_ms(),
                depositors: vec![],
            },
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 3340,
                cors_origins: vec!["http://localhost:3340".to_string()],
            },
            registry: RegistryConfig::default(),
        }
    }
}
