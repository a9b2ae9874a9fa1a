//! Configuration management for wallet onboarding

use crate::form::DEFAULT_MAX_SIGNERS;
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

/// Which collaborator creates the wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionerKind {
    /// Derive the counterfactual Safe address locally
    Local,
    /// Ask the wallet relay to deploy the Safe
    Relay,
}

impl FromStr for ProvisionerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" | "counterfactual" => Ok(ProvisionerKind::Local),
            "relay" => Ok(ProvisionerKind::Relay),
            other => anyhow::bail!("Unknown provisioner: {}", other),
        }
    }
}

/// Safe deployment parameters used to derive and deploy wallets
///
/// `factory` and `init_code_hash` describe a proxy factory exposing
/// `createProxyWithNonce`; the hash is keccak256 of the proxy creation code
/// followed by the uint256-padded singleton that factory deploys. Both are
/// deployment specific, so neither has a default.
#[derive(Debug, Clone)]
pub struct SafeConfig {
    /// Chain the wallet lives on (default: 137, Polygon)
    pub chain_id: u64,
    /// Proxy factory address
    pub factory: Option<String>,
    /// keccak256(proxy creation code ++ uint256(singleton))
    pub init_code_hash: Option<String>,
    /// Fallback handler passed to `setup` (default: Safe 1.3.0 compatibility handler)
    pub fallback_handler: String,
    /// Salt nonce mixed into the CREATE2 salt
    pub salt_nonce: u64,
    /// Fixed signer threshold; majority of signers when unset
    pub threshold: Option<usize>,
}

impl Default for SafeConfig {
    fn default() -> Self {
        Self {
            chain_id: 137,
            factory: None,
            init_code_hash: None,
            fallback_handler: "0xf48f2B2d2a534e402487b3ee7C18c33Aec0Fe5e4".to_string(),
            salt_nonce: 0,
            threshold: None,
        }
    }
}

/// Wallet relay settings (relay provisioner only)
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Builder credentials for signed relay requests
    pub api_key: Option<String>,
    pub secret: Option<String>,
    pub passphrase: Option<String>,
}

/// Onboarding configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Collaborator used by `submit`
    pub provisioner: ProvisionerKind,

    /// Maximum signer rows accepted on submit
    pub max_signers: usize,

    /// Safe deployment parameters
    pub safe: SafeConfig,

    /// Relay settings, present when `RELAY_URL` is set
    pub relay: Option<RelayConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provisioner: ProvisionerKind::Local,
            max_signers: DEFAULT_MAX_SIGNERS,
            safe: SafeConfig::default(),
            relay: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let defaults = SafeConfig::default();

        let provisioner = match env::var("PROVISIONER").ok().filter(|s| !s.is_empty()) {
            Some(v) => v.parse()?,
            None => ProvisionerKind::Local,
        };

        let max_signers = env::var("MAX_SIGNERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_SIGNERS);

        let chain_id = env::var("CHAIN_ID")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.chain_id);

        let salt_nonce = env::var("SALT_NONCE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.salt_nonce);

        let threshold = match env::var("SIGNER_THRESHOLD").ok().filter(|s| !s.is_empty()) {
            Some(v) => Some(v.parse().context("SIGNER_THRESHOLD must be a positive integer")?),
            None => None,
        };

        let safe = SafeConfig {
            chain_id,
            factory: env::var("SAFE_FACTORY").ok().filter(|s| !s.is_empty()),
            init_code_hash: env::var("SAFE_INIT_CODE_HASH").ok().filter(|s| !s.is_empty()),
            fallback_handler: env::var("SAFE_FALLBACK_HANDLER").unwrap_or(defaults.fallback_handler),
            salt_nonce,
            threshold,
        };

        let relay = env::var("RELAY_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|url| RelayConfig {
                url: url.trim_end_matches('/').to_string(),
                timeout_seconds: env::var("RELAY_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
                api_key: env::var("POLY_BUILDER_API_KEY").ok().filter(|s| !s.is_empty()),
                secret: env::var("POLY_BUILDER_SECRET").ok().filter(|s| !s.is_empty()),
                passphrase: env::var("POLY_BUILDER_PASSPHRASE").ok().filter(|s| !s.is_empty()),
            });

        // Validate configuration
        if provisioner == ProvisionerKind::Relay && relay.is_none() {
            anyhow::bail!("RELAY_URL required for the relay provisioner");
        }
        if max_signers == 0 {
            anyhow::bail!("MAX_SIGNERS must be at least 1");
        }

        Ok(Self {
            provisioner,
            max_signers,
            safe,
            relay,
        })
    }
}
