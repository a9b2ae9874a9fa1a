//! Wallet provisioning collaborators
//!
//! The form hands a validated, ordered signer list to a `WalletProvisioner` and
//! gets back a wallet identifier or a failure. Two implementations ship here:
//! a local counterfactual address derivation and a relay client that deploys
//! the Safe remotely.

mod counterfactual;
mod relay;

pub use counterfactual::{encode_setup_calldata, CounterfactualProvisioner, ProxyFactory, SafeDeployment};
pub use relay::{BuilderCredentials, RelayProvisioner};

use crate::config::{Config, ProvisionerKind};
use crate::errors::ProvisioningError;
use crate::types::WalletId;
use anyhow::{Context, Result};
use std::future::Future;

/// Creates a wallet for an ordered list of signer addresses.
///
/// Signers arrive EIP-55 checksummed, validated and duplicate-free, in the
/// order the user entered them. Timeouts are the implementation's concern.
pub trait WalletProvisioner: Send + Sync {
    fn create_wallet(
        &self,
        signers: &[String],
    ) -> impl Future<Output = Result<WalletId, ProvisioningError>> + Send;
}

/// Signatures required for `signers` owners: the fixed threshold if set, else a majority
pub fn resolve_threshold(fixed: Option<usize>, signers: usize) -> Result<usize, ProvisioningError> {
    let threshold = fixed.unwrap_or(signers / 2 + 1);
    if threshold == 0 || threshold > signers {
        return Err(ProvisioningError::InvalidThreshold { threshold, signers });
    }
    Ok(threshold)
}

/// Provisioner selected by configuration
pub enum ConfiguredProvisioner {
    Local(CounterfactualProvisioner),
    Relay(RelayProvisioner),
}

impl ConfiguredProvisioner {
    pub fn from_config(config: &Config) -> Result<Self> {
        let deployment = SafeDeployment::from_config(&config.safe)
            .context("Invalid Safe deployment configuration")?;

        match config.provisioner {
            ProvisionerKind::Local => Ok(Self::Local(CounterfactualProvisioner::new(deployment)?)),
            ProvisionerKind::Relay => {
                let relay = config
                    .relay
                    .as_ref()
                    .context("RELAY_URL required for the relay provisioner")?;
                Ok(Self::Relay(RelayProvisioner::new(relay, deployment)?))
            }
        }
    }
}

impl WalletProvisioner for ConfiguredProvisioner {
    async fn create_wallet(&self, signers: &[String]) -> Result<WalletId, ProvisioningError> {
        match self {
            Self::Local(p) => p.create_wallet(signers).await,
            Self::Relay(p) => p.create_wallet(signers).await,
        }
    }
}
