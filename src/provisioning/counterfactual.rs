//! Counterfactual Safe address derivation
//!
//! Derives the address a multi-owner Gnosis Safe proxy will have once the
//! factory deploys it with `createProxyWithNonce`. Uses CREATE2:
//! address = keccak256(0xff ++ factory ++ salt ++ init_code_hash)[12:]
//! where salt = keccak256(keccak256(initializer) ++ saltNonce).

use super::{resolve_threshold, WalletProvisioner};
use crate::address::normalize;
use crate::config::SafeConfig;
use crate::errors::ProvisioningError;
use crate::types::WalletId;
use alloy::primitives::{keccak256, Address, B256, U256};
use anyhow::{Context, Result};
use tracing::{debug, info};

/// CREATE2 inputs of a factory exposing `createProxyWithNonce`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyFactory {
    pub address: Address,
    /// keccak256 of the proxy creation code ++ uint256(singleton) this factory deploys
    pub init_code_hash: B256,
}

impl ProxyFactory {
    /// Address of the proxy created from `initializer` with `salt_nonce`
    pub fn predict_address(&self, initializer: &[u8], salt_nonce: u64) -> Address {
        // Salt = keccak256(keccak256(initializer) ++ uint256(saltNonce))
        let mut salt_input = Vec::with_capacity(64);
        salt_input.extend_from_slice(keccak256(initializer).as_slice());
        salt_input.extend_from_slice(&U256::from(salt_nonce).to_be_bytes::<32>());
        let salt = keccak256(&salt_input);

        // CREATE2: keccak256(0xff ++ factory ++ salt ++ init_code_hash)
        let mut data = Vec::with_capacity(1 + 20 + 32 + 32);
        data.push(0xff);
        data.extend_from_slice(self.address.as_slice());
        data.extend_from_slice(salt.as_slice());
        data.extend_from_slice(self.init_code_hash.as_slice());

        let hash = keccak256(&data);
        // Take last 20 bytes as address
        Address::from_slice(&hash[12..])
    }
}

/// Parsed Safe deployment parameters
#[derive(Debug, Clone)]
pub struct SafeDeployment {
    pub chain_id: u64,
    pub fallback_handler: Address,
    pub salt_nonce: u64,
    pub threshold: Option<usize>,
    /// None when no factory is configured; addresses cannot be predicted then
    pub factory: Option<ProxyFactory>,
}

impl SafeDeployment {
    pub fn from_config(config: &SafeConfig) -> Result<Self> {
        let factory = match (&config.factory, &config.init_code_hash) {
            (Some(address), Some(init_code_hash)) => Some(ProxyFactory {
                address: address.parse().context("Invalid factory address")?,
                init_code_hash: init_code_hash.parse().context("Invalid init code hash")?,
            }),
            (None, None) => None,
            _ => anyhow::bail!("SAFE_FACTORY and SAFE_INIT_CODE_HASH must be set together"),
        };

        Ok(Self {
            chain_id: config.chain_id,
            fallback_handler: config
                .fallback_handler
                .parse()
                .context("Invalid fallback handler address")?,
            salt_nonce: config.salt_nonce,
            threshold: config.threshold,
            factory,
        })
    }

    /// Predict the proxy address for an ordered owner list, if a factory is configured
    pub fn predict_address(&self, owners: &[Address], threshold: usize) -> Option<Address> {
        let factory = self.factory.as_ref()?;
        let initializer = encode_setup_calldata(owners, threshold, &self.fallback_handler);
        Some(factory.predict_address(&initializer, self.salt_nonce))
    }
}

/// Left-pad an address to a 32-byte ABI word
fn address_word(address: &Address) -> [u8; 32] {
    let mut padded = [0u8; 32];
    padded[12..].copy_from_slice(address.as_slice());
    padded
}

/// Build Safe setup calldata:
/// setup(address[] owners, uint256 threshold, address to, bytes data,
///       address fallbackHandler, address paymentToken, uint256 payment, address paymentReceiver)
///
/// `to`, `data`, `paymentToken`, `payment` and `paymentReceiver` are all zero/empty.
pub fn encode_setup_calldata(owners: &[Address], threshold: usize, fallback_handler: &Address) -> Vec<u8> {
    const HEAD_WORDS: usize = 8;

    // Function selector: keccak256("setup(...)")[:4] = 0xb63e800d
    let selector = &keccak256(b"setup(address[],uint256,address,bytes,address,address,uint256,address)")[..4];

    let owners_offset = HEAD_WORDS * 32;
    // owners tail = length word + one word per owner
    let data_offset = owners_offset + 32 + owners.len() * 32;

    let mut calldata = Vec::with_capacity(4 + data_offset + 32);
    calldata.extend_from_slice(selector);

    // Head
    calldata.extend_from_slice(&U256::from(owners_offset).to_be_bytes::<32>()); // owners offset
    calldata.extend_from_slice(&U256::from(threshold).to_be_bytes::<32>()); // threshold
    calldata.extend_from_slice(&[0u8; 32]); // to = address(0)
    calldata.extend_from_slice(&U256::from(data_offset).to_be_bytes::<32>()); // data offset
    calldata.extend_from_slice(&address_word(fallback_handler)); // fallbackHandler
    calldata.extend_from_slice(&[0u8; 32]); // paymentToken = address(0)
    calldata.extend_from_slice(&[0u8; 32]); // payment = 0
    calldata.extend_from_slice(&[0u8; 32]); // paymentReceiver = address(0)

    // Tail: owners
    calldata.extend_from_slice(&U256::from(owners.len()).to_be_bytes::<32>());
    for owner in owners {
        calldata.extend_from_slice(&address_word(owner));
    }

    // Tail: data (empty bytes)
    calldata.extend_from_slice(&[0u8; 32]);

    calldata
}

/// Provisioner that computes the wallet address locally without touching the chain
#[derive(Debug, Clone)]
pub struct CounterfactualProvisioner {
    deployment: SafeDeployment,
    factory: ProxyFactory,
}

impl CounterfactualProvisioner {
    /// Fails when the deployment has no proxy factory to derive from
    pub fn new(deployment: SafeDeployment) -> Result<Self> {
        let factory = deployment
            .factory
            .context("SAFE_FACTORY and SAFE_INIT_CODE_HASH required for counterfactual addresses")?;
        Ok(Self { deployment, factory })
    }

    /// Predicted checksummed address for already-validated signer strings
    pub fn predict(&self, signers: &[String]) -> Result<String, ProvisioningError> {
        let owners = signers
            .iter()
            .map(|s| {
                s.parse::<Address>()
                    .map_err(|e| ProvisioningError::Rejected(format!("invalid signer {}: {}", s, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let threshold = resolve_threshold(self.deployment.threshold, owners.len())?;
        let initializer = encode_setup_calldata(&owners, threshold, &self.deployment.fallback_handler);
        let address = self.factory.predict_address(&initializer, self.deployment.salt_nonce);
        debug!(
            "[Counterfactual] {} owners, threshold {}, nonce {} -> {}",
            owners.len(),
            threshold,
            self.deployment.salt_nonce,
            address
        );
        Ok(normalize(&address))
    }
}

impl WalletProvisioner for CounterfactualProvisioner {
    async fn create_wallet(&self, signers: &[String]) -> Result<WalletId, ProvisioningError> {
        let address = self.predict(signers)?;
        info!("[Counterfactual] Derived Safe {} for {} signers", address, signers.len());
        Ok(WalletId::new(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owners() -> Vec<Address> {
        vec![
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap(),
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359".parse().unwrap(),
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB".parse().unwrap(),
        ]
    }

    fn signer_strings() -> Vec<String> {
        owners().iter().map(normalize).collect()
    }

    /// Stand-in factory; derivation tests only compare addresses with each other
    fn test_deployment() -> SafeDeployment {
        SafeDeployment::from_config(&SafeConfig {
            factory: Some("0xa6B71E26C5e0845f74c812102Ca7114b6a896AB2".to_string()),
            init_code_hash: Some(format!("0x{}", hex::encode(keccak256(b"proxy creation code")))),
            ..SafeConfig::default()
        })
        .unwrap()
    }

    fn provisioner_with(deployment: SafeDeployment) -> CounterfactualProvisioner {
        CounterfactualProvisioner::new(deployment).unwrap()
    }

    #[test]
    fn test_setup_selector() {
        let calldata = encode_setup_calldata(&owners(), 2, &Address::ZERO);
        assert_eq!(hex::encode(&calldata[..4]), "b63e800d");
    }

    #[test]
    fn test_setup_layout() {
        let owners = owners();
        let handler: Address = "0xf48f2B2d2a534e402487b3ee7C18c33Aec0Fe5e4".parse().unwrap();
        let calldata = encode_setup_calldata(&owners, 2, &handler);

        // selector + 8 head words + owners length + 3 owners + data length
        assert_eq!(calldata.len(), 4 + 32 * (8 + 1 + 3 + 1));

        let word = |i: usize| &calldata[4 + i * 32..4 + (i + 1) * 32];
        assert_eq!(U256::from_be_slice(word(0)), U256::from(256));
        assert_eq!(U256::from_be_slice(word(1)), U256::from(2));
        assert_eq!(U256::from_be_slice(word(3)), U256::from(256 + 32 + 3 * 32));
        assert_eq!(&word(4)[12..], handler.as_slice());
        assert_eq!(U256::from_be_slice(word(8)), U256::from(3));
        assert_eq!(&word(9)[12..], owners[0].as_slice());
        assert_eq!(&word(11)[12..], owners[2].as_slice());
        assert_eq!(U256::from_be_slice(word(12)), U256::ZERO);
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let provisioner = provisioner_with(test_deployment());
        let a = provisioner.predict(&signer_strings()).unwrap();
        let b = provisioner.predict(&signer_strings()).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("0x"));
        assert_eq!(a.len(), 42);
    }

    #[test]
    fn test_signer_order_changes_address() {
        let provisioner = provisioner_with(test_deployment());
        let mut reversed = signer_strings();
        reversed.reverse();
        assert_ne!(
            provisioner.predict(&signer_strings()).unwrap(),
            provisioner.predict(&reversed).unwrap()
        );
    }

    #[test]
    fn test_salt_nonce_changes_address() {
        let first = provisioner_with(test_deployment());
        let second = provisioner_with(SafeDeployment {
            salt_nonce: 1,
            ..test_deployment()
        });
        assert_ne!(
            first.predict(&signer_strings()).unwrap(),
            second.predict(&signer_strings()).unwrap()
        );
    }

    #[tokio::test]
    async fn test_create_wallet_returns_prediction() {
        let provisioner = provisioner_with(test_deployment());
        let id = provisioner.create_wallet(&signer_strings()).await.unwrap();
        assert_eq!(id.as_str(), provisioner.predict(&signer_strings()).unwrap());
    }

    #[tokio::test]
    async fn test_threshold_above_signers_fails() {
        let provisioner = provisioner_with(SafeDeployment {
            threshold: Some(4),
            ..test_deployment()
        });
        let err = provisioner.create_wallet(&signer_strings()).await.unwrap_err();
        assert_eq!(err, ProvisioningError::InvalidThreshold { threshold: 4, signers: 3 });
    }

    #[test]
    fn test_init_code_hash_changes_address() {
        let first = provisioner_with(test_deployment());
        let mut other = test_deployment();
        other.factory = other.factory.map(|f| ProxyFactory {
            init_code_hash: keccak256(b"other proxy creation code"),
            ..f
        });
        let second = provisioner_with(other);
        assert_ne!(
            first.predict(&signer_strings()).unwrap(),
            second.predict(&signer_strings()).unwrap()
        );
    }

    #[test]
    fn test_matches_manual_create2() {
        let deployment = test_deployment();
        let factory = deployment.factory.unwrap();
        let owners = owners();
        let initializer = encode_setup_calldata(&owners, 2, &deployment.fallback_handler);

        let mut salt_input = keccak256(&initializer).to_vec();
        salt_input.extend_from_slice(&[0u8; 32]);
        let mut data = vec![0xff];
        data.extend_from_slice(factory.address.as_slice());
        data.extend_from_slice(keccak256(&salt_input).as_slice());
        data.extend_from_slice(factory.init_code_hash.as_slice());
        let expected = Address::from_slice(&keccak256(&data)[12..]);

        assert_eq!(deployment.predict_address(&owners, 2), Some(expected));
    }

    #[test]
    fn test_without_factory_cannot_predict() {
        let deployment = SafeDeployment::from_config(&SafeConfig::default()).unwrap();
        assert!(deployment.factory.is_none());
        assert_eq!(deployment.predict_address(&owners(), 2), None);
        assert!(CounterfactualProvisioner::new(deployment).is_err());
    }

    #[test]
    fn test_factory_needs_init_code_hash() {
        let config = SafeConfig {
            factory: Some("0xa6B71E26C5e0845f74c812102Ca7114b6a896AB2".to_string()),
            ..SafeConfig::default()
        };
        assert!(SafeDeployment::from_config(&config).is_err());
    }
}
