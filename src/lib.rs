//! Smart-contract wallet onboarding
//!
//! The signer-collection step of creating a multi-owner smart-contract wallet:
//!
//! 1. **Form**: users add, edit and remove signer address rows. On submit the
//!    whole list is validated at once (format, duplicates, size).
//! 2. **Provisioning**: a clean list is handed, in order, to a collaborator
//!    that creates the wallet. Either a local counterfactual Safe address
//!    derivation or a remote relay.

pub mod address;
pub mod config;
pub mod errors;
pub mod form;
pub mod provisioning;
pub mod types;

pub use address::{check_address, normalize, AddressIssue};
pub use config::{Config, ProvisionerKind};
pub use errors::{FormError, ProvisioningError, ValidationIssue, ValidationReport};
pub use form::{validate_signers, WalletCreationForm};
pub use provisioning::{ConfiguredProvisioner, CounterfactualProvisioner, RelayProvisioner, WalletProvisioner};
pub use types::{FormPhase, FormSnapshot, SignerAddressEntry, SubmissionResult, WalletId};
