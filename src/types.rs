//! Core types for the wallet creation form

use crate::address::{check_address, AddressIssue};
use crate::errors::ValidationReport;
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier handed back by a provisioner on success
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(String);

impl WalletId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One signer input row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerAddressEntry {
    /// Text exactly as the user typed it
    pub raw: String,
}

impl SignerAddressEntry {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Parsed address, or why the raw text is not one
    pub fn validity(&self) -> Result<Address, AddressIssue> {
        check_address(&self.raw)
    }

    pub fn is_valid(&self) -> bool {
        self.validity().is_ok()
    }
}

/// Outcome of the last hand-off to the provisioner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionResult {
    Created { wallet_id: WalletId },
    Failed { reason: String },
}

impl SubmissionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionResult::Created { .. })
    }
}

impl fmt::Display for SubmissionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionResult::Created { wallet_id } => write!(f, "{}", wallet_id),
            SubmissionResult::Failed { reason } => write!(f, "{}", reason),
        }
    }
}

/// Form lifecycle: Idle -> Validating -> Submitting -> (Succeeded | Failed)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormPhase {
    #[default]
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

impl FormPhase {
    /// Succeeded and Failed fall back to Idle on the next edit
    pub fn is_terminal(&self) -> bool {
        matches!(self, FormPhase::Succeeded | FormPhase::Failed)
    }
}

impl fmt::Display for FormPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormPhase::Idle => write!(f, "IDLE"),
            FormPhase::Validating => write!(f, "VALIDATING"),
            FormPhase::Submitting => write!(f, "SUBMITTING"),
            FormPhase::Succeeded => write!(f, "SUCCEEDED"),
            FormPhase::Failed => write!(f, "FAILED"),
        }
    }
}

/// Per-row view for a rendering layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryView {
    pub raw: String,
    pub valid: bool,
    pub issue: Option<AddressIssue>,
}

impl From<&SignerAddressEntry> for EntryView {
    fn from(entry: &SignerAddressEntry) -> Self {
        let issue = entry.validity().err();
        Self {
            raw: entry.raw.clone(),
            valid: issue.is_none(),
            issue,
        }
    }
}

/// Everything a rendering layer needs to draw the form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormSnapshot {
    pub entries: Vec<EntryView>,
    pub phase: FormPhase,
    pub result: Option<SubmissionResult>,
    /// Issues from the last rejected submit, cleared on the next edit
    pub report: Option<ValidationReport>,
}
