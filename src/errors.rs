//! Error taxonomy for the wallet creation form and its provisioners
//!
//! `FormError` is what form operations return. `ProvisioningError` is what a
//! provisioning collaborator returns; the form folds it into
//! `FormError::Collaborator` with the user-facing reason.

use crate::address::AddressIssue;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single problem found while validating the signer list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// No signer entries at all
    EmptyList,
    /// Entry at `index` is not a usable address
    Malformed { index: usize, issue: AddressIssue },
    /// Entry at `index` repeats the address first entered at `first`
    Duplicate { index: usize, first: usize },
    /// More signers than the configured maximum
    TooManySigners { count: usize, max: usize },
}

impl ValidationIssue {
    /// Entry this issue should be shown next to, if any
    pub fn index(&self) -> Option<usize> {
        match self {
            ValidationIssue::Malformed { index, .. } | ValidationIssue::Duplicate { index, .. } => {
                Some(*index)
            }
            ValidationIssue::EmptyList | ValidationIssue::TooManySigners { .. } => None,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyList => write!(f, "add at least one signer address"),
            ValidationIssue::Malformed { index, issue } => {
                write!(f, "signer #{}: {}", index + 1, issue)
            }
            ValidationIssue::Duplicate { index, first } => {
                write!(f, "signer #{} duplicates signer #{}", index + 1, first + 1)
            }
            ValidationIssue::TooManySigners { count, max } => {
                write!(f, "{} signers entered, at most {} allowed", count, max)
            }
        }
    }
}

/// Every issue found in one validation pass, in entry order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues attached to a specific entry
    pub fn for_entry(&self, index: usize) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.index() == Some(index))
    }

    /// Indexes of malformed entries
    pub fn malformed_indexes(&self) -> Vec<usize> {
        self.issues
            .iter()
            .filter_map(|i| match i {
                ValidationIssue::Malformed { index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.issues.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", lines.join("; "))
    }
}

/// Errors returned by form operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    /// One or more entries malformed, list empty, or duplicates present
    #[error("invalid signer list: {0}")]
    Validation(ValidationReport),
    /// A submission is already in flight
    #[error("a submission is already in progress")]
    AlreadySubmitting,
    /// The provisioning collaborator failed
    #[error("wallet creation failed: {0}")]
    Collaborator(String),
    /// Field index outside the current list
    #[error("signer index {index} out of bounds (len {len})")]
    InvalidIndex { index: usize, len: usize },
    /// Removal would leave the list without entries
    #[error("at least one signer field must remain")]
    MinimumEntriesViolation,
}

impl FormError {
    /// Whether this error is shown to the user (vs. an internal invariant violation)
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            FormError::InvalidIndex { .. } | FormError::MinimumEntriesViolation
        )
    }

    /// Whether pressing submit again may succeed without editing the list
    pub fn is_retryable(&self) -> bool {
        matches!(self, FormError::Collaborator(_))
    }

    /// Human-readable message for inline display
    pub fn user_message(&self) -> String {
        match self {
            FormError::Validation(report) => format!("Please fix the signer list: {}.", report),
            FormError::AlreadySubmitting => {
                "Wallet creation is already in progress. Please wait.".to_string()
            }
            FormError::Collaborator(reason) => {
                format!("Wallet creation failed: {}. You can submit again.", reason)
            }
            FormError::InvalidIndex { .. } | FormError::MinimumEntriesViolation => {
                "Something went wrong updating the form.".to_string()
            }
        }
    }
}

/// Errors returned by a wallet provisioning collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisioningError {
    /// Threshold is zero or exceeds the signer count
    #[error("threshold {threshold} is invalid for {signers} signers")]
    InvalidThreshold { threshold: usize, signers: usize },
    /// Relay refused the signer set
    #[error("request rejected: {0}")]
    Rejected(String),
    /// Relay credentials missing or refused
    #[error("relay authentication failed")]
    Unauthorized,
    /// Relay rate limit hit
    #[error("relay rate limit reached")]
    RateLimited,
    /// Timeout, DNS, connection failures
    #[error("network error: {0}")]
    Network(String),
    /// Relay answered 2xx without a usable wallet identifier
    #[error("malformed relay response: {0}")]
    MalformedResponse(String),
    /// Anything else, with status and body
    #[error("relay error {status}: {body}")]
    Unknown { status: u16, body: String },
}

/// Relay error response format
#[derive(Debug, Deserialize)]
struct RelayErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ProvisioningError {
    /// Classify a non-success relay response
    pub fn from_response(status: u16, body: &str) -> Self {
        let error_msg = match serde_json::from_str::<RelayErrorResponse>(body) {
            Ok(parsed) => parsed.error.or(parsed.message).unwrap_or_default(),
            Err(_) => body.to_string(),
        };

        let msg_lower = error_msg.to_lowercase();

        if status == 429 || msg_lower.contains("rate limit") || msg_lower.contains("too many requests") {
            return ProvisioningError::RateLimited;
        }

        if status == 401
            || status == 403
            || msg_lower.contains("unauthorized")
            || msg_lower.contains("invalid api key")
            || msg_lower.contains("invalid signature")
        {
            return ProvisioningError::Unauthorized;
        }

        if status == 400 || status == 409 || status == 422 {
            let reason = if error_msg.is_empty() {
                format!("status {}", status)
            } else {
                error_msg
            };
            return ProvisioningError::Rejected(reason);
        }

        ProvisioningError::Unknown {
            status,
            body: error_msg,
        }
    }

    /// Map a reqwest transport error
    pub fn from_network_error(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ProvisioningError::Network("request timed out".to_string())
        } else if err.is_connect() {
            ProvisioningError::Network("connection failed".to_string())
        } else {
            ProvisioningError::Network(err.to_string())
        }
    }

    /// Reason string surfaced to the user
    pub fn user_message(&self) -> String {
        match self {
            ProvisioningError::InvalidThreshold { threshold, signers } => format!(
                "a threshold of {} cannot be met by {} signer(s)",
                threshold, signers
            ),
            ProvisioningError::Rejected(reason) => format!("the wallet service rejected the request ({})", reason),
            ProvisioningError::Unauthorized => "the wallet service refused our credentials".to_string(),
            ProvisioningError::RateLimited => "too many requests, wait a moment".to_string(),
            ProvisioningError::Network(msg) => format!("network error ({})", msg),
            ProvisioningError::MalformedResponse(_) => {
                "the wallet service returned an unexpected response".to_string()
            }
            ProvisioningError::Unknown { status, .. } => {
                format!("the wallet service returned error {}", status)
            }
        }
    }
}

impl From<ProvisioningError> for FormError {
    fn from(err: ProvisioningError) -> Self {
        FormError::Collaborator(err.user_message())
    }
}
