//! Wallet creation form
//!
//! Holds the ordered signer rows, validates them as a whole on submit and hands
//! the normalized list to a provisioning collaborator. State changes are
//! published as `FormSnapshot`s on a watch channel for whatever draws the form.
//!
//! Removal policy: removing the last remaining row is refused with
//! `FormError::MinimumEntriesViolation`; the list is left untouched.
//!
//! While a submission is in flight the list is frozen: edits, resets and a
//! second submit are all refused with `FormError::AlreadySubmitting`. If the
//! pending submit future is dropped the form lands in `Failed` instead.

use crate::address::normalize;
use crate::errors::{FormError, ValidationIssue, ValidationReport};
use crate::provisioning::WalletProvisioner;
use crate::types::{EntryView, FormPhase, FormSnapshot, SignerAddressEntry, SubmissionResult, WalletId};
use alloy::primitives::Address;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default cap on signer rows accepted at submit
pub const DEFAULT_MAX_SIGNERS: usize = 20;

/// Mutable form state, only touched under the lock
#[derive(Debug, Default)]
struct FormState {
    entries: Vec<SignerAddressEntry>,
    phase: FormPhase,
    result: Option<SubmissionResult>,
    report: Option<ValidationReport>,
}

impl FormState {
    fn snapshot(&self) -> FormSnapshot {
        FormSnapshot {
            entries: self.entries.iter().map(EntryView::from).collect(),
            phase: self.phase,
            result: self.result.clone(),
            report: self.report.clone(),
        }
    }

    /// Refuse edits mid-submit; drop stale feedback otherwise
    fn begin_edit(&mut self) -> Result<(), FormError> {
        if self.phase == FormPhase::Submitting {
            return Err(FormError::AlreadySubmitting);
        }
        self.report = None;
        Ok(())
    }

    /// Terminal phases fall back to Idle once an edit lands
    fn finish_edit(&mut self) {
        if self.phase.is_terminal() {
            self.phase = FormPhase::Idle;
            self.result = None;
        }
    }

    fn check_index(&self, index: usize) -> Result<(), FormError> {
        if index >= self.entries.len() {
            return Err(FormError::InvalidIndex {
                index,
                len: self.entries.len(),
            });
        }
        Ok(())
    }
}

/// Validate every entry and collect all issues, in entry order.
///
/// Returns the normalized address list when there are no issues.
pub fn validate_signers(
    entries: &[SignerAddressEntry],
    max_signers: usize,
) -> Result<Vec<String>, ValidationReport> {
    let mut issues = Vec::new();

    if entries.is_empty() {
        issues.push(ValidationIssue::EmptyList);
    }
    if entries.len() > max_signers {
        issues.push(ValidationIssue::TooManySigners {
            count: entries.len(),
            max: max_signers,
        });
    }

    let mut first_seen: HashMap<Address, usize> = HashMap::new();
    let mut normalized = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        match entry.validity() {
            Ok(address) => {
                if let Some(&first) = first_seen.get(&address) {
                    issues.push(ValidationIssue::Duplicate { index, first });
                } else {
                    first_seen.insert(address, index);
                    normalized.push(normalize(&address));
                }
            }
            Err(issue) => issues.push(ValidationIssue::Malformed { index, issue }),
        }
    }

    let report = ValidationReport { issues };
    if report.is_empty() {
        Ok(normalized)
    } else {
        Err(report)
    }
}

/// Reason shown when a pending submit is dropped before the provisioner answers
pub const INTERRUPTED_REASON: &str = "submission interrupted";

/// Moves the form out of `Submitting` if a submit future is dropped mid-await
struct InFlight<'a, P: WalletProvisioner> {
    form: &'a WalletCreationForm<P>,
    attempt: Uuid,
    armed: bool,
}

impl<'a, P: WalletProvisioner> InFlight<'a, P> {
    fn new(form: &'a WalletCreationForm<P>, attempt: Uuid) -> Self {
        Self {
            form,
            attempt,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<P: WalletProvisioner> Drop for InFlight<'_, P> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("[Form] Submit {} dropped before the provisioner answered", self.attempt);
        let mut state = self.form.lock();
        state.phase = FormPhase::Failed;
        state.result = Some(SubmissionResult::Failed {
            reason: INTERRUPTED_REASON.to_string(),
        });
        self.form.publish(&state);
    }
}

/// The signer collection form for creating a smart-contract wallet
pub struct WalletCreationForm<P> {
    provisioner: P,
    max_signers: usize,
    state: Mutex<FormState>,
    updates: watch::Sender<FormSnapshot>,
}

impl<P: WalletProvisioner> WalletCreationForm<P> {
    /// Create an empty form backed by `provisioner`
    pub fn new(provisioner: P) -> Self {
        Self::with_max_signers(provisioner, DEFAULT_MAX_SIGNERS)
    }

    pub fn with_max_signers(provisioner: P, max_signers: usize) -> Self {
        let (updates, _) = watch::channel(FormSnapshot::default());
        Self {
            provisioner,
            max_signers,
            state: Mutex::new(FormState::default()),
            updates,
        }
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    /// Watch snapshots as the form changes
    pub fn subscribe(&self) -> watch::Receiver<FormSnapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> FormSnapshot {
        self.lock().snapshot()
    }

    pub fn phase(&self) -> FormPhase {
        self.lock().phase
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, FormState> {
        // No code path panics while holding the lock
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, state: &FormState) {
        self.updates.send_replace(state.snapshot());
    }

    /// Append an empty signer row
    pub fn add_signer_field(&self) -> Result<(), FormError> {
        let mut state = self.lock();
        state.begin_edit()?;
        state.entries.push(SignerAddressEntry::default());
        state.finish_edit();
        debug!("[Form] Added signer field ({} total)", state.entries.len());
        self.publish(&state);
        Ok(())
    }

    /// Replace the raw text of row `index`
    pub fn update_signer_field(&self, index: usize, value: impl Into<String>) -> Result<(), FormError> {
        let mut state = self.lock();
        state.begin_edit()?;
        state.check_index(index)?;
        state.entries[index].raw = value.into();
        state.finish_edit();
        self.publish(&state);
        Ok(())
    }

    /// Remove row `index`; the last remaining row cannot be removed
    pub fn remove_signer_field(&self, index: usize) -> Result<(), FormError> {
        let mut state = self.lock();
        state.begin_edit()?;
        state.check_index(index)?;
        if state.entries.len() == 1 {
            return Err(FormError::MinimumEntriesViolation);
        }
        state.entries.remove(index);
        state.finish_edit();
        debug!("[Form] Removed signer field {} ({} left)", index, state.entries.len());
        self.publish(&state);
        Ok(())
    }

    /// Clear everything and return to Idle
    pub fn reset(&self) -> Result<(), FormError> {
        let mut state = self.lock();
        state.begin_edit()?;
        *state = FormState::default();
        self.publish(&state);
        Ok(())
    }

    /// Validate the list and, if clean, create the wallet.
    ///
    /// Validation reports every issue at once. The provisioner is called at
    /// most once per submit and never while another submit is pending. There
    /// is no automatic retry; on failure the user may submit again.
    pub async fn submit(&self) -> Result<WalletId, FormError> {
        let attempt = Uuid::new_v4();

        let signers = {
            let mut state = self.lock();
            if state.phase == FormPhase::Submitting {
                warn!("[Form] Submit rejected, another submission is in flight");
                return Err(FormError::AlreadySubmitting);
            }

            state.phase = FormPhase::Validating;
            state.result = None;
            state.report = None;
            self.publish(&state);

            match validate_signers(&state.entries, self.max_signers) {
                Ok(signers) => {
                    state.phase = FormPhase::Submitting;
                    self.publish(&state);
                    signers
                }
                Err(report) => {
                    info!(
                        "[Form] Submit {} blocked by {} validation issue(s)",
                        attempt,
                        report.issues.len()
                    );
                    state.phase = FormPhase::Idle;
                    state.report = Some(report.clone());
                    self.publish(&state);
                    return Err(FormError::Validation(report));
                }
            }
        };

        info!("[Form] Submit {} creating wallet with {} signers", attempt, signers.len());
        let mut in_flight = InFlight::new(self, attempt);
        let outcome = self.provisioner.create_wallet(&signers).await;
        in_flight.disarm();

        let mut state = self.lock();
        let result = match outcome {
            Ok(wallet_id) => {
                info!("[Form] Submit {} succeeded: {}", attempt, wallet_id);
                state.phase = FormPhase::Succeeded;
                state.entries.clear();
                state.result = Some(SubmissionResult::Created {
                    wallet_id: wallet_id.clone(),
                });
                Ok(wallet_id)
            }
            Err(err) => {
                warn!("[Form] Submit {} failed: {}", attempt, err);
                let err = FormError::from(err);
                state.phase = FormPhase::Failed;
                if let FormError::Collaborator(reason) = &err {
                    state.result = Some(SubmissionResult::Failed {
                        reason: reason.clone(),
                    });
                }
                Err(err)
            }
        };
        self.publish(&state);
        result
    }
}
