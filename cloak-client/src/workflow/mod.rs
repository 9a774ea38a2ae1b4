//! Operation workflows.
//!
//! One workflow instance per operation family, each guarded by its own busy
//! flag: concurrent invocations are rejected, not queued. Within one
//! invocation, steps run strictly in sequence (validate, authorization
//! pre-checks, classify, encrypt, assemble, submit, confirmation wait) and
//! every exit path clears the busy flag.

mod balance;
mod rescue;
mod transfer;
mod vault;

pub use balance::{BalanceReading, BalanceWorkflow};
pub use rescue::RescueWorkflow;
pub use transfer::BatchSendWorkflow;
pub use vault::VaultWorkflow;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use cloak_abi::{encrypted_slots, AbiError, BoundContract, ParameterDescriptor, ParameterRole, PlainEntry};
use ethers::abi::{Function, Token};
use tracing::{info, warn};

use crate::chain::{ChainClient, ConfirmedSubmission};
use crate::error::{ClientError, Result};

/// Busy flag plus last-status string for one workflow instance.
#[derive(Debug)]
pub struct WorkflowState {
    busy: AtomicBool,
    last_status: Mutex<String>,
}

impl WorkflowState {
    /// A fresh idle state.
    pub fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
            last_status: Mutex::new("idle".to_string()),
        }
    }

    /// Claim the busy flag, or fail with `OperationInProgress` without
    /// mutating anything. The returned guard clears the flag on drop, so
    /// every exit path (including errors) resets to idle.
    pub fn try_begin(&self) -> Result<BusyGuard<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ClientError::OperationInProgress);
        }
        Ok(BusyGuard { state: self })
    }

    /// True while an operation is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Record a status string for the caller to surface.
    pub fn set_status(&self, status: impl Into<String>) {
        if let Ok(mut slot) = self.last_status.lock() {
            *slot = status.into();
        }
    }

    /// The most recently recorded status.
    pub fn last_status(&self) -> String {
        self.last_status
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the owning state's busy flag when dropped.
#[derive(Debug)]
pub struct BusyGuard<'a> {
    state: &'a WorkflowState,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state.busy.store(false, Ordering::Release);
    }
}

/// Cross-check queued entry kinds against the signature's encrypted slots
/// before spending provider work. Drift between the two is a caller/ABI
/// version mismatch, reported as `AssemblyMismatch` naming the slot.
pub(crate) fn check_entry_kinds(
    descriptors: &[ParameterDescriptor],
    entries: &[PlainEntry],
) -> Result<()> {
    let slots = encrypted_slots(descriptors);

    if slots.len() == 1 && slots[0].expects_handle_array() {
        let slot = slots[0];
        let kind = match slot.role {
            ParameterRole::Encrypted(kind) => kind,
            _ => unreachable!("encrypted_slots only yields encrypted descriptors"),
        };
        if entries.is_empty() {
            return Err(AbiError::AssemblyMismatch {
                parameter: slot.display_name(),
                reason: "array-typed encrypted slot but no entries to encrypt".to_string(),
            }
            .into());
        }
        for entry in entries {
            if entry.kind != kind {
                return Err(AbiError::AssemblyMismatch {
                    parameter: slot.display_name(),
                    reason: format!(
                        "slot declares kind `{}` but an entry carries `{}`",
                        kind, entry.kind
                    ),
                }
                .into());
            }
        }
        return Ok(());
    }

    if entries.len() != slots.len() {
        let parameter = slots
            .get(entries.len())
            .map(|slot| slot.display_name())
            .unwrap_or_else(|| "entries".to_string());
        return Err(AbiError::AssemblyMismatch {
            parameter,
            reason: format!(
                "{} encrypted slot(s) declared but {} entries queued",
                slots.len(),
                entries.len()
            ),
        }
        .into());
    }

    for (slot, entry) in slots.iter().zip(entries) {
        let kind = match slot.role {
            ParameterRole::Encrypted(kind) => kind,
            _ => continue,
        };
        if entry.kind != kind {
            return Err(AbiError::AssemblyMismatch {
                parameter: slot.display_name(),
                reason: format!(
                    "slot declares kind `{}` but the entry carries `{}`",
                    kind, entry.kind
                ),
            }
            .into());
        }
    }
    Ok(())
}

/// Submit a call and wait for the requested confirmations, bounded by
/// `timeout`. Maps expiry to `ConfirmationTimeout`.
pub(crate) async fn submit_and_confirm(
    chain: &dyn ChainClient,
    contract: &BoundContract,
    function: &Function,
    args: Vec<Token>,
    confirmations: usize,
    timeout: Duration,
) -> Result<ConfirmedSubmission> {
    let tx_hash = chain.submit(contract.address, function, &args).await?;
    let confirmed =
        tokio::time::timeout(timeout, chain.await_confirmations(tx_hash, confirmations))
            .await
            .map_err(|_| {
                warn!(%tx_hash, ?timeout, "confirmation wait timed out");
                ClientError::ConfirmationTimeout(timeout)
            })??;
    info!(
        tx_hash = %confirmed.tx_hash,
        block = confirmed.block_number,
        confirmations = confirmed.confirmations,
        function = %function.name,
        "call confirmed"
    );
    Ok(confirmed)
}

/// Execute a read-only call on a named function.
pub(crate) async fn read_call(
    chain: &dyn ChainClient,
    contract: &BoundContract,
    name: &str,
    args: &[Token],
) -> Result<Vec<Token>> {
    let function = contract.function(name).map_err(ClientError::from)?;
    chain.call(contract.address, function, args).await
}
