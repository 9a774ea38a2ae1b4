//! Vault deposit and two-phase withdraw workflow.
//!
//! Deposit is a plain-only call gated on an ERC-20 allowance. Withdraw is
//! two-phase: phase 1 submits the encrypted amount and retains the pending
//! withdrawal handle read back from the vault; phase 2 decrypts that handle
//! and submits the finalize call carrying the cleartext amount plus the
//! provider's attestation over the decryption.

use std::sync::Arc;

use cloak_abi::{assemble, classify, BoundContract, CiphertextBatch, CiphertextHandle, InputProof, PlainEntry};
use ethers::abi::Token;
use ethers::types::U256;
use tokio::sync::Mutex;
use tracing::info;

use crate::chain::ConfirmedSubmission;
use crate::context::ClientContext;
use crate::decrypt::DecryptionSession;
use crate::error::{ClientError, Result};
use crate::session::encrypt_batch;
use crate::workflow::{check_entry_kinds, read_call, submit_and_confirm, WorkflowState};

/// Vault operation family: deposit plus request/finalize withdraw. One
/// instance, one busy flag; the pending handle persists between the phases.
pub struct VaultWorkflow {
    context: Arc<ClientContext>,
    vault: BoundContract,
    erc20: BoundContract,
    state: WorkflowState,
    pending: Mutex<Option<CiphertextHandle>>,
    session: Mutex<Option<DecryptionSession>>,
}

impl VaultWorkflow {
    /// Build a workflow over the vault and the ERC-20 it wraps.
    pub fn new(context: Arc<ClientContext>, vault: BoundContract, erc20: BoundContract) -> Self {
        Self {
            context,
            vault,
            erc20,
            state: WorkflowState::new(),
            pending: Mutex::new(None),
            session: Mutex::new(None),
        }
    }

    /// The most recently recorded status string.
    pub fn last_status(&self) -> String {
        self.state.last_status()
    }

    /// The retained phase-1 handle, if a withdraw is pending finalization.
    pub async fn pending_withdrawal(&self) -> Option<CiphertextHandle> {
        *self.pending.lock().await
    }

    /// Deposit `amount` of the wrapped ERC-20 into the vault. Plain-only
    /// call; never touches the encryption provider.
    pub async fn deposit(&self, amount: U256, confirmations: usize) -> Result<ConfirmedSubmission> {
        let _guard = self.state.try_begin()?;
        let result = self.run_deposit(amount, confirmations).await;
        self.finish(&result);
        result
    }

    async fn run_deposit(&self, amount: U256, confirmations: usize) -> Result<ConfirmedSubmission> {
        let ready = self.context.ensure_ready(&self.vault)?;

        self.state.set_status("checking allowance");
        let tokens = read_call(
            &**ready.chain,
            &self.erc20,
            "allowance",
            &[Token::Address(ready.submitter), Token::Address(self.vault.address)],
        )
        .await?;
        let allowance = tokens
            .first()
            .cloned()
            .and_then(Token::into_uint)
            .unwrap_or_default();
        if allowance < amount {
            return Err(ClientError::AuthorizationRequired(format!(
                "approve the vault {:#x} to spend at least {} (current allowance {})",
                self.vault.address, amount, allowance
            )));
        }

        let function = self.vault.function("deposit").map_err(ClientError::from)?;
        let descriptors = classify(function).map_err(ClientError::from)?;
        check_entry_kinds(&descriptors, &[])?;
        let args = assemble(&descriptors, &CiphertextBatch::empty(), &[Token::Uint(amount)])
            .map_err(ClientError::from)?;

        self.state.set_status("submitting deposit");
        submit_and_confirm(
            &**ready.chain,
            &self.vault,
            function,
            args,
            confirmations,
            self.context.config().confirmation_timeout,
        )
        .await
    }

    /// Phase 1: submit the encrypted withdraw request and retain the pending
    /// withdrawal handle read back from the vault.
    pub async fn request_withdraw(
        &self,
        amount: u64,
        confirmations: usize,
    ) -> Result<ConfirmedSubmission> {
        let _guard = self.state.try_begin()?;
        let result = self.run_request(amount, confirmations).await;
        self.finish(&result);
        result
    }

    async fn run_request(&self, amount: u64, confirmations: usize) -> Result<ConfirmedSubmission> {
        let ready = self.context.ensure_ready(&self.vault)?;

        self.state.set_status("encrypting withdraw amount");
        let function = self.vault.function("requestWithdraw").map_err(ClientError::from)?;
        let descriptors = classify(function).map_err(ClientError::from)?;
        let entries = vec![PlainEntry::uint64(amount)];
        check_entry_kinds(&descriptors, &entries)?;
        let batch = encrypt_batch(
            &**ready.encryption,
            self.vault.address,
            ready.submitter,
            &entries,
        )
        .await?;
        let args = assemble(&descriptors, &batch, &[]).map_err(ClientError::from)?;

        self.state.set_status("submitting withdraw request");
        let confirmed = submit_and_confirm(
            &**ready.chain,
            &self.vault,
            function,
            args,
            confirmations,
            self.context.config().confirmation_timeout,
        )
        .await?;

        // EOA transactions cannot return values, so the handle produced by
        // the request is read back from the vault after confirmation.
        let tokens = read_call(
            &**ready.chain,
            &self.vault,
            "pendingWithdrawalOf",
            &[Token::Address(ready.submitter)],
        )
        .await?;
        let handle = tokens
            .first()
            .cloned()
            .and_then(Token::into_fixed_bytes)
            .and_then(|bytes| CiphertextHandle::from_slice(&bytes))
            .filter(|h| !h.is_zero())
            .ok_or_else(|| {
                ClientError::SubmissionFailure(
                    "vault reports no pending withdrawal after the request confirmed".to_string(),
                )
            })?;
        *self.pending.lock().await = Some(handle);
        info!(%handle, "withdraw requested; pending handle retained");
        Ok(confirmed)
    }

    /// Phase 2: decrypt the pending handle and submit the finalize call
    /// carrying the cleartext amount and the decryption attestation. Clears
    /// the pending handle on success.
    pub async fn finalize_withdraw(&self, confirmations: usize) -> Result<ConfirmedSubmission> {
        let _guard = self.state.try_begin()?;
        let result = self.run_finalize(confirmations).await;
        self.finish(&result);
        result
    }

    async fn run_finalize(&self, confirmations: usize) -> Result<ConfirmedSubmission> {
        let handle = (*self.pending.lock().await).ok_or(ClientError::NoPendingOperation)?;
        let ready = self.context.ensure_ready(&self.vault)?;
        let coordinator = self.context.coordinator()?;

        self.state.set_status("decrypting pending withdrawal");
        let mut slot = self.session.lock().await;
        let session = slot.get_or_insert_with(|| coordinator.session("withdraw"));
        session.set_target(handle, self.vault.address);
        session.decrypt(ready.submitter, ready.chain.chain_id()).await?;
        let amount = session
            .value_of(&handle)
            .and_then(|v| v.as_uint())
            .ok_or_else(|| {
                ClientError::DecryptionFailure(
                    "provider reply did not cover the pending handle".to_string(),
                )
            })?;
        let attestation = session
            .attestation()
            .ok_or_else(|| {
                ClientError::DecryptionFailure(
                    "provider reply carried no attestation".to_string(),
                )
            })?
            .to_vec();

        let function = self.vault.function("finalizeWithdraw").map_err(ClientError::from)?;
        let descriptors = classify(function).map_err(ClientError::from)?;
        // The attestation rides in the proof slot; no handles are involved.
        let batch = CiphertextBatch::new(Vec::new(), InputProof::new(attestation));
        let args =
            assemble(&descriptors, &batch, &[Token::Uint(amount)]).map_err(ClientError::from)?;

        self.state.set_status("submitting finalize");
        let confirmed = submit_and_confirm(
            &**ready.chain,
            &self.vault,
            function,
            args,
            confirmations,
            self.context.config().confirmation_timeout,
        )
        .await?;

        *self.pending.lock().await = None;
        session.reset();
        info!(tx_hash = %confirmed.tx_hash, "withdraw finalized");
        Ok(confirmed)
    }

    fn finish(&self, result: &Result<ConfirmedSubmission>) {
        match result {
            Ok(confirmed) => self.state.set_status(format!(
                "confirmed {:#x} in block {}",
                confirmed.tx_hash, confirmed.block_number
            )),
            Err(err) => self.state.set_status(format!("failed: {}", err)),
        }
    }
}
