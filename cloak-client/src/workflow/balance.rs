//! Confidential balance read workflow.
//!
//! Fetching the balance handle and decrypting it are separate steps: the
//! decrypt call is the one that may prompt the user for a signature, so the
//! caller decides when it happens. The zero-sentinel handle short-circuits to
//! cleartext `0` without ever touching the decryption coordinator.

use std::sync::Arc;

use cloak_abi::{BoundContract, CiphertextHandle};
use ethers::abi::Token;
use ethers::types::{Address, U256};
use tokio::sync::Mutex;
use tracing::debug;

use crate::context::ClientContext;
use crate::decrypt::DecryptionSession;
use crate::error::{ClientError, Result};
use crate::workflow::{read_call, WorkflowState};

/// Outcome of a balance handle fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceReading {
    /// The handle was the zero sentinel; the balance is cleartext `0`.
    Cleartext(U256),
    /// A non-zero handle was retained; call
    /// [`BalanceWorkflow::decrypt_balance`] to resolve it.
    Pending(CiphertextHandle),
}

/// Balance-read operation family. One instance, one busy flag.
pub struct BalanceWorkflow {
    context: Arc<ClientContext>,
    token: BoundContract,
    state: WorkflowState,
    session: Mutex<Option<DecryptionSession>>,
}

impl BalanceWorkflow {
    /// Build a workflow over the confidential token.
    pub fn new(context: Arc<ClientContext>, token: BoundContract) -> Self {
        Self {
            context,
            token,
            state: WorkflowState::new(),
            session: Mutex::new(None),
        }
    }

    /// The most recently recorded status string.
    pub fn last_status(&self) -> String {
        self.state.last_status()
    }

    /// Fetch `holder`'s balance handle. Zero sentinel resolves to cleartext
    /// `0` immediately; any other handle is retained for an explicit
    /// [`Self::decrypt_balance`] follow-up.
    pub async fn read_balance(&self, holder: Address) -> Result<BalanceReading> {
        let _guard = self.state.try_begin()?;
        let ready = self.context.ensure_ready(&self.token)?;

        self.state.set_status("fetching balance handle");
        let tokens = read_call(
            &**ready.chain,
            &self.token,
            "confidentialBalanceOf",
            &[Token::Address(holder)],
        )
        .await?;
        let handle = tokens
            .first()
            .cloned()
            .and_then(Token::into_fixed_bytes)
            .and_then(|bytes| CiphertextHandle::from_slice(&bytes))
            .ok_or_else(|| {
                ClientError::SubmissionFailure(
                    "balance read returned no 32-byte handle".to_string(),
                )
            })?;

        if handle.is_zero() {
            debug!(%holder, "balance handle is the zero sentinel");
            self.state.set_status("balance is zero");
            return Ok(BalanceReading::Cleartext(U256::zero()));
        }

        let coordinator = self.context.coordinator()?;
        let mut slot = self.session.lock().await;
        let session = slot.get_or_insert_with(|| coordinator.session("balance"));
        session.set_target(handle, self.token.address);
        self.state.set_status("balance handle retained; decryption pending");
        Ok(BalanceReading::Pending(handle))
    }

    /// Decrypt the retained balance handle. This is the step that may prompt
    /// the user for a decryption signature.
    pub async fn decrypt_balance(&self) -> Result<U256> {
        let _guard = self.state.try_begin()?;
        let mut slot = self.session.lock().await;
        let session = slot.as_mut().ok_or(ClientError::NoPendingOperation)?;
        let handle = session
            .targets()
            .first()
            .and_then(|t| t.handle)
            .ok_or(ClientError::NoPendingOperation)?;

        let ready = self.context.ensure_ready(&self.token)?;
        self.state.set_status("decrypting balance");
        session.decrypt(ready.submitter, ready.chain.chain_id()).await?;

        let value = session
            .value_of(&handle)
            .and_then(|v| v.as_uint())
            .ok_or_else(|| {
                ClientError::DecryptionFailure(
                    "provider reply did not cover the balance handle".to_string(),
                )
            })?;
        self.state.set_status(format!("balance decrypted: {}", value));
        Ok(value)
    }
}
