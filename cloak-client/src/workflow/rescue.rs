//! Privileged rescue workflow.
//!
//! Moves confidential tokens out of a stuck account through the batching
//! agent. Only the agent's owner may invoke it; the ownership pre-check runs
//! before any encryption work.

use std::sync::Arc;

use cloak_abi::{assemble, classify, BoundContract, PlainEntry};
use ethers::abi::Token;
use ethers::types::Address;

use crate::chain::{ChainClient, ConfirmedSubmission};
use crate::context::ClientContext;
use crate::error::{ClientError, Result};
use crate::session::encrypt_batch;
use crate::workflow::{check_entry_kinds, read_call, submit_and_confirm, WorkflowState};

/// Rescue operation family. One instance, one busy flag.
pub struct RescueWorkflow {
    context: Arc<ClientContext>,
    token: BoundContract,
    agent: BoundContract,
    state: WorkflowState,
}

impl RescueWorkflow {
    /// Build a workflow over the confidential token and its batching agent.
    pub fn new(context: Arc<ClientContext>, token: BoundContract, agent: BoundContract) -> Self {
        Self {
            context,
            token,
            agent,
            state: WorkflowState::new(),
        }
    }

    /// The most recently recorded status string.
    pub fn last_status(&self) -> String {
        self.state.last_status()
    }

    /// Rescue an encrypted `amount` from `from` to `to`.
    pub async fn rescue(
        &self,
        from: Address,
        to: Address,
        amount: u64,
        confirmations: usize,
    ) -> Result<ConfirmedSubmission> {
        let _guard = self.state.try_begin()?;
        let result = self.run(from, to, amount, confirmations).await;
        match &result {
            Ok(confirmed) => self.state.set_status(format!(
                "rescued; confirmed {:#x} in block {}",
                confirmed.tx_hash, confirmed.block_number
            )),
            Err(err) => self.state.set_status(format!("failed: {}", err)),
        }
        result
    }

    async fn run(
        &self,
        from: Address,
        to: Address,
        amount: u64,
        confirmations: usize,
    ) -> Result<ConfirmedSubmission> {
        let ready = self.context.ensure_ready(&self.agent)?;

        self.state.set_status("checking ownership");
        self.ensure_owner(&**ready.chain, ready.submitter).await?;

        self.state.set_status("encrypting");
        let function = self.agent.function("rescueTransfer").map_err(ClientError::from)?;
        let descriptors = classify(function).map_err(ClientError::from)?;
        let entries = vec![PlainEntry::uint64(amount)];
        check_entry_kinds(&descriptors, &entries)?;
        let batch = encrypt_batch(
            &**ready.encryption,
            self.agent.address,
            ready.submitter,
            &entries,
        )
        .await?;

        let args = assemble(
            &descriptors,
            &batch,
            &[
                Token::Address(self.token.address),
                Token::Address(from),
                Token::Address(to),
            ],
        )
        .map_err(ClientError::from)?;

        self.state.set_status("submitting");
        submit_and_confirm(
            &**ready.chain,
            &self.agent,
            function,
            args,
            confirmations,
            self.context.config().confirmation_timeout,
        )
        .await
    }

    async fn ensure_owner(&self, chain: &dyn ChainClient, submitter: Address) -> Result<()> {
        let tokens = read_call(chain, &self.agent, "owner", &[]).await?;
        let owner = tokens.first().cloned().and_then(Token::into_address);
        if owner == Some(submitter) {
            Ok(())
        } else {
            Err(ClientError::AuthorizationRequired(
                "only the agent owner may rescue funds".to_string(),
            ))
        }
    }
}
