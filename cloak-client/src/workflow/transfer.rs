//! Batched confidential transfer workflow.
//!
//! Sends one encrypted amount to many recipients through a batching agent
//! contract. Two shapes: a uniform amount (one handle, scalar slot) or one
//! amount per recipient (N handles consumed by a single array-typed slot,
//! covered by the batch's one shared proof).

use std::sync::Arc;

use cloak_abi::{assemble, classify, AbiError, BoundContract, PlainEntry};
use ethers::abi::Token;
use ethers::types::Address;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::chain::{ChainClient, ConfirmedSubmission};
use crate::context::ClientContext;
use crate::error::{ClientError, Result};
use crate::session::encrypt_batch;
use crate::workflow::{check_entry_kinds, read_call, submit_and_confirm, WorkflowState};

/// Batched-transfer operation family. One instance, one busy flag.
pub struct BatchSendWorkflow {
    context: Arc<ClientContext>,
    token: BoundContract,
    agent: BoundContract,
    state: WorkflowState,
    /// Batch-size ceiling, read from the agent once and cached for the
    /// workflow's lifetime.
    max_batch: RwLock<Option<usize>>,
}

impl BatchSendWorkflow {
    /// Build a workflow over the confidential token and its batching agent.
    pub fn new(context: Arc<ClientContext>, token: BoundContract, agent: BoundContract) -> Self {
        Self {
            context,
            token,
            agent,
            state: WorkflowState::new(),
            max_batch: RwLock::new(None),
        }
    }

    /// The most recently recorded status string.
    pub fn last_status(&self) -> String {
        self.state.last_status()
    }

    /// True while a send is in flight.
    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    /// Send the same encrypted `amount` to every recipient.
    pub async fn send_batch(
        &self,
        recipients: &[Address],
        amount: u64,
        confirmations: usize,
    ) -> Result<ConfirmedSubmission> {
        let _guard = self.state.try_begin()?;
        let result = self
            .run("batchTransfer", recipients, vec![PlainEntry::uint64(amount)], confirmations)
            .await;
        self.finish(&result);
        result
    }

    /// Send a distinct encrypted amount to each recipient. All amounts are
    /// encrypted in one session, so the call carries N handles and one proof.
    pub async fn send_batch_per_recipient(
        &self,
        recipients: &[Address],
        amounts: &[u64],
        confirmations: usize,
    ) -> Result<ConfirmedSubmission> {
        let _guard = self.state.try_begin()?;
        if amounts.len() != recipients.len() {
            let err = AbiError::AssemblyMismatch {
                parameter: "amounts".to_string(),
                reason: format!(
                    "{} amount(s) supplied for {} recipient(s)",
                    amounts.len(),
                    recipients.len()
                ),
            }
            .into();
            self.state.set_status("failed: amounts/recipients length mismatch");
            return Err(err);
        }
        let entries = amounts.iter().map(|a| PlainEntry::uint64(*a)).collect();
        let result = self
            .run("batchTransferPerRecipient", recipients, entries, confirmations)
            .await;
        self.finish(&result);
        result
    }

    async fn run(
        &self,
        function_name: &str,
        recipients: &[Address],
        entries: Vec<PlainEntry>,
        confirmations: usize,
    ) -> Result<ConfirmedSubmission> {
        let ready = self.context.ensure_ready(&self.agent)?;

        self.state.set_status("validating");
        if recipients.is_empty() {
            return Err(AbiError::AssemblyMismatch {
                parameter: "recipients".to_string(),
                reason: "recipient list is empty".to_string(),
            }
            .into());
        }
        let ceiling = self.max_batch(&**ready.chain).await;
        if recipients.len() > ceiling {
            return Err(AbiError::AssemblyMismatch {
                parameter: "recipients".to_string(),
                reason: format!("{} recipient(s) exceed the batch ceiling of {}", recipients.len(), ceiling),
            }
            .into());
        }

        self.state.set_status("checking operator approval");
        self.ensure_operator(&**ready.chain, ready.submitter).await?;

        self.state.set_status("encrypting");
        let function = self.agent.function(function_name).map_err(ClientError::from)?;
        let descriptors = classify(function).map_err(ClientError::from)?;
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
                Token::Array(recipients.iter().map(|r| Token::Address(*r)).collect()),
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

    /// The submitter must have granted the agent operator approval on the
    /// token before the agent can move their confidential balance.
    async fn ensure_operator(&self, chain: &dyn ChainClient, holder: Address) -> Result<()> {
        let tokens = read_call(
            chain,
            &self.token,
            "isOperator",
            &[Token::Address(holder), Token::Address(self.agent.address)],
        )
        .await?;
        let approved = matches!(tokens.first(), Some(Token::Bool(true)));
        if approved {
            Ok(())
        } else {
            Err(ClientError::AuthorizationRequired(format!(
                "grant the batching agent {:#x} operator approval on the token",
                self.agent.address
            )))
        }
    }

    async fn max_batch(&self, chain: &dyn ChainClient) -> usize {
        if let Some(cached) = *self.max_batch.read().await {
            return cached;
        }
        let fallback = self.context.config().max_batch_fallback;
        let value = match read_call(chain, &self.agent, "maxBatchSize", &[]).await {
            Ok(tokens) => tokens
                .first()
                .cloned()
                .and_then(Token::into_uint)
                .filter(|u| *u <= ethers::types::U256::from(u64::MAX))
                .map(|u| u.as_u64() as usize)
                .unwrap_or(fallback),
            Err(err) => {
                warn!(error = %err, fallback, "batch ceiling unreadable; using fallback");
                fallback
            }
        };
        debug!(value, "batch ceiling cached");
        *self.max_batch.write().await = Some(value);
        value
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
