//! Chain client seam: reads, writes, and confirmation waits.
//!
//! Workflows go through the [`ChainClient`] trait; production code uses
//! [`EthersChain`] over an HTTP provider with a local signing wallet, tests
//! use in-process mocks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::abi::{Function, Token};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest, H256, U64};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ClientError, Result};

/// Outcome of a confirmed submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedSubmission {
    /// Transaction identifier.
    pub tx_hash: H256,
    /// Block the transaction landed in.
    pub block_number: u64,
    /// Confirmations observed when the wait was satisfied.
    pub confirmations: usize,
}

/// Reads, writes, and confirmation waits against the target chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// The signing identity submitting calls, if a signer is attached.
    fn submitter(&self) -> Option<Address>;

    /// Numeric chain identifier.
    fn chain_id(&self) -> u64;

    /// Execute a read-only call and decode its outputs.
    async fn call(
        &self,
        contract: Address,
        function: &Function,
        args: &[Token],
    ) -> Result<Vec<Token>>;

    /// Submit a state-changing call; returns once the chain accepted it.
    async fn submit(
        &self,
        contract: Address,
        function: &Function,
        args: &[Token],
    ) -> Result<H256>;

    /// Wait until `confirmations` blocks build on the transaction's block.
    /// Callers bound this with the configured confirmation timeout.
    async fn await_confirmations(
        &self,
        tx_hash: H256,
        confirmations: usize,
    ) -> Result<ConfirmedSubmission>;
}

/// Production chain client over `ethers`: HTTP provider plus local wallet.
pub struct EthersChain {
    inner: Arc<SignerMiddleware<Provider<Http>, LocalWallet>>,
    chain_id: u64,
    poll_interval: Duration,
}

impl EthersChain {
    /// Connect to an RPC endpoint and attach a signing wallet.
    pub async fn connect(rpc_url: &str, private_key: &str) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| ClientError::SubmissionFailure(format!("bad RPC url: {}", e)))?;
        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| ClientError::SubmissionFailure(format!("chain id query failed: {}", e)))?
            .as_u64();
        let wallet: LocalWallet = private_key
            .parse()
            .map_err(|e| ClientError::SubmissionFailure(format!("bad signing key: {}", e)))?;
        let wallet = wallet.with_chain_id(chain_id);
        info!(chain_id, "connected chain client");
        Ok(Self {
            inner: Arc::new(SignerMiddleware::new(provider, wallet)),
            chain_id,
            poll_interval: Duration::from_secs(2),
        })
    }

    /// Override the receipt polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn encode(function: &Function, args: &[Token]) -> Result<Vec<u8>> {
        function
            .encode_input(args)
            .map_err(|e| ClientError::SubmissionFailure(format!("input encoding failed: {}", e)))
    }
}

#[async_trait]
impl ChainClient for EthersChain {
    fn submitter(&self) -> Option<Address> {
        Some(self.inner.signer().address())
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn call(
        &self,
        contract: Address,
        function: &Function,
        args: &[Token],
    ) -> Result<Vec<Token>> {
        let data = Self::encode(function, args)?;
        let tx: TypedTransaction = TransactionRequest::new().to(contract).data(data).into();
        let raw = self
            .inner
            .call(&tx, None)
            .await
            .map_err(|e| ClientError::SubmissionFailure(format!("read call reverted: {}", e)))?;
        function
            .decode_output(raw.as_ref())
            .map_err(|e| ClientError::SubmissionFailure(format!("output decoding failed: {}", e)))
    }

    async fn submit(
        &self,
        contract: Address,
        function: &Function,
        args: &[Token],
    ) -> Result<H256> {
        let data = Self::encode(function, args)?;
        let tx = TransactionRequest::new()
            .to(contract)
            .from(self.inner.signer().address())
            .data(data);
        let pending = self
            .inner
            .send_transaction(tx, None)
            .await
            .map_err(|e| ClientError::SubmissionFailure(e.to_string()))?;
        let tx_hash = pending.tx_hash();
        info!(%tx_hash, function = %function.name, "submitted transaction");
        Ok(tx_hash)
    }

    async fn await_confirmations(
        &self,
        tx_hash: H256,
        confirmations: usize,
    ) -> Result<ConfirmedSubmission> {
        loop {
            if let Some(receipt) = self
                .inner
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| ClientError::SubmissionFailure(e.to_string()))?
            {
                if receipt.status == Some(U64::zero()) {
                    return Err(ClientError::SubmissionFailure(format!(
                        "transaction {:#x} reverted",
                        tx_hash
                    )));
                }
                if let Some(block) = receipt.block_number {
                    let head = self
                        .inner
                        .get_block_number()
                        .await
                        .map_err(|e| ClientError::SubmissionFailure(e.to_string()))?;
                    let observed = head.saturating_sub(block).as_u64() as usize + 1;
                    if observed >= confirmations {
                        debug!(%tx_hash, block = block.as_u64(), observed, "confirmation wait satisfied");
                        return Ok(ConfirmedSubmission {
                            tx_hash,
                            block_number: block.as_u64(),
                            confirmations: observed,
                        });
                    }
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
