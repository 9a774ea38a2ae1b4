//! Shared test doubles: deterministic mock providers, a scriptable mock
//! chain, and ABI fixtures for the agent / token / vault contracts.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cloak_abi::{
    BoundContract, CiphertextBatch, CiphertextHandle, InputProof, PlainEntry, PlainValue,
};
use cloak_client::{
    ChainClient, ClientConfig, ClientContext, ClientError, ConfirmedSubmission,
    DecryptedBatch, DecryptionCoordinator, DecryptionProvider, DecryptionRequest,
    EncryptionProvider, InputSession, Result, SigningMaterial,
};
use ethers::abi::{Function, Token};
use ethers::types::{Address, H256};
use sha3::{Digest, Keccak256};

// === Addresses ===

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub const SUBMITTER: u64 = 0xB0B;
pub const TOKEN: u64 = 0x70;
pub const AGENT: u64 = 0xA6;
pub const VAULT: u64 = 0xFA;
pub const ERC20: u64 = 0x20;
pub const CHAIN_ID: u64 = 31337;

// === ABI fixtures ===

pub const TOKEN_ABI: &str = r#"[
    {
        "type": "function", "name": "isOperator", "stateMutability": "view",
        "inputs": [
            {"name": "holder", "type": "address", "internalType": "address"},
            {"name": "operator", "type": "address", "internalType": "address"}
        ],
        "outputs": [{"name": "", "type": "bool", "internalType": "bool"}]
    },
    {
        "type": "function", "name": "confidentialBalanceOf", "stateMutability": "view",
        "inputs": [{"name": "holder", "type": "address", "internalType": "address"}],
        "outputs": [{"name": "", "type": "bytes32", "internalType": "euint64"}]
    }
]"#;

pub const AGENT_ABI: &str = r#"[
    {
        "type": "function", "name": "batchTransfer", "stateMutability": "nonpayable",
        "inputs": [
            {"name": "token", "type": "address", "internalType": "address"},
            {"name": "recipients", "type": "address[]", "internalType": "address[]"},
            {"name": "amount", "type": "bytes32", "internalType": "externalEuint64"},
            {"name": "inputProof", "type": "bytes", "internalType": "bytes"}
        ],
        "outputs": []
    },
    {
        "type": "function", "name": "batchTransferPerRecipient", "stateMutability": "nonpayable",
        "inputs": [
            {"name": "token", "type": "address", "internalType": "address"},
            {"name": "recipients", "type": "address[]", "internalType": "address[]"},
            {"name": "amounts", "type": "bytes32[]", "internalType": "externalEuint64[]"},
            {"name": "inputProof", "type": "bytes", "internalType": "bytes"}
        ],
        "outputs": []
    },
    {
        "type": "function", "name": "rescueTransfer", "stateMutability": "nonpayable",
        "inputs": [
            {"name": "token", "type": "address", "internalType": "address"},
            {"name": "from", "type": "address", "internalType": "address"},
            {"name": "to", "type": "address", "internalType": "address"},
            {"name": "amount", "type": "bytes32", "internalType": "externalEuint64"},
            {"name": "inputProof", "type": "bytes", "internalType": "bytes"}
        ],
        "outputs": []
    },
    {
        "type": "function", "name": "maxBatchSize", "stateMutability": "view",
        "inputs": [],
        "outputs": [{"name": "", "type": "uint256", "internalType": "uint256"}]
    },
    {
        "type": "function", "name": "owner", "stateMutability": "view",
        "inputs": [],
        "outputs": [{"name": "", "type": "address", "internalType": "address"}]
    }
]"#;

pub const VAULT_ABI: &str = r#"[
    {
        "type": "function", "name": "deposit", "stateMutability": "nonpayable",
        "inputs": [{"name": "amount", "type": "uint256", "internalType": "uint256"}],
        "outputs": []
    },
    {
        "type": "function", "name": "requestWithdraw", "stateMutability": "nonpayable",
        "inputs": [
            {"name": "amount", "type": "bytes32", "internalType": "externalEuint64"},
            {"name": "inputProof", "type": "bytes", "internalType": "bytes"}
        ],
        "outputs": []
    },
    {
        "type": "function", "name": "pendingWithdrawalOf", "stateMutability": "view",
        "inputs": [{"name": "holder", "type": "address", "internalType": "address"}],
        "outputs": [{"name": "", "type": "bytes32", "internalType": "euint64"}]
    },
    {
        "type": "function", "name": "finalizeWithdraw", "stateMutability": "nonpayable",
        "inputs": [
            {"name": "amount", "type": "uint64", "internalType": "uint64"},
            {"name": "decryptionProof", "type": "bytes", "internalType": "bytes"}
        ],
        "outputs": []
    }
]"#;

pub const ERC20_ABI: &str = r#"[
    {
        "type": "function", "name": "allowance", "stateMutability": "view",
        "inputs": [
            {"name": "owner", "type": "address", "internalType": "address"},
            {"name": "spender", "type": "address", "internalType": "address"}
        ],
        "outputs": [{"name": "", "type": "uint256", "internalType": "uint256"}]
    }
]"#;

pub fn token_contract() -> BoundContract {
    BoundContract::from_json(addr(TOKEN), TOKEN_ABI).unwrap()
}

pub fn agent_contract() -> BoundContract {
    BoundContract::from_json(addr(AGENT), AGENT_ABI).unwrap()
}

pub fn vault_contract() -> BoundContract {
    BoundContract::from_json(addr(VAULT), VAULT_ABI).unwrap()
}

pub fn erc20_contract() -> BoundContract {
    BoundContract::from_json(addr(ERC20), ERC20_ABI).unwrap()
}

pub fn handle(byte: u8) -> CiphertextHandle {
    CiphertextHandle::new([byte; 32])
}

// === Mock encryption provider ===

/// Deterministic per session: handles and the proof are keccak digests over
/// the (contract, submitter, session nonce, entry) tuple, so two sessions over
/// the same plaintext produce distinct, non-interchangeable proofs.
pub struct MockEncryptionProvider {
    session_counter: AtomicU64,
    pub round_trips: Arc<AtomicUsize>,
}

impl MockEncryptionProvider {
    pub fn new() -> Self {
        Self {
            session_counter: AtomicU64::new(0),
            round_trips: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EncryptionProvider for MockEncryptionProvider {
    async fn create_input_session(
        &self,
        contract: Address,
        submitter: Address,
    ) -> Result<Box<dyn InputSession>> {
        let nonce = self.session_counter.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            contract,
            submitter,
            nonce,
            queued: Vec::new(),
            round_trips: Arc::clone(&self.round_trips),
        }))
    }
}

struct MockSession {
    contract: Address,
    submitter: Address,
    nonce: u64,
    queued: Vec<PlainEntry>,
    round_trips: Arc<AtomicUsize>,
}

#[async_trait]
impl InputSession for MockSession {
    fn queue(&mut self, entry: &PlainEntry) -> Result<()> {
        self.queued.push(entry.clone());
        Ok(())
    }

    async fn resolve(self: Box<Self>) -> Result<CiphertextBatch> {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        let handles = self
            .queued
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let mut hasher = Keccak256::new();
                hasher.update(self.contract.as_bytes());
                hasher.update(self.submitter.as_bytes());
                hasher.update(self.nonce.to_be_bytes());
                hasher.update((i as u64).to_be_bytes());
                hasher.update(serde_json::to_vec(entry).unwrap());
                CiphertextHandle::new(hasher.finalize().into())
            })
            .collect();
        let mut hasher = Keccak256::new();
        hasher.update(b"proof");
        hasher.update(self.contract.as_bytes());
        hasher.update(self.nonce.to_be_bytes());
        hasher.update(serde_json::to_vec(&self.queued).unwrap());
        let proof = InputProof::new(hasher.finalize().to_vec());
        Ok(CiphertextBatch::new(handles, proof))
    }
}

// === Mock decryption provider ===

pub const ATTESTATION: [u8; 4] = [0xA7, 0x7E, 0x57, 0xED];

pub struct MockDecryptionProvider {
    values: Mutex<HashMap<CiphertextHandle, PlainValue>>,
    pub signing_calls: AtomicUsize,
    pub decrypt_calls: AtomicUsize,
    fail_next: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl MockDecryptionProvider {
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            signing_calls: AtomicUsize::new(0),
            decrypt_calls: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
            delay: Mutex::new(None),
        }
    }

    /// Script the cleartext the provider reports for a handle.
    pub fn script(&self, handle: CiphertextHandle, value: PlainValue) {
        self.values.lock().unwrap().insert(handle, value);
    }

    /// Make the next user_decrypt fail.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Delay every round trip, for timeout tests.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn signing_calls(&self) -> usize {
        self.signing_calls.load(Ordering::SeqCst)
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, handles: &[CiphertextHandle]) -> HashMap<CiphertextHandle, PlainValue> {
        let scripted = self.values.lock().unwrap();
        handles
            .iter()
            .filter_map(|h| scripted.get(h).map(|v| (*h, v.clone())))
            .collect()
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DecryptionProvider for MockDecryptionProvider {
    async fn generate_signing_material(
        &self,
        submitter: Address,
        chain_id: u64,
    ) -> Result<SigningMaterial> {
        self.signing_calls.fetch_add(1, Ordering::SeqCst);
        Ok(SigningMaterial {
            submitter,
            chain_id,
            public_key: vec![0xEE; 32],
            signature: vec![0xFF; 65],
        })
    }

    async fn user_decrypt(
        &self,
        _material: &SigningMaterial,
        requests: &[DecryptionRequest],
    ) -> Result<DecryptedBatch> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ClientError::DecryptionFailure("scripted failure".to_string()));
        }
        let handles: Vec<_> = requests.iter().map(|r| r.handle).collect();
        Ok(DecryptedBatch {
            values: self.lookup(&handles),
            attestation: ATTESTATION.to_vec(),
        })
    }

    async fn public_decrypt(
        &self,
        handles: &[CiphertextHandle],
    ) -> Result<HashMap<CiphertextHandle, PlainValue>> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        Ok(self.lookup(handles))
    }
}

// === Mock chain ===

#[derive(Debug, Clone)]
pub struct Submission {
    pub contract: Address,
    pub function: String,
    pub args: Vec<Token>,
}

pub struct MockChain {
    submitter: Option<Address>,
    chain_id: u64,
    responses: Mutex<HashMap<String, Vec<Token>>>,
    pub reads: Mutex<Vec<(String, Vec<Token>)>>,
    pub submissions: Mutex<Vec<Submission>>,
    fail_submit: AtomicBool,
    confirm_delay: Mutex<Option<Duration>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            submitter: Some(addr(SUBMITTER)),
            chain_id: CHAIN_ID,
            responses: Mutex::new(HashMap::new()),
            reads: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            fail_submit: AtomicBool::new(false),
            confirm_delay: Mutex::new(None),
        }
    }

    pub fn without_signer() -> Self {
        let mut chain = Self::new();
        chain.submitter = None;
        chain
    }

    /// Script the decoded output tokens of a read call, by function name.
    pub fn respond(&self, function: &str, tokens: Vec<Token>) {
        self.responses
            .lock()
            .unwrap()
            .insert(function.to_string(), tokens);
    }

    /// Make the next submit fail with a revert-style reason.
    pub fn fail_next_submit(&self) {
        self.fail_submit.store(true, Ordering::SeqCst);
    }

    /// Delay every confirmation wait, for timeout and busy-flag tests.
    pub fn set_confirm_delay(&self, delay: Duration) {
        *self.confirm_delay.lock().unwrap() = Some(delay);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn read_count(&self) -> usize {
        self.reads.lock().unwrap().len()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn submitter(&self) -> Option<Address> {
        self.submitter
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn call(
        &self,
        _contract: Address,
        function: &Function,
        args: &[Token],
    ) -> Result<Vec<Token>> {
        self.reads
            .lock()
            .unwrap()
            .push((function.name.clone(), args.to_vec()));
        self.responses
            .lock()
            .unwrap()
            .get(&function.name)
            .cloned()
            .ok_or_else(|| {
                ClientError::SubmissionFailure(format!(
                    "no scripted response for `{}`",
                    function.name
                ))
            })
    }

    async fn submit(
        &self,
        contract: Address,
        function: &Function,
        args: &[Token],
    ) -> Result<H256> {
        if self.fail_submit.swap(false, Ordering::SeqCst) {
            return Err(ClientError::SubmissionFailure("scripted revert".to_string()));
        }
        let mut submissions = self.submissions.lock().unwrap();
        let mut hasher = Keccak256::new();
        hasher.update((submissions.len() as u64).to_be_bytes());
        hasher.update(function.name.as_bytes());
        let tx_hash = H256::from_slice(&hasher.finalize());
        submissions.push(Submission {
            contract,
            function: function.name.clone(),
            args: args.to_vec(),
        });
        Ok(tx_hash)
    }

    async fn await_confirmations(
        &self,
        tx_hash: H256,
        confirmations: usize,
    ) -> Result<ConfirmedSubmission> {
        let delay = *self.confirm_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let block_number = 100 + self.submissions.lock().unwrap().len() as u64;
        Ok(ConfirmedSubmission {
            tx_hash,
            block_number,
            confirmations,
        })
    }
}

// === Context wiring ===

pub struct Harness {
    pub chain: Arc<MockChain>,
    pub encryption: Arc<MockEncryptionProvider>,
    pub decryption: Arc<MockDecryptionProvider>,
    pub context: Arc<ClientContext>,
}

pub fn harness() -> Harness {
    harness_with_config(ClientConfig::default())
}

pub fn harness_with_config(config: ClientConfig) -> Harness {
    init_tracing();
    let chain = Arc::new(MockChain::new());
    let encryption = Arc::new(MockEncryptionProvider::new());
    let decryption = Arc::new(MockDecryptionProvider::new());
    let coordinator = Arc::new(DecryptionCoordinator::new(
        decryption.clone() as Arc<dyn DecryptionProvider>,
        &config,
    ));
    let context = Arc::new(
        ClientContext::new(config)
            .with_chain(chain.clone() as Arc<dyn ChainClient>)
            .with_encryption(encryption.clone() as Arc<dyn EncryptionProvider>)
            .with_coordinator(coordinator),
    );
    Harness {
        chain,
        encryption,
        decryption,
        context,
    }
}

pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}
