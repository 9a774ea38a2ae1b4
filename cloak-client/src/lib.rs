//! # Async orchestration for confidential contract calls
//!
//! Companion to `cloak-abi`: where that crate classifies signatures and
//! assembles argument lists, this one drives the external collaborators and
//! sequences whole operations.
//!
//! - **Provider seams** ([`EncryptionProvider`], [`DecryptionProvider`],
//!   [`ChainClient`]): the encryption/decryption cryptography and the chain
//!   RPC are external capabilities behind async traits; [`EthersChain`] is
//!   the production chain client, tests use in-process mocks.
//! - **Encryption sessions** ([`encrypt_batch`]): one provider round trip per
//!   batch, all entries queued before resolution, one shared proof out.
//! - **Decryption coordination** ([`DecryptionCoordinator`]): named sessions
//!   with result caching, signing material cached per (submitter, chain), and
//!   the zero-sentinel short-circuit.
//! - **Workflows** ([`BatchSendWorkflow`], [`RescueWorkflow`],
//!   [`BalanceWorkflow`], [`VaultWorkflow`]): busy-guarded operation
//!   families sequencing validation, authorization pre-checks, encryption,
//!   assembly, submission, and the confirmation wait.
//!
//! Readiness is one structured check ([`ClientContext::ensure_ready`]) that
//! names the first missing prerequisite; confirmation and decryption waits
//! are bounded by [`ClientConfig`] timeouts.

mod chain;
mod config;
mod context;
mod decrypt;
mod error;
mod provider;
mod session;
mod workflow;

pub use chain::{ChainClient, ConfirmedSubmission, EthersChain};
pub use config::ClientConfig;
pub use context::{ClientContext, Prerequisite, Ready};
pub use decrypt::{
    DecryptionCoordinator, DecryptionSession, ReadTarget, SessionState, SignatureCache,
};
pub use error::{ClientError, Result};
pub use provider::{
    DecryptedBatch, DecryptionProvider, DecryptionRequest, EncryptionProvider, InputSession,
    SigningMaterial,
};
pub use session::encrypt_batch;
pub use workflow::{
    BalanceReading, BalanceWorkflow, BatchSendWorkflow, BusyGuard, RescueWorkflow, VaultWorkflow,
    WorkflowState,
};
