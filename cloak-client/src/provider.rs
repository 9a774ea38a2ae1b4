//! External provider seams: encryption and decryption.
//!
//! The cryptography itself is an external capability. This module only fixes
//! the shapes the orchestration layer drives: an input session that queues
//! plaintext entries and resolves them into one [`CiphertextBatch`] with one
//! shared proof, and a decryption capability that turns (handle, contract)
//! request sets into cleartext plus attestation bytes under cached signing
//! material.

use std::collections::HashMap;

use async_trait::async_trait;
use cloak_abi::{CiphertextBatch, CiphertextHandle, PlainEntry, PlainValue};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One in-flight encryption session, bound to a (contract, submitter) pair.
///
/// Entries are queued in order; `resolve` performs the single provider round
/// trip and consumes the session. The resulting proof is valid only for the
/// exact ordered entry set this session queued.
#[async_trait]
pub trait InputSession: Send {
    /// Queue one plaintext entry. Order is significant.
    fn queue(&mut self, entry: &PlainEntry) -> Result<()>;

    /// Perform the provider round trip, yielding one handle per queued entry
    /// plus the batch's shared proof.
    async fn resolve(self: Box<Self>) -> Result<CiphertextBatch>;
}

/// The external encryption capability.
#[async_trait]
pub trait EncryptionProvider: Send + Sync {
    /// Open a session for encrypting inputs destined for `contract`, submitted
    /// by `submitter`.
    async fn create_input_session(
        &self,
        contract: Address,
        submitter: Address,
    ) -> Result<Box<dyn InputSession>>;
}

/// One decryption request: which handle to decrypt and which contract holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionRequest {
    /// Handle to decrypt.
    pub handle: CiphertextHandle,
    /// Contract the handle belongs to (scopes the provider's ACL check).
    pub contract: Address,
}

/// Signing material authorizing a user-decryption, generated once per
/// (submitter, chain) and cached by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningMaterial {
    /// Submitter the material was generated for.
    pub submitter: Address,
    /// Chain the material is scoped to.
    pub chain_id: u64,
    /// Ephemeral public key the provider encrypts responses to.
    pub public_key: Vec<u8>,
    /// The submitter's signature over the decryption authorization.
    pub signature: Vec<u8>,
}

impl SigningMaterial {
    /// True when this material covers the given (submitter, chain) pair.
    pub fn covers(&self, submitter: Address, chain_id: u64) -> bool {
        self.submitter == submitter && self.chain_id == chain_id
    }
}

/// A resolved user-decryption reply: cleartext per handle plus the provider's
/// attestation over the reply, forwarded in two-phase finalize calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptedBatch {
    /// Cleartext per requested handle.
    pub values: HashMap<CiphertextHandle, PlainValue>,
    /// Opaque attestation bytes proving the decryption to on-chain verifiers.
    pub attestation: Vec<u8>,
}

/// The external decryption capability.
#[async_trait]
pub trait DecryptionProvider: Send + Sync {
    /// Generate signing material for a (submitter, chain) pair. This is the
    /// step that prompts the user; the coordinator caches its output.
    async fn generate_signing_material(
        &self,
        submitter: Address,
        chain_id: u64,
    ) -> Result<SigningMaterial>;

    /// Decrypt a request set under previously generated signing material.
    /// One round trip per call, covering the whole set.
    async fn user_decrypt(
        &self,
        material: &SigningMaterial,
        requests: &[DecryptionRequest],
    ) -> Result<DecryptedBatch>;

    /// Decrypt handles a contract has marked publicly readable. No signing
    /// material involved.
    async fn public_decrypt(
        &self,
        handles: &[CiphertextHandle],
    ) -> Result<HashMap<CiphertextHandle, PlainValue>>;
}
