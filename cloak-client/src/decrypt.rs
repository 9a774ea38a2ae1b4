//! Decryption request coordination.
//!
//! The coordinator owns the decryption provider and the signature cache;
//! named sessions group requests that share results and state. Signing
//! material is generated once per (submitter, chain) and reused across
//! decrypt calls, so the user is prompted once, not per request set. The
//! cache is only ever replaced wholesale when the key pair changes.
//!
//! The all-zero handle is the uninitialized-value sentinel: it resolves to
//! cleartext `0` locally, and a request set made entirely of zero handles
//! never reaches the provider.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cloak_abi::{CiphertextHandle, PlainValue};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::provider::{DecryptionProvider, DecryptionRequest, SigningMaterial};

/// A decryption target that may still be missing pieces. Used to judge
/// readiness before on-chain reads complete; [`ReadTarget::request`] yields a
/// complete [`DecryptionRequest`] once both fields are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadTarget {
    /// Handle to decrypt, once known.
    pub handle: Option<CiphertextHandle>,
    /// Contract the handle belongs to, once known.
    pub contract: Option<Address>,
}

impl ReadTarget {
    /// Build a target from whatever pieces are known so far.
    pub fn new(handle: Option<CiphertextHandle>, contract: Option<Address>) -> Self {
        Self { handle, contract }
    }

    /// True when both the handle and the contract address are present.
    pub fn is_ready(&self) -> bool {
        self.handle.is_some() && self.contract.is_some()
    }

    /// The complete request, if ready.
    pub fn request(&self) -> Option<DecryptionRequest> {
        Some(DecryptionRequest {
            handle: self.handle?,
            contract: self.contract?,
        })
    }
}

/// Lifecycle of one session's current target set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No targets installed.
    Idle,
    /// Targets installed, decryption not yet started.
    Requested,
    /// A provider round trip is in flight.
    Decrypting,
    /// The last decrypt call resolved every requested handle.
    Resolved,
    /// The last decrypt call failed; prior results are untouched.
    Failed(String),
}

/// Cache for decryption signing material, keyed by (submitter, chain).
///
/// Reads are concurrent; invalidation replaces the whole entry, never
/// mutates it in place.
pub struct SignatureCache {
    inner: RwLock<Option<Arc<SigningMaterial>>>,
}

impl SignatureCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Return cached material covering (submitter, chain), generating and
    /// installing fresh material when the cache is empty or keyed to a
    /// different pair.
    pub async fn obtain(
        &self,
        provider: &dyn DecryptionProvider,
        submitter: Address,
        chain_id: u64,
    ) -> Result<Arc<SigningMaterial>> {
        if let Some(material) = self.inner.read().await.as_ref() {
            if material.covers(submitter, chain_id) {
                debug!(%submitter, chain_id, "signature cache hit");
                return Ok(Arc::clone(material));
            }
        }

        let fresh = Arc::new(provider.generate_signing_material(submitter, chain_id).await?);
        let mut slot = self.inner.write().await;
        // Another task may have raced us here; either winner covers the pair.
        *slot = Some(Arc::clone(&fresh));
        debug!(%submitter, chain_id, "signature cache replaced");
        Ok(fresh)
    }

    /// Drop the cached material.
    pub async fn invalidate(&self) {
        *self.inner.write().await = None;
    }
}

impl Default for SignatureCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the decryption provider and the signature cache; hands out named
/// sessions. Application-session scoped, never a process-wide singleton.
pub struct DecryptionCoordinator {
    provider: Arc<dyn DecryptionProvider>,
    cache: Arc<SignatureCache>,
    timeout: Duration,
}

impl DecryptionCoordinator {
    /// Build a coordinator over a provider, bounded by the configured
    /// decryption timeout.
    pub fn new(provider: Arc<dyn DecryptionProvider>, config: &ClientConfig) -> Self {
        Self {
            provider,
            cache: Arc::new(SignatureCache::new()),
            timeout: config.decryption_timeout,
        }
    }

    /// Open a named session sharing this coordinator's provider and cache.
    pub fn session(&self, name: &str) -> DecryptionSession {
        DecryptionSession {
            name: name.to_string(),
            provider: Arc::clone(&self.provider),
            cache: Arc::clone(&self.cache),
            timeout: self.timeout,
            targets: Vec::new(),
            results: HashMap::new(),
            attestation: None,
            state: SessionState::Idle,
        }
    }

    /// Decrypt handles a contract has marked publicly readable. Zero handles
    /// resolve locally; the provider sees only the non-zero remainder.
    pub async fn public_decrypt(
        &self,
        handles: &[CiphertextHandle],
    ) -> Result<HashMap<CiphertextHandle, PlainValue>> {
        let mut results = HashMap::new();
        let mut remote = Vec::new();
        for handle in handles {
            if handle.is_zero() {
                results.insert(*handle, PlainValue::Uint(U256::zero()));
            } else {
                remote.push(*handle);
            }
        }
        if remote.is_empty() {
            return Ok(results);
        }
        let decrypted = tokio::time::timeout(self.timeout, self.provider.public_decrypt(&remote))
            .await
            .map_err(|_| {
                ClientError::DecryptionFailure(format!(
                    "public decryption exceeded {:?}",
                    self.timeout
                ))
            })??;
        results.extend(decrypted);
        Ok(results)
    }

    /// Drop the cached signing material, forcing regeneration on the next
    /// decrypt. Call when the submitter or chain changes.
    pub async fn invalidate_cache(&self) {
        self.cache.invalidate().await;
    }
}

/// A named group of decryption requests sharing cached signing material.
///
/// Results accumulate across decrypt calls: resolving one target set never
/// erases cleartext cached for handles outside that set. [`Self::reset`] is
/// the explicit clear.
pub struct DecryptionSession {
    name: String,
    provider: Arc<dyn DecryptionProvider>,
    cache: Arc<SignatureCache>,
    timeout: Duration,
    targets: Vec<ReadTarget>,
    results: HashMap<CiphertextHandle, PlainValue>,
    attestation: Option<Vec<u8>>,
    state: SessionState,
}

impl DecryptionSession {
    /// The session's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Install a new target set. Prior results stay cached; only the target
    /// list and state change.
    pub fn set_targets(&mut self, targets: Vec<ReadTarget>) {
        self.state = if targets.is_empty() {
            SessionState::Idle
        } else {
            SessionState::Requested
        };
        self.targets = targets;
    }

    /// Install a single complete target.
    pub fn set_target(&mut self, handle: CiphertextHandle, contract: Address) {
        self.set_targets(vec![ReadTarget::new(Some(handle), Some(contract))]);
    }

    /// The installed targets.
    pub fn targets(&self) -> &[ReadTarget] {
        &self.targets
    }

    /// True iff every installed target is complete and the set is non-empty.
    /// Makes no network call.
    pub fn can_decrypt(&self) -> bool {
        !self.targets.is_empty() && self.targets.iter().all(|t| t.is_ready())
    }

    /// Decrypt the installed target set under (submitter, chain) signing
    /// material.
    ///
    /// One provider round trip covers the whole set; zero-sentinel handles
    /// resolve locally first, and a set made entirely of them never reaches
    /// the provider (and needs no signing material). Success merges cleartext
    /// into the result cache; failure records the error without touching it.
    pub async fn decrypt(&mut self, submitter: Address, chain_id: u64) -> Result<()> {
        if !self.can_decrypt() {
            return Err(ClientError::DecryptionFailure(
                "decryption targets incomplete".to_string(),
            ));
        }

        let mut remote = Vec::new();
        for target in &self.targets {
            // can_decrypt already held, so request() is present.
            if let Some(request) = target.request() {
                if request.handle.is_zero() {
                    self.results
                        .insert(request.handle, PlainValue::Uint(U256::zero()));
                } else {
                    remote.push(request);
                }
            }
        }

        if remote.is_empty() {
            debug!(session = %self.name, "all targets were zero sentinels; resolved locally");
            self.state = SessionState::Resolved;
            return Ok(());
        }

        self.state = SessionState::Decrypting;
        let outcome = self.round_trip(submitter, chain_id, &remote).await;
        match outcome {
            Ok(batch) => {
                self.results.extend(batch.values);
                self.attestation = Some(batch.attestation);
                self.state = SessionState::Resolved;
                debug!(session = %self.name, requests = remote.len(), "decryption resolved");
                Ok(())
            }
            Err(err) => {
                warn!(session = %self.name, error = %err, "decryption round trip failed");
                self.state = SessionState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    async fn round_trip(
        &self,
        submitter: Address,
        chain_id: u64,
        requests: &[DecryptionRequest],
    ) -> Result<crate::provider::DecryptedBatch> {
        let material = self.cache.obtain(&*self.provider, submitter, chain_id).await?;
        tokio::time::timeout(self.timeout, self.provider.user_decrypt(&material, requests))
            .await
            .map_err(|_| {
                ClientError::DecryptionFailure(format!(
                    "decryption exceeded {:?}",
                    self.timeout
                ))
            })?
    }

    /// Cleartext for a handle, if it has been resolved by any decrypt call on
    /// this session.
    pub fn value_of(&self, handle: &CiphertextHandle) -> Option<&PlainValue> {
        self.results.get(handle)
    }

    /// All resolved cleartext, keyed by handle.
    pub fn results(&self) -> &HashMap<CiphertextHandle, PlainValue> {
        &self.results
    }

    /// Attestation bytes from the most recent successful provider round trip.
    pub fn attestation(&self) -> Option<&[u8]> {
        self.attestation.as_deref()
    }

    /// Explicit reset: drop targets, results, attestation, and state.
    pub fn reset(&mut self) {
        self.targets.clear();
        self.results.clear();
        self.attestation = None;
        self.state = SessionState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_target_readiness() {
        let handle = CiphertextHandle::new([1u8; 32]);
        let contract = Address::from_low_u64_be(0xAA);
        assert!(!ReadTarget::new(None, None).is_ready());
        assert!(!ReadTarget::new(Some(handle), None).is_ready());
        assert!(!ReadTarget::new(None, Some(contract)).is_ready());
        let ready = ReadTarget::new(Some(handle), Some(contract));
        assert!(ready.is_ready());
        assert_eq!(
            ready.request(),
            Some(DecryptionRequest { handle, contract })
        );
    }

    struct NoopProvider;

    #[async_trait::async_trait]
    impl DecryptionProvider for NoopProvider {
        async fn generate_signing_material(
            &self,
            submitter: Address,
            chain_id: u64,
        ) -> Result<SigningMaterial> {
            Ok(SigningMaterial {
                submitter,
                chain_id,
                public_key: vec![],
                signature: vec![],
            })
        }

        async fn user_decrypt(
            &self,
            _material: &SigningMaterial,
            _requests: &[DecryptionRequest],
        ) -> Result<crate::provider::DecryptedBatch> {
            Err(ClientError::DecryptionFailure("unreachable".to_string()))
        }

        async fn public_decrypt(
            &self,
            _handles: &[CiphertextHandle],
        ) -> Result<HashMap<CiphertextHandle, PlainValue>> {
            Ok(HashMap::new())
        }
    }

    fn session() -> DecryptionSession {
        let coordinator =
            DecryptionCoordinator::new(Arc::new(NoopProvider), &ClientConfig::default());
        coordinator.session("test")
    }

    #[test]
    fn target_installation_drives_state() {
        let mut session = session();
        assert_eq!(*session.state(), SessionState::Idle);
        session.set_target(CiphertextHandle::new([1u8; 32]), Address::from_low_u64_be(1));
        assert_eq!(*session.state(), SessionState::Requested);
        assert!(session.can_decrypt());
        session.set_targets(Vec::new());
        assert_eq!(*session.state(), SessionState::Idle);
        assert!(!session.can_decrypt());
    }

    #[tokio::test]
    async fn all_zero_set_resolves_locally() {
        let mut session = session();
        let contract = Address::from_low_u64_be(0xAA);
        session.set_target(CiphertextHandle::ZERO, contract);
        // NoopProvider's user_decrypt always fails, so success proves no
        // provider round trip happened.
        session.decrypt(Address::from_low_u64_be(0xBB), 1).await.unwrap();
        assert_eq!(*session.state(), SessionState::Resolved);
        assert_eq!(
            session.value_of(&CiphertextHandle::ZERO),
            Some(&PlainValue::Uint(U256::zero()))
        );
    }

    #[test]
    fn reset_clears_everything() {
        let mut session = session();
        session.set_target(CiphertextHandle::new([2u8; 32]), Address::from_low_u64_be(1));
        session.reset();
        assert_eq!(*session.state(), SessionState::Idle);
        assert!(session.targets().is_empty());
        assert!(session.results().is_empty());
        assert!(session.attestation().is_none());
    }
}
