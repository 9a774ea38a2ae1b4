//! Client context and readiness.
//!
//! The context owns the optional collaborators. One structured readiness check
//! replaces nested option chains: it either yields ready borrows or names the
//! first missing prerequisite, in a fixed order (wallet connection → signer →
//! encryption session → target contract).

use std::fmt;
use std::sync::Arc;

use cloak_abi::BoundContract;
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::chain::ChainClient;
use crate::config::ClientConfig;
use crate::decrypt::{DecryptionCoordinator, ReadTarget};
use crate::error::{ClientError, Result};
use crate::provider::EncryptionProvider;

/// The first prerequisite found missing by a readiness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prerequisite {
    /// No chain client is attached.
    WalletConnection,
    /// The chain client has no signing identity.
    Signer,
    /// No encryption provider session is attached.
    EncryptionSession,
    /// No decryption coordinator is attached.
    DecryptionSession,
    /// The target contract address is missing or zero.
    TargetContract,
}

impl Prerequisite {
    /// Human-readable name, used in error displays.
    pub fn as_str(&self) -> &'static str {
        match self {
            Prerequisite::WalletConnection => "wallet connection",
            Prerequisite::Signer => "signer",
            Prerequisite::EncryptionSession => "encryption provider session",
            Prerequisite::DecryptionSession => "decryption coordinator",
            Prerequisite::TargetContract => "target contract",
        }
    }
}

impl fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrows handed out by a successful readiness check.
pub struct Ready<'a> {
    /// The attached chain client.
    pub chain: &'a Arc<dyn ChainClient>,
    /// The attached encryption provider.
    pub encryption: &'a Arc<dyn EncryptionProvider>,
    /// The signing identity submitting calls.
    pub submitter: Address,
}

impl fmt::Debug for Ready<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ready")
            .field("submitter", &self.submitter)
            .finish_non_exhaustive()
    }
}

/// Holds the optional collaborators plus configuration. Workflows share one
/// context; its collaborators are attached once and read concurrently.
pub struct ClientContext {
    chain: Option<Arc<dyn ChainClient>>,
    encryption: Option<Arc<dyn EncryptionProvider>>,
    coordinator: Option<Arc<DecryptionCoordinator>>,
    config: ClientConfig,
}

impl ClientContext {
    /// A context with no collaborators attached yet.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            chain: None,
            encryption: None,
            coordinator: None,
            config,
        }
    }

    /// Attach a chain client.
    pub fn with_chain(mut self, chain: Arc<dyn ChainClient>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Attach an encryption provider.
    pub fn with_encryption(mut self, provider: Arc<dyn EncryptionProvider>) -> Self {
        self.encryption = Some(provider);
        self
    }

    /// Attach a decryption coordinator.
    pub fn with_coordinator(mut self, coordinator: Arc<DecryptionCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// The configuration this context was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Readiness check for write/encrypt operations against `contract`.
    ///
    /// Returns ready borrows, or `EncryptionUnavailable` naming the first
    /// missing prerequisite: wallet connection, then signer, then encryption
    /// session, then target contract.
    pub fn ensure_ready(&self, contract: &BoundContract) -> Result<Ready<'_>> {
        let chain = self
            .chain
            .as_ref()
            .ok_or(ClientError::EncryptionUnavailable(Prerequisite::WalletConnection))?;
        let submitter = chain
            .submitter()
            .ok_or(ClientError::EncryptionUnavailable(Prerequisite::Signer))?;
        let encryption = self
            .encryption
            .as_ref()
            .ok_or(ClientError::EncryptionUnavailable(Prerequisite::EncryptionSession))?;
        if contract.address.is_zero() {
            return Err(ClientError::EncryptionUnavailable(Prerequisite::TargetContract));
        }
        Ok(Ready {
            chain,
            encryption,
            submitter,
        })
    }

    /// The decryption coordinator, or `EncryptionUnavailable` if none is
    /// attached.
    pub fn coordinator(&self) -> Result<&Arc<DecryptionCoordinator>> {
        self.coordinator
            .as_ref()
            .ok_or(ClientError::EncryptionUnavailable(Prerequisite::DecryptionSession))
    }

    /// True iff decryption could proceed for `targets` right now: a
    /// coordinator is attached, the target list is non-empty, and every target
    /// carries both a handle and a contract address. Makes no network call.
    pub fn can_decrypt(&self, targets: &[ReadTarget]) -> bool {
        self.coordinator.is_some() && !targets.is_empty() && targets.iter().all(|t| t.is_ready())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::Abi;

    fn noop_contract(address: Address) -> BoundContract {
        let abi: Abi = serde_json::from_str("[]").unwrap();
        BoundContract::new(address, abi)
    }

    #[test]
    fn empty_context_names_wallet_first() {
        let context = ClientContext::new(ClientConfig::default());
        let contract = noop_contract(Address::from_low_u64_be(0xAA));
        let err = context.ensure_ready(&contract).unwrap_err();
        assert!(matches!(
            err,
            ClientError::EncryptionUnavailable(Prerequisite::WalletConnection)
        ));
    }

    #[test]
    fn can_decrypt_is_false_without_coordinator() {
        let context = ClientContext::new(ClientConfig::default());
        let target = ReadTarget::new(
            Some(cloak_abi::CiphertextHandle::new([1u8; 32])),
            Some(Address::from_low_u64_be(0xAA)),
        );
        assert!(!context.can_decrypt(&[target]));
    }
}
