//! Encryption session builder.
//!
//! One provider round trip per batch: every plaintext entry is queued before
//! resolution is requested, because the provider issues one shared proof
//! covering the whole queued set. Encrypting entries separately and
//! concatenating the results produces proofs that do not validate together.

use cloak_abi::{CiphertextBatch, PlainEntry};
use ethers::types::Address;
use tracing::debug;

use crate::error::Result;
use crate::provider::EncryptionProvider;

/// Encrypt an ordered batch of plaintext entries for a (contract, submitter)
/// pair.
///
/// Each entry's kind must match the destination parameter's declared kind; the
/// builder never infers kind after the fact. An empty entry list resolves
/// locally to [`CiphertextBatch::empty`] with no provider round trip.
pub async fn encrypt_batch(
    provider: &dyn EncryptionProvider,
    contract: Address,
    submitter: Address,
    entries: &[PlainEntry],
) -> Result<CiphertextBatch> {
    if entries.is_empty() {
        debug!(%contract, "no encrypted entries; skipping encryption provider");
        return Ok(CiphertextBatch::empty());
    }

    let mut session = provider.create_input_session(contract, submitter).await?;
    for entry in entries {
        session.queue(entry)?;
    }
    let batch = session.resolve().await?;
    debug!(
        %contract,
        entries = entries.len(),
        handles = batch.handles.len(),
        proof_len = batch.proof.len(),
        "encryption batch resolved"
    );
    Ok(batch)
}
