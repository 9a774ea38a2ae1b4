//! Error taxonomy for the orchestration layer.
//!
//! ABI-level problems ([`AbiError`]) pass through unchanged; everything else
//! here maps one observable failure mode to one variant. Validation and
//! assembly errors abort before any external call; submission and decryption
//! errors are surfaced after best-effort detail extraction, and every workflow
//! exit path clears the busy flag so the caller can retry.

use std::time::Duration;

use cloak_abi::AbiError;
use thiserror::Error;

use crate::context::Prerequisite;

/// Result type for orchestration operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised by workflows, the encryption session builder, the decryption
/// coordinator, and the chain client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Schema classification or call-argument assembly failed.
    #[error(transparent)]
    Abi(#[from] AbiError),

    /// A required collaborator is missing; the user must reconnect. Names the
    /// first missing prerequisite in readiness order.
    #[error("encryption unavailable: missing {0}")]
    EncryptionUnavailable(Prerequisite),

    /// The acting party lacks an on-chain authorization (operator approval,
    /// spend allowance, contract ownership). User-recoverable; the workflow
    /// resets to idle and the call can be retried after remediation.
    #[error("authorization required: {0}")]
    AuthorizationRequired(String),

    /// The call was rejected or reverted. Carries the best-available reason.
    #[error("submission failed: {0}")]
    SubmissionFailure(String),

    /// The confirmation wait exceeded the configured bound.
    #[error("confirmation wait exceeded {0:?}")]
    ConfirmationTimeout(Duration),

    /// A decryption provider round trip failed or timed out. Retryable;
    /// previously cached results are preserved.
    #[error("decryption failed: {0}")]
    DecryptionFailure(String),

    /// The workflow instance is already processing an operation. Nothing was
    /// mutated; retry once the in-flight operation completes.
    #[error("an operation is already in progress")]
    OperationInProgress,

    /// A two-phase finalize was invoked with no pending phase-1 handle.
    #[error("no pending operation to finalize")]
    NoPendingOperation,
}

impl ClientError {
    /// Stable machine-readable code for embedding layers.
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::Abi(inner) => inner.code(),
            ClientError::EncryptionUnavailable(_) => "ENCRYPTION_UNAVAILABLE",
            ClientError::AuthorizationRequired(_) => "AUTHORIZATION_REQUIRED",
            ClientError::SubmissionFailure(_) => "SUBMISSION_FAILURE",
            ClientError::ConfirmationTimeout(_) => "CONFIRMATION_TIMEOUT",
            ClientError::DecryptionFailure(_) => "DECRYPTION_FAILURE",
            ClientError::OperationInProgress => "OPERATION_IN_PROGRESS",
            ClientError::NoPendingOperation => "NO_PENDING_OPERATION",
        }
    }

    /// True for errors the user can remediate and retry without a code change.
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            ClientError::EncryptionUnavailable(_)
                | ClientError::AuthorizationRequired(_)
                | ClientError::OperationInProgress
                | ClientError::DecryptionFailure(_)
        )
    }
}
