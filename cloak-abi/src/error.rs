//! Error types for schema classification and call-argument assembly.

use thiserror::Error;

/// Result type for ABI schema and assembly operations.
pub type Result<T> = std::result::Result<T, AbiError>;

/// Errors raised while classifying a function schema or assembling call arguments.
///
/// These are programming-contract violations: they indicate a missing or
/// mismatched ABI rather than a transient condition, and are never retried
/// silently.
#[derive(Debug, Error)]
pub enum AbiError {
    /// The named function is absent from the contract ABI.
    #[error("function `{0}` not found in contract ABI")]
    SchemaNotFound(String),

    /// The function exists but its declared parameters cannot be classified.
    #[error("invalid schema for `{function}`: {reason}")]
    InvalidSchema {
        /// Function whose schema failed validation.
        function: String,
        /// Human-readable reason, naming the offending parameter where known.
        reason: String,
    },

    /// Classified slots, the ciphertext batch, and plaintext arguments do not
    /// line up. Names the first parameter (or cursor) that could not be matched.
    #[error("assembly mismatch at `{parameter}`: {reason}")]
    AssemblyMismatch {
        /// First unmatched parameter, or the leftover cursor (`handles`,
        /// `extra_plain`) when every declared slot was filled.
        parameter: String,
        /// Human-readable reason.
        reason: String,
    },
}

impl AbiError {
    /// Stable machine-readable code for embedding layers.
    pub fn code(&self) -> &'static str {
        match self {
            AbiError::SchemaNotFound(_) => "SCHEMA_NOT_FOUND",
            AbiError::InvalidSchema { .. } => "INVALID_SCHEMA",
            AbiError::AssemblyMismatch { .. } => "ASSEMBLY_MISMATCH",
        }
    }
}
