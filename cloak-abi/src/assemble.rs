//! Call-argument assembly: merging classified slots, a ciphertext batch, and
//! caller-supplied plaintext values into one ordered argument list.
//!
//! The assembler walks descriptors in declaration order with two cursors, one
//! over the batch's handles and one over the extra plaintext values. Encrypted
//! slots consume handles in order; the proof slot receives the batch's single
//! shared proof; plain slots consume extra values in order. Any leftover or
//! premature exhaustion is an [`AbiError::AssemblyMismatch`] naming the first
//! unmatched parameter.

use ethers_core::abi::{ParamType, Token};

use crate::error::{AbiError, Result};
use crate::schema::{ParameterDescriptor, ParameterRole};
use crate::types::{CiphertextBatch, CiphertextHandle};

/// Assembles the ordered call-argument list for a classified signature.
///
/// Scalar encrypted slots consume one handle each. An array-typed encrypted
/// slot (batch-variadic mode) consumes all handles remaining in the batch.
/// The proof slot is filled with the batch's proof; if a signature declares
/// the proof parameter more than once, the same proof value is inserted again.
///
/// The returned list always has exactly `descriptors.len()` entries.
pub fn assemble(
    descriptors: &[ParameterDescriptor],
    batch: &CiphertextBatch,
    extra_plain: &[Token],
) -> Result<Vec<Token>> {
    let mut arguments = Vec::with_capacity(descriptors.len());
    let mut next_handle = 0usize;
    let mut next_plain = 0usize;
    let mut proof_used = false;

    for descriptor in descriptors {
        let token = match &descriptor.role {
            ParameterRole::Encrypted(_) if descriptor.expects_handle_array() => {
                let token = encode_handle_array(descriptor, &batch.handles[next_handle..])?;
                next_handle = batch.handles.len();
                token
            }
            ParameterRole::Encrypted(_) => {
                let handle = batch.handles.get(next_handle).ok_or_else(|| {
                    AbiError::AssemblyMismatch {
                        parameter: descriptor.display_name(),
                        reason: format!(
                            "encrypted slot at position {} has no handle left (batch holds {})",
                            descriptor.position,
                            batch.handles.len()
                        ),
                    }
                })?;
                next_handle += 1;
                encode_handle(handle, &descriptor.declared, &descriptor.display_name())?
            }
            ParameterRole::Proof => {
                if batch.proof.is_empty() {
                    return Err(AbiError::AssemblyMismatch {
                        parameter: descriptor.display_name(),
                        reason: "proof slot declared but the batch carries no proof".to_string(),
                    });
                }
                proof_used = true;
                Token::Bytes(batch.proof.as_bytes().to_vec())
            }
            ParameterRole::Plain => {
                let token = extra_plain.get(next_plain).ok_or_else(|| {
                    AbiError::AssemblyMismatch {
                        parameter: descriptor.display_name(),
                        reason: format!(
                            "plain slot at position {} has no extra value left ({} supplied)",
                            descriptor.position,
                            extra_plain.len()
                        ),
                    }
                })?;
                next_plain += 1;
                token.clone()
            }
        };
        arguments.push(token);
    }

    if next_handle < batch.handles.len() {
        return Err(AbiError::AssemblyMismatch {
            parameter: "handles".to_string(),
            reason: format!(
                "{} unused handle(s) remain after filling all encrypted slots",
                batch.handles.len() - next_handle
            ),
        });
    }
    if next_plain < extra_plain.len() {
        return Err(AbiError::AssemblyMismatch {
            parameter: "extra_plain".to_string(),
            reason: format!(
                "{} unused plaintext value(s) remain after filling all plain slots",
                extra_plain.len() - next_plain
            ),
        });
    }
    if !proof_used && !batch.proof.is_empty() {
        return Err(AbiError::AssemblyMismatch {
            parameter: "proof".to_string(),
            reason: "batch carries a proof but the signature declares no proof slot".to_string(),
        });
    }

    Ok(arguments)
}

/// Encodes one handle per the slot's declared representation.
fn encode_handle(
    handle: &CiphertextHandle,
    declared: &ParamType,
    parameter: &str,
) -> Result<Token> {
    match declared {
        ParamType::FixedBytes(32) => Ok(Token::FixedBytes(handle.as_bytes().to_vec())),
        ParamType::Uint(256) => Ok(Token::Uint(handle.to_u256())),
        other => Err(AbiError::AssemblyMismatch {
            parameter: parameter.to_string(),
            reason: format!("cannot encode a ciphertext handle as `{}`", other),
        }),
    }
}

/// Encodes all remaining handles into one array-typed slot.
fn encode_handle_array(
    descriptor: &ParameterDescriptor,
    remaining: &[CiphertextHandle],
) -> Result<Token> {
    if remaining.is_empty() {
        return Err(AbiError::AssemblyMismatch {
            parameter: descriptor.display_name(),
            reason: "array-typed encrypted slot but no handles remain in the batch".to_string(),
        });
    }

    match &descriptor.declared {
        ParamType::Array(inner) => {
            let tokens = remaining
                .iter()
                .map(|h| encode_handle(h, inner, &descriptor.display_name()))
                .collect::<Result<Vec<_>>>()?;
            Ok(Token::Array(tokens))
        }
        ParamType::FixedArray(inner, n) => {
            if remaining.len() != *n {
                return Err(AbiError::AssemblyMismatch {
                    parameter: descriptor.display_name(),
                    reason: format!(
                        "fixed array slot declares {} elements but {} handle(s) remain",
                        n,
                        remaining.len()
                    ),
                });
            }
            let tokens = remaining
                .iter()
                .map(|h| encode_handle(h, inner, &descriptor.display_name()))
                .collect::<Result<Vec<_>>>()?;
            Ok(Token::FixedArray(tokens))
        }
        other => Err(AbiError::AssemblyMismatch {
            parameter: descriptor.display_name(),
            reason: format!("cannot encode a handle batch as `{}`", other),
        }),
    }
}
