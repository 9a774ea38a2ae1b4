//! Schema analysis: classifying a function's declared parameters into
//! plaintext, encrypted-input, and proof roles.
//!
//! Confidential contracts mark encrypted inputs in ABI metadata: the declared
//! on-wire type is a 32-byte reference (`bytes32` or `uint256`), while the
//! `internalType` field carries an "external encrypted" marker such as
//! `externalEuint64`, whose suffix names the kind. The batch's validity proof
//! travels as a `bytes` parameter conventionally named for a proof
//! (`inputProof`). Everything else is an ordinary plaintext argument.
//!
//! Classification happens once per function signature and preserves ABI
//! declaration order; assembly depends on that order, not on parameter names.

use ethers_core::abi::{Abi, Function, Param, ParamType};
use serde::{Deserialize, Serialize};

use crate::error::{AbiError, Result};
use crate::types::EncryptedKind;

/// The role a declared parameter plays in a confidential call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterRole {
    /// Ordinary plaintext argument, supplied by the caller.
    Plain,
    /// Encrypted input: the slot consumes a ciphertext handle of this kind.
    Encrypted(EncryptedKind),
    /// The batch's shared validity proof.
    Proof,
}

impl ParameterRole {
    /// True for encrypted-input slots of any kind.
    pub fn is_encrypted(&self) -> bool {
        matches!(self, ParameterRole::Encrypted(_))
    }
}

/// One classified parameter of a function signature.
///
/// Built once per signature and never re-derived per call; position is the
/// zero-based ABI declaration index.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParameterDescriptor {
    /// Declared parameter name (may be empty in minimal ABIs).
    pub name: String,
    /// Declared on-wire type.
    pub declared: ParamType,
    /// Classified role.
    pub role: ParameterRole,
    /// Zero-based declaration position.
    pub position: usize,
}

impl ParameterDescriptor {
    /// True for encrypted-input slots.
    pub fn is_encrypted(&self) -> bool {
        self.role.is_encrypted()
    }

    /// True for the proof slot.
    pub fn is_proof(&self) -> bool {
        self.role == ParameterRole::Proof
    }

    /// True when this encrypted slot is array-typed and consumes the whole
    /// batch of handles (batch-variadic mode).
    pub fn expects_handle_array(&self) -> bool {
        self.is_encrypted()
            && matches!(
                self.declared,
                ParamType::Array(_) | ParamType::FixedArray(_, _)
            )
    }

    /// A display name that falls back to the position for unnamed parameters.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            format!("#{}", self.position)
        } else {
            self.name.clone()
        }
    }
}

/// Looks up `name` in the ABI and classifies its parameters.
pub fn classify_function(abi: &Abi, name: &str) -> Result<Vec<ParameterDescriptor>> {
    let function = abi
        .function(name)
        .map_err(|_| AbiError::SchemaNotFound(name.to_string()))?;
    classify(function)
}

/// Classifies a function's declared parameters, in declaration order.
///
/// Fails with [`AbiError::InvalidSchema`] if the function declares zero
/// parameters, carries an unrecognized encrypted marker, or declares an
/// encrypted slot with a type that is not a 32-byte reference.
pub fn classify(function: &Function) -> Result<Vec<ParameterDescriptor>> {
    if function.inputs.is_empty() {
        return Err(AbiError::InvalidSchema {
            function: function.name.clone(),
            reason: "zero declared parameters".to_string(),
        });
    }

    let mut descriptors = Vec::with_capacity(function.inputs.len());
    for (position, param) in function.inputs.iter().enumerate() {
        let role = classify_parameter(&function.name, param, position)?;
        descriptors.push(ParameterDescriptor {
            name: param.name.clone(),
            declared: param.kind.clone(),
            role,
            position,
        });
    }
    Ok(descriptors)
}

/// The encrypted slots of a classified signature, in declaration order.
pub fn encrypted_slots(descriptors: &[ParameterDescriptor]) -> Vec<&ParameterDescriptor> {
    descriptors.iter().filter(|d| d.is_encrypted()).collect()
}

fn classify_parameter(function: &str, param: &Param, position: usize) -> Result<ParameterRole> {
    if let Some(internal) = param.internal_type.as_deref() {
        let (marker, marker_is_array) = match internal.strip_suffix("[]") {
            Some(base) => (base, true),
            None => (internal, false),
        };

        if let Some(kind) = EncryptedKind::parse_marker(marker) {
            validate_reference_type(function, param, position, marker_is_array)?;
            return Ok(ParameterRole::Encrypted(kind));
        }

        if marker.starts_with("externalE") {
            return Err(AbiError::InvalidSchema {
                function: function.to_string(),
                reason: format!(
                    "parameter `{}` carries unrecognized encrypted marker `{}`",
                    param_name(param, position),
                    internal
                ),
            });
        }
    }

    if param.kind == ParamType::Bytes && param.name.to_ascii_lowercase().contains("proof") {
        return Ok(ParameterRole::Proof);
    }

    Ok(ParameterRole::Plain)
}

/// An encrypted slot must be declared as a 32-byte reference: `bytes32` or
/// `uint256`, or an array of either when the marker itself is array-typed.
fn validate_reference_type(
    function: &str,
    param: &Param,
    position: usize,
    marker_is_array: bool,
) -> Result<()> {
    let scalar_ok = |ty: &ParamType| matches!(ty, ParamType::FixedBytes(32) | ParamType::Uint(256));

    let ok = if marker_is_array {
        match &param.kind {
            ParamType::Array(inner) => scalar_ok(inner),
            ParamType::FixedArray(inner, _) => scalar_ok(inner),
            _ => false,
        }
    } else {
        scalar_ok(&param.kind)
    };

    if ok {
        Ok(())
    } else {
        Err(AbiError::InvalidSchema {
            function: function.to_string(),
            reason: format!(
                "encrypted parameter `{}` declared as `{}`, expected a 32-byte reference",
                param_name(param, position),
                param.kind
            ),
        })
    }
}

fn param_name(param: &Param, position: usize) -> String {
    if param.name.is_empty() {
        format!("#{}", position)
    } else {
        param.name.clone()
    }
}
