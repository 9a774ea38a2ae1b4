//! Core value types: ciphertext handles, input proofs, batches, plaintext
//! values, and contract bindings.
//!
//! Handles and proofs are opaque to this layer. A handle is a fixed 32-byte
//! reference to an encrypted value living in the coprocessor; a proof is a
//! variable-length blob attesting that a batch of handles was formed for a
//! specific (contract, submitter) pair. Both serialize as 0x-prefixed hex.

use std::fmt;
use std::str::FromStr;

use ethers_core::abi::{Abi, Function};
use ethers_core::types::{Address, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AbiError, Result};

/// Opaque 32-byte reference to an encrypted value, usable as a call argument
/// in place of plaintext.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CiphertextHandle([u8; 32]);

impl CiphertextHandle {
    /// The all-zero sentinel handle, representing an uninitialized or empty
    /// encrypted value. Decrypts to cleartext `0` without a provider round trip.
    pub const ZERO: CiphertextHandle = CiphertextHandle([0u8; 32]);

    /// Wraps raw handle bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        CiphertextHandle(bytes)
    }

    /// Builds a handle from a byte slice, if it is exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(CiphertextHandle(arr))
    }

    /// Parses a 0x-prefixed (or bare) hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let raw = hex::decode(s.trim_start_matches("0x")).ok()?;
        Self::from_slice(&raw)
    }

    /// Raw handle bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// True for the zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// 0x-prefixed lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// The handle as a 256-bit unsigned integer (big-endian), for signatures
    /// that declare the reference slot as `uint256`.
    pub fn to_u256(&self) -> U256 {
        U256::from_big_endian(&self.0)
    }
}

impl From<[u8; 32]> for CiphertextHandle {
    fn from(bytes: [u8; 32]) -> Self {
        CiphertextHandle(bytes)
    }
}

impl AsRef<[u8]> for CiphertextHandle {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CiphertextHandle({})", self.to_hex())
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for CiphertextHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CiphertextHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CiphertextHandle::from_hex(&s)
            .ok_or_else(|| serde::de::Error::custom("expected 32-byte hex handle"))
    }
}

/// Validity proof covering one ciphertext batch. Opaque, variable length.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct InputProof(Vec<u8>);

impl InputProof {
    /// Wraps raw proof bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        InputProof(bytes)
    }

    /// An empty proof, used only by plain-only calls that carry no encrypted
    /// input.
    pub fn empty() -> Self {
        InputProof(Vec::new())
    }

    /// Raw proof bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Proof length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no proof bytes are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 0x-prefixed lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }
}

impl From<Vec<u8>> for InputProof {
    fn from(bytes: Vec<u8>) -> Self {
        InputProof(bytes)
    }
}

impl fmt::Debug for InputProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InputProof({} bytes)", self.0.len())
    }
}

impl Serialize for InputProof {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for InputProof {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let raw = hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)?;
        Ok(InputProof(raw))
    }
}

/// One resolved encryption batch: ordered ciphertext handles plus the single
/// shared proof covering all of them.
///
/// The proof is valid only for the exact (contract, submitter, ordered
/// plaintext set) that produced it. Handles and proofs from different batches
/// must never be mixed into one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextBatch {
    /// Handles in the order the plaintext values were queued.
    pub handles: Vec<CiphertextHandle>,
    /// The batch's shared validity proof.
    pub proof: InputProof,
}

impl CiphertextBatch {
    /// Builds a batch from handles and their shared proof.
    pub fn new(handles: Vec<CiphertextHandle>, proof: InputProof) -> Self {
        CiphertextBatch { handles, proof }
    }

    /// A batch with no handles and no proof, for plain-only calls.
    pub fn empty() -> Self {
        CiphertextBatch {
            handles: Vec::new(),
            proof: InputProof::empty(),
        }
    }

    /// Number of handles in the batch.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True when the batch carries no handles.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// The kind of an encrypted value, taken from the suffix of its
/// "external encrypted" ABI marker (e.g. `externalEuint64` → `Uint64`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptedKind {
    Bool,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uint128,
    Uint256,
    Address,
}

impl EncryptedKind {
    /// Parses a full marker string such as `externalEuint64` or
    /// `externalEbool`. Array suffixes must be stripped by the caller.
    pub fn parse_marker(marker: &str) -> Option<Self> {
        let suffix = marker.strip_prefix("externalE")?;
        match suffix {
            "bool" => Some(EncryptedKind::Bool),
            "uint8" => Some(EncryptedKind::Uint8),
            "uint16" => Some(EncryptedKind::Uint16),
            "uint32" => Some(EncryptedKind::Uint32),
            "uint64" => Some(EncryptedKind::Uint64),
            "uint128" => Some(EncryptedKind::Uint128),
            "uint256" => Some(EncryptedKind::Uint256),
            "address" => Some(EncryptedKind::Address),
            _ => None,
        }
    }

    /// The marker this kind corresponds to in ABI metadata.
    pub fn marker(&self) -> &'static str {
        match self {
            EncryptedKind::Bool => "externalEbool",
            EncryptedKind::Uint8 => "externalEuint8",
            EncryptedKind::Uint16 => "externalEuint16",
            EncryptedKind::Uint32 => "externalEuint32",
            EncryptedKind::Uint64 => "externalEuint64",
            EncryptedKind::Uint128 => "externalEuint128",
            EncryptedKind::Uint256 => "externalEuint256",
            EncryptedKind::Address => "externalEaddress",
        }
    }

    /// Short on-chain type name (`euint64`, `ebool`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            EncryptedKind::Bool => "ebool",
            EncryptedKind::Uint8 => "euint8",
            EncryptedKind::Uint16 => "euint16",
            EncryptedKind::Uint32 => "euint32",
            EncryptedKind::Uint64 => "euint64",
            EncryptedKind::Uint128 => "euint128",
            EncryptedKind::Uint256 => "euint256",
            EncryptedKind::Address => "eaddress",
        }
    }
}

impl fmt::Display for EncryptedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plaintext value, on either side of the encryption boundary: queued for
/// encryption, or produced by decryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlainValue {
    Bool(bool),
    Uint(U256),
    Address(Address),
}

impl PlainValue {
    /// The value as an unsigned integer, if it is one.
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            PlainValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a bool, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PlainValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as an address, if it is one.
    pub fn as_address(&self) -> Option<Address> {
        match self {
            PlainValue::Address(a) => Some(*a),
            _ => None,
        }
    }

    /// True for the canonical zero of each variant.
    pub fn is_zero(&self) -> bool {
        match self {
            PlainValue::Bool(v) => !v,
            PlainValue::Uint(v) => v.is_zero(),
            PlainValue::Address(a) => a.is_zero(),
        }
    }
}

impl fmt::Display for PlainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlainValue::Bool(v) => write!(f, "{}", v),
            PlainValue::Uint(v) => write!(f, "{}", v),
            PlainValue::Address(a) => write!(f, "{:#x}", a),
        }
    }
}

/// One plaintext entry queued for encryption: a value paired with the kind it
/// must be encrypted as.
///
/// Constructors pair native-width values with their kind, so a value/kind
/// mismatch is unrepresentable. The kind must still match the destination
/// parameter's declared kind; workflows cross-check that before encrypting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainEntry {
    /// The plaintext value.
    pub value: PlainValue,
    /// The kind the provider must encrypt it as.
    pub kind: EncryptedKind,
}

impl PlainEntry {
    /// An encrypted-bool entry.
    pub fn bool(value: bool) -> Self {
        PlainEntry {
            value: PlainValue::Bool(value),
            kind: EncryptedKind::Bool,
        }
    }

    /// An 8-bit unsigned entry.
    pub fn uint8(value: u8) -> Self {
        PlainEntry {
            value: PlainValue::Uint(U256::from(value)),
            kind: EncryptedKind::Uint8,
        }
    }

    /// A 16-bit unsigned entry.
    pub fn uint16(value: u16) -> Self {
        PlainEntry {
            value: PlainValue::Uint(U256::from(value)),
            kind: EncryptedKind::Uint16,
        }
    }

    /// A 32-bit unsigned entry.
    pub fn uint32(value: u32) -> Self {
        PlainEntry {
            value: PlainValue::Uint(U256::from(value)),
            kind: EncryptedKind::Uint32,
        }
    }

    /// A 64-bit unsigned entry.
    pub fn uint64(value: u64) -> Self {
        PlainEntry {
            value: PlainValue::Uint(U256::from(value)),
            kind: EncryptedKind::Uint64,
        }
    }

    /// A 128-bit unsigned entry.
    pub fn uint128(value: u128) -> Self {
        PlainEntry {
            value: PlainValue::Uint(U256::from(value)),
            kind: EncryptedKind::Uint128,
        }
    }

    /// A 256-bit unsigned entry.
    pub fn uint256(value: U256) -> Self {
        PlainEntry {
            value: PlainValue::Uint(value),
            kind: EncryptedKind::Uint256,
        }
    }

    /// An encrypted-address entry.
    pub fn address(value: Address) -> Self {
        PlainEntry {
            value: PlainValue::Address(value),
            kind: EncryptedKind::Address,
        }
    }
}

/// A deployed contract this layer talks to: its address plus its parsed ABI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundContract {
    /// On-chain address of the contract.
    pub address: Address,
    /// Parsed contract ABI.
    pub abi: Abi,
}

impl BoundContract {
    /// Binds an address to an already-parsed ABI.
    pub fn new(address: Address, abi: Abi) -> Self {
        BoundContract { address, abi }
    }

    /// Binds an address to an ABI given as standard JSON.
    pub fn from_json(address: Address, abi_json: &str) -> Result<Self> {
        let abi: Abi = serde_json::from_str(abi_json).map_err(|e| AbiError::InvalidSchema {
            function: "(abi)".to_string(),
            reason: format!("unparseable ABI JSON: {}", e),
        })?;
        Ok(BoundContract { address, abi })
    }

    /// Binds an address given as a hex string to an ABI given as JSON.
    pub fn parse(address: &str, abi_json: &str) -> Result<Self> {
        let address = Address::from_str(address).map_err(|e| AbiError::InvalidSchema {
            function: "(abi)".to_string(),
            reason: format!("bad contract address `{}`: {}", address, e),
        })?;
        Self::from_json(address, abi_json)
    }

    /// Looks up a function by name.
    pub fn function(&self, name: &str) -> Result<&Function> {
        self.abi
            .function(name)
            .map_err(|_| AbiError::SchemaNotFound(name.to_string()))
    }
}
