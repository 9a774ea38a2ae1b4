//! # ABI layer for confidential contract calls
//!
//! Confidential contracts mix three kinds of parameters in one signature:
//! ordinary plaintext arguments, encrypted inputs passed as opaque 32-byte
//! ciphertext handles, and one shared validity proof covering every handle in
//! the call. This crate owns the synchronous half of making such calls:
//!
//! - **Schema analysis** ([`classify`]): turn a function's declared parameter
//!   list into typed [`ParameterDescriptor`]s (`Plain | Encrypted(kind) |
//!   Proof`), derived once per signature from the ABI's "external encrypted"
//!   markers and preserved in declaration order.
//! - **Assembly** ([`assemble`]): merge descriptors, a resolved
//!   [`CiphertextBatch`], and caller-supplied plaintext values into the final
//!   ordered argument list, including the batch-variadic path where one
//!   array-typed slot consumes the whole batch.
//!
//! Encryption itself happens elsewhere; this crate never talks to a provider
//! or a chain. The async orchestration lives in `cloak-client`.
//!
//! ## Example
//!
//! ```
//! use cloak_abi::{assemble, classify_function, CiphertextBatch, CiphertextHandle, InputProof};
//! use ethers_core::abi::{Abi, Token};
//! use ethers_core::types::Address;
//!
//! let abi: Abi = serde_json::from_str(r#"[{
//!     "type": "function", "name": "transferSingle", "stateMutability": "nonpayable",
//!     "inputs": [
//!         {"name": "token", "type": "address", "internalType": "address"},
//!         {"name": "recipient", "type": "address", "internalType": "address"},
//!         {"name": "amount", "type": "bytes32", "internalType": "externalEuint64"},
//!         {"name": "inputProof", "type": "bytes", "internalType": "bytes"}
//!     ],
//!     "outputs": []
//! }]"#).unwrap();
//!
//! let descriptors = classify_function(&abi, "transferSingle").unwrap();
//! let batch = CiphertextBatch::new(
//!     vec![CiphertextHandle::new([1u8; 32])],
//!     InputProof::new(vec![0xaa]),
//! );
//! let args = assemble(
//!     &descriptors,
//!     &batch,
//!     &[Token::Address(Address::zero()), Token::Address(Address::zero())],
//! ).unwrap();
//! assert_eq!(args.len(), 4);
//! ```

mod assemble;
mod error;
mod schema;
mod types;

pub use assemble::assemble;
pub use error::{AbiError, Result};
pub use schema::{classify, classify_function, encrypted_slots, ParameterDescriptor, ParameterRole};
pub use types::{
    BoundContract, CiphertextBatch, CiphertextHandle, EncryptedKind, InputProof, PlainEntry,
    PlainValue,
};
