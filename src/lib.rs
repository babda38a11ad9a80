//! EIP-712 Signer Library
//!
//! Typed structured data hashing and signing for Ethereum (EIP-712).
//!
//! # Architecture
//!
//! This crate provides:
//! - **eip712**: type registry, struct encoding, domain separator and digest
//!   composition, ECDSA signing and signer recovery
//! - **utils**: Keccak-256 and EIP-55 checksums
//! - **serde_bytes**: hex (de)serialization for fixed-size byte arrays
//!
//! # Security
//!
//! Private keys are only ever borrowed here. The `eip712-signer` binary
//! keeps the key it reads in a `zeroize::Zeroizing` buffer. Debug events
//! carry digests, addresses and `v`, never key material.
//!
//! # Example
//!
//! ```rust,no_run
//! use eip712_signer::eip712::{sign_typed_data, TypedData};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let json = "{}";
//! # let private_key = [1u8; 32];
//! let typed_data = TypedData::from_json(json)?;
//! let signature = sign_typed_data(&typed_data, &private_key)?;
//! println!("Signature: {}", signature.to_hex());
//! # Ok(())
//! # }
//! ```

pub mod eip712;
pub mod serde_bytes;
pub mod utils;

pub use eip712::{
    address_from_private_key, domain_separator, get_pre_image, hash_typed_data,
    recover_address, recover_typed_data_address, sign_hash, sign_typed_data,
    verify_signature, verify_typed_data, Address, Eip712Domain, Eip712Error, Eip712PreImage,
    Eip712Signature, TypeRegistry, TypedData, TypedDataField,
};
pub use utils::crypto::{keccak256, to_checksum_address};
