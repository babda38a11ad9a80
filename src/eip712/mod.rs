//! EIP-712 Typed Data Signing
//!
//! Typed structured data hashing, signing and signer recovery.
//!
//! # Reference
//! - <https://eips.ethereum.org/EIPS/eip-712>
//!
//! # Example
//! ```rust,no_run
//! use eip712_signer::eip712::{hash_typed_data, sign_typed_data, recover_typed_data_address, TypedData};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let json_string = std::fs::read_to_string("typed_data.json")?;
//! # let private_key = [1u8; 32];
//! let typed_data = TypedData::from_json(&json_string)?;
//! let digest = hash_typed_data(&typed_data)?;
//! let signature = sign_typed_data(&typed_data, &private_key)?;
//! let signer = recover_typed_data_address(&typed_data, &signature)?;
//! # let _ = (digest, signer);
//! # Ok(())
//! # }
//! ```

pub mod types;
pub mod registry;
pub mod encoder;
pub mod hasher;
pub mod signer;

pub use types::*;
pub use registry::TypeRegistry;
pub use encoder::*;
pub use hasher::*;
pub use signer::*;
