//! EIP-712 Hashing
//!
//! Implements domain separator and final digest composition for EIP-712.

use super::encoder::Encoder;
use super::registry::TypeRegistry;
use super::types::*;
use crate::utils::crypto::keccak256_concat;

/// Magic prefix for EIP-712 encoding
pub const EIP712_PREFIX: &[u8; 2] = b"\x19\x01";

/// Calculate the domain separator hash
///
/// domainSeparator = hashStruct(eip712Domain), where the `EIP712Domain`
/// type lists only the fields present in `domain`.
pub fn domain_separator(domain: &Eip712Domain) -> Result<[u8; 32], Eip712Error> {
    let registry = TypeRegistry::new().with_type(EIP712_DOMAIN_TYPE, domain.fields());
    Encoder::new(&registry).hash_struct(EIP712_DOMAIN_TYPE, &domain.to_value())
}

/// Compose the digest that gets signed
///
/// hash = keccak256("\x19\x01" || domainSeparator || hashStruct(message))
pub fn signing_digest(domain_separator: &[u8; 32], struct_hash: &[u8; 32]) -> [u8; 32] {
    keccak256_concat(&[&EIP712_PREFIX[..], &domain_separator[..], &struct_hash[..]])
}

/// Calculate the final EIP-712 hash for signing
pub fn hash_typed_data(typed_data: &TypedData) -> Result<[u8; 32], Eip712Error> {
    Ok(get_pre_image(typed_data)?.final_hash)
}

/// Pre-image components (for external signing)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eip712PreImage {
    pub domain_separator: [u8; 32],
    /// `None` when the primary type is `EIP712Domain` itself
    pub struct_hash: Option<[u8; 32]>,
    pub final_hash: [u8; 32],
}

/// Calculate the pre-image components for EIP-712
///
/// Validates the whole document first. A primary type of `EIP712Domain`
/// signs the domain alone: keccak256("\x19\x01" || domainSeparator).
pub fn get_pre_image(typed_data: &TypedData) -> Result<Eip712PreImage, Eip712Error> {
    typed_data.validate()?;

    let domain_separator = domain_separator(&typed_data.domain)?;

    if typed_data.primary_type == EIP712_DOMAIN_TYPE {
        let final_hash = keccak256_concat(&[&EIP712_PREFIX[..], &domain_separator[..]]);
        tracing::debug!(
            separator = %hex::encode(domain_separator),
            digest = %hex::encode(final_hash),
            "Hashed domain-only typed data"
        );
        return Ok(Eip712PreImage {
            domain_separator,
            struct_hash: None,
            final_hash,
        });
    }

    let struct_hash = Encoder::new(&typed_data.types)
        .hash_struct(&typed_data.primary_type, &typed_data.message)?;
    let final_hash = signing_digest(&domain_separator, &struct_hash);

    tracing::debug!(
        primary_type = %typed_data.primary_type,
        separator = %hex::encode(domain_separator),
        struct_hash = %hex::encode(struct_hash),
        digest = %hex::encode(final_hash),
        "Hashed typed data"
    );

    Ok(Eip712PreImage {
        domain_separator,
        struct_hash: Some(struct_hash),
        final_hash,
    })
}
