//! EIP-712 Type Definitions
//!
//! Core data structures for EIP-712 typed data signing.

use super::encoder::parse_uint;
use super::registry::TypeRegistry;
use crate::utils::crypto::to_checksum_address;
use ethers_core::types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Name of the synthetic domain struct type
pub const EIP712_DOMAIN_TYPE: &str = "EIP712Domain";

/// A field in a struct type definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypedDataField {
    /// The name of the field
    pub name: String,
    /// The type of the field (e.g., "address", "uint256", "OrderInfo[]")
    #[serde(rename = "type")]
    pub type_name: String,
}

impl TypedDataField {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Parsed shape of a type name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind<'a> {
    Address,
    Bool,
    /// `uintN`, width in bits
    Uint(usize),
    /// `intN`, width in bits
    Int(usize),
    /// `bytesN`, width in bytes
    FixedBytes(usize),
    Bytes,
    String,
    /// `T[]` when `len` is `None`, `T[n]` otherwise
    Array { element: &'a str, len: Option<usize> },
    /// Any other name; resolved against a [`TypeRegistry`]
    Struct(&'a str),
}

impl<'a> FieldKind<'a> {
    /// Classify a type name. Malformed array suffixes and out-of-range
    /// widths (`uint7`, `bytes33`) are rejected here; whether a struct name
    /// exists is the registry's concern.
    pub fn parse(type_name: &'a str) -> Result<Self, Eip712Error> {
        let invalid = || Eip712Error::InvalidType(type_name.to_string());

        if let Some(body) = type_name.strip_suffix(']') {
            let open = body.rfind('[').ok_or_else(invalid)?;
            let element = &body[..open];
            let len_str = &body[open + 1..];
            if element.is_empty() {
                return Err(invalid());
            }
            let len = if len_str.is_empty() {
                None
            } else {
                if !is_decimal(len_str) {
                    return Err(invalid());
                }
                let n: usize = len_str.parse().map_err(|_| invalid())?;
                if n == 0 {
                    return Err(invalid());
                }
                Some(n)
            };
            return Ok(FieldKind::Array { element, len });
        }

        match type_name {
            "address" => return Ok(FieldKind::Address),
            "bool" => return Ok(FieldKind::Bool),
            "string" => return Ok(FieldKind::String),
            "bytes" => return Ok(FieldKind::Bytes),
            _ => {}
        }

        if let Some(bits) = sized_suffix(type_name, "uint", |n| n > 0 && n <= 256 && n % 8 == 0)? {
            return Ok(FieldKind::Uint(bits));
        }
        if let Some(bits) = sized_suffix(type_name, "int", |n| n > 0 && n <= 256 && n % 8 == 0)? {
            return Ok(FieldKind::Int(bits));
        }
        if let Some(size) = sized_suffix(type_name, "bytes", |n| n > 0 && n <= 32)? {
            return Ok(FieldKind::FixedBytes(size));
        }

        if type_name.contains('[') || type_name.contains(']') {
            return Err(invalid());
        }

        Ok(FieldKind::Struct(type_name))
    }

    /// The struct name at the bottom of any array nesting, if any
    pub fn struct_name(&self) -> Option<&'a str> {
        match *self {
            FieldKind::Struct(name) => Some(name),
            FieldKind::Array { element, .. } => FieldKind::parse(element).ok()?.struct_name(),
            _ => None,
        }
    }
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) && !(s.len() > 1 && s.starts_with('0'))
}

/// `prefix` followed by a width. Returns `Ok(None)` when the name is not of
/// that family at all, and an error when the width is out of range.
fn sized_suffix(
    type_name: &str,
    prefix: &str,
    valid: impl Fn(usize) -> bool,
) -> Result<Option<usize>, Eip712Error> {
    let Some(digits) = type_name.strip_prefix(prefix) else {
        return Ok(None);
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    match digits.parse::<usize>() {
        Ok(n) if is_decimal(digits) && valid(n) => Ok(Some(n)),
        _ => Err(Eip712Error::InvalidType(type_name.to_string())),
    }
}

/// Identifier rule for struct and field names
pub(crate) fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// A 20-byte Ethereum address
///
/// Parsing accepts `0x`-prefixed or bare hex. Mixed-case input must carry a
/// valid EIP-55 checksum; all-lowercase and all-uppercase input is accepted
/// as is. Equality is on the raw bytes.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_slice(bytes: &[u8]) -> Result<Self, Eip712Error> {
        let arr: [u8; 20] = bytes.try_into().map_err(|_| Eip712Error::TypeMismatch {
            type_name: "address".to_string(),
            reason: format!("expected 20 bytes, got {}", bytes.len()),
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// EIP-55 checksummed form
    pub fn to_checksum(&self) -> String {
        to_checksum_address(&self.0)
    }
}

impl FromStr for Address {
    type Err = Eip712Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mismatch = |reason: String| Eip712Error::TypeMismatch {
            type_name: "address".to_string(),
            reason,
        };

        let hex_part = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if hex_part.len() != 40 {
            return Err(mismatch(format!(
                "expected 40 hex chars, got {}",
                hex_part.len()
            )));
        }

        let bytes = hex::decode(hex_part).map_err(|e| mismatch(format!("invalid hex: {}", e)))?;
        let address = Address::from_slice(&bytes)?;

        let has_lower = hex_part.bytes().any(|b| b.is_ascii_lowercase());
        let has_upper = hex_part.bytes().any(|b| b.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum()[2..] != *hex_part {
            return Err(mismatch(format!("invalid EIP-55 checksum: {}", s)));
        }

        Ok(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The EIP-712 domain separator data
///
/// Only the fields that are set take part in the `EIP712Domain` type and
/// its encoding.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Eip712Domain {
    /// The human-readable name of the signing domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The current major version of the signing domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// The EIP-155 chain ID
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "chain_id_serde::serialize",
        deserialize_with = "chain_id_serde::deserialize"
    )]
    pub chain_id: Option<U256>,

    /// The address of the contract that will verify the signature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifying_contract: Option<Address>,

    /// An optional disambiguating salt
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::serde_bytes::hex32_option")]
    pub salt: Option<[u8; 32]>,
}

impl Eip712Domain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_chain_id(mut self, chain_id: impl Into<U256>) -> Self {
        self.chain_id = Some(chain_id.into());
        self
    }

    pub fn with_verifying_contract(mut self, address: Address) -> Self {
        self.verifying_contract = Some(address);
        self
    }

    pub fn with_salt(mut self, salt: [u8; 32]) -> Self {
        self.salt = Some(salt);
        self
    }

    /// The `EIP712Domain` field list: present fields in canonical order
    pub fn fields(&self) -> Vec<TypedDataField> {
        let mut fields = Vec::new();

        if self.name.is_some() {
            fields.push(TypedDataField::new("name", "string"));
        }
        if self.version.is_some() {
            fields.push(TypedDataField::new("version", "string"));
        }
        if self.chain_id.is_some() {
            fields.push(TypedDataField::new("chainId", "uint256"));
        }
        if self.verifying_contract.is_some() {
            fields.push(TypedDataField::new("verifyingContract", "address"));
        }
        if self.salt.is_some() {
            fields.push(TypedDataField::new("salt", "bytes32"));
        }

        fields
    }

    /// The domain as a message value matching [`Eip712Domain::fields`]
    pub fn to_value(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();

        if let Some(ref name) = self.name {
            obj.insert("name".into(), name.clone().into());
        }
        if let Some(ref version) = self.version {
            obj.insert("version".into(), version.clone().into());
        }
        if let Some(chain_id) = self.chain_id {
            obj.insert("chainId".into(), chain_id.to_string().into());
        }
        if let Some(contract) = self.verifying_contract {
            obj.insert("verifyingContract".into(), contract.to_checksum().into());
        }
        if let Some(salt) = self.salt {
            obj.insert("salt".into(), format!("0x{}", hex::encode(salt)).into());
        }

        serde_json::Value::Object(obj)
    }
}

/// Chain ids arrive as JSON numbers, decimal strings or hex strings
mod chain_id_serde {
    use super::*;

    pub fn serialize<S>(chain_id: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match chain_id {
            Some(id) if id.bits() <= 64 => serializer.serialize_u64(id.as_u64()),
            Some(id) => serializer.serialize_str(&id.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
        match value {
            Some(v) => parse_uint("uint256", 256, &v)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

/// Complete EIP-712 typed data structure (`eth_signTypedData_v4` shape)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedData {
    /// Type definitions (struct name -> fields)
    pub types: TypeRegistry,

    /// The name of the primary type being signed
    pub primary_type: String,

    /// The EIP-712 domain
    #[serde(default)]
    pub domain: Eip712Domain,

    /// The actual message data to sign
    #[serde(default)]
    pub message: serde_json::Value,
}

impl TypedData {
    pub fn new(
        types: TypeRegistry,
        primary_type: impl Into<String>,
        domain: Eip712Domain,
        message: serde_json::Value,
    ) -> Self {
        Self {
            types,
            primary_type: primary_type.into(),
            domain,
            message,
        }
    }

    /// Parse typed data from a JSON string
    pub fn from_json(json: &str) -> Result<Self, Eip712Error> {
        serde_json::from_str(json).map_err(|e| Eip712Error::InvalidJson(e.to_string()))
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, Eip712Error> {
        serde_json::to_string(self).map_err(|e| Eip712Error::InvalidJson(e.to_string()))
    }

    /// Validate the typed data structure before any hashing runs
    ///
    /// Checks registry closure, that the primary type is known, and that an
    /// explicit `EIP712Domain` declaration agrees with the supplied domain.
    pub fn validate(&self) -> Result<(), Eip712Error> {
        self.types.validate()?;

        if self.primary_type != EIP712_DOMAIN_TYPE && !self.types.contains(&self.primary_type) {
            return Err(Eip712Error::UnknownType(self.primary_type.clone()));
        }

        if let Some(declared) = self.types.get(EIP712_DOMAIN_TYPE) {
            if declared != self.domain.fields().as_slice() {
                return Err(Eip712Error::TypeMismatch {
                    type_name: EIP712_DOMAIN_TYPE.to_string(),
                    reason: "declared fields do not match the fields present in the domain"
                        .to_string(),
                });
            }
        }

        Ok(())
    }
}

/// EIP-712 signature components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip712Signature {
    /// r component (32 bytes)
    #[serde(with = "crate::serde_bytes::hex32")]
    pub r: [u8; 32],
    /// s component (32 bytes)
    #[serde(with = "crate::serde_bytes::hex32")]
    pub s: [u8; 32],
    /// v component (27 or 28 when produced here)
    pub v: u8,
}

impl Eip712Signature {
    /// Create from raw components
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Self { r, s, v }
    }

    /// Create from 65-byte signature (r || s || v)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Eip712Error> {
        if bytes.len() != 65 {
            return Err(Eip712Error::InvalidSignature(format!(
                "expected 65 bytes, got {}",
                bytes.len()
            )));
        }

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[0..32]);
        s.copy_from_slice(&bytes[32..64]);
        let v = bytes[64];

        Ok(Self { r, s, v })
    }

    /// Parse a `0x`-prefixed or bare hex signature
    pub fn from_hex(s: &str) -> Result<Self, Eip712Error> {
        let stripped = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        let bytes = hex::decode(stripped)
            .map_err(|e| Eip712Error::InvalidSignature(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Convert to 65-byte representation (r || s || v)
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[0..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = self.v;
        bytes
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Recovery id (0 or 1). `v` may be 27/28 or the bare parity 0/1.
    pub fn recovery_id(&self) -> Result<u8, Eip712Error> {
        match self.v {
            0 | 1 => Ok(self.v),
            27 | 28 => Ok(self.v - 27),
            other => Err(Eip712Error::InvalidSignature(format!(
                "invalid recovery value v={}",
                other
            ))),
        }
    }
}

impl FromStr for Eip712Signature {
    type Err = Eip712Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Errors that can occur during EIP-712 operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Eip712Error {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Invalid type: {0}")]
    InvalidType(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Type mismatch for {type_name}: {reason}")]
    TypeMismatch { type_name: String, reason: String },

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
}
