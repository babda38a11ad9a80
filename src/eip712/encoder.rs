//! EIP-712 Value Encoding
//!
//! Implements `encodeData` and `hashStruct` for typed data values.

use super::registry::TypeRegistry;
use super::types::*;
use crate::utils::crypto::keccak256;
use ethers_core::types::U256;
use serde_json::Value;
use std::collections::HashMap;

/// Encoder for one hashing operation
///
/// Type hashes are cached per struct name for the lifetime of the encoder.
/// Create a fresh encoder for every operation.
pub struct Encoder<'a> {
    registry: &'a TypeRegistry,
    type_hashes: HashMap<String, [u8; 32]>,
}

impl<'a> Encoder<'a> {
    pub fn new(registry: &'a TypeRegistry) -> Self {
        Self {
            registry,
            type_hashes: HashMap::new(),
        }
    }

    /// Cached `keccak256(encodeType(type_name))`
    pub fn type_hash(&mut self, type_name: &str) -> Result<[u8; 32], Eip712Error> {
        if let Some(hash) = self.type_hashes.get(type_name) {
            return Ok(*hash);
        }
        let hash = self.registry.type_hash(type_name)?;
        self.type_hashes.insert(type_name.to_string(), hash);
        Ok(hash)
    }

    /// hashStruct(s) = keccak256(typeHash || encodeData(s))
    pub fn hash_struct(&mut self, type_name: &str, value: &Value) -> Result<[u8; 32], Eip712Error> {
        let encoded = self.encode_data(type_name, value)?;
        Ok(keccak256(&encoded))
    }

    /// typeHash followed by one 32-byte slot per declared field
    pub fn encode_data(&mut self, type_name: &str, value: &Value) -> Result<Vec<u8>, Eip712Error> {
        let registry = self.registry;
        let fields = registry
            .get(type_name)
            .ok_or_else(|| Eip712Error::UnknownType(type_name.to_string()))?;

        let obj = value.as_object().ok_or_else(|| mismatch(type_name, "object", value))?;

        let mut encoded = Vec::with_capacity(32 * (fields.len() + 1));
        encoded.extend_from_slice(&self.type_hash(type_name)?);

        for field in fields {
            let field_value = obj.get(&field.name).ok_or_else(|| {
                Eip712Error::MissingField(format!("{}.{}", type_name, field.name))
            })?;
            encoded.extend_from_slice(&self.encode_field(&field.type_name, field_value)?);
        }

        Ok(encoded)
    }

    /// Encode one value of the given type into its 32-byte slot
    pub fn encode_field(&mut self, type_name: &str, value: &Value) -> Result<[u8; 32], Eip712Error> {
        match FieldKind::parse(type_name)? {
            FieldKind::Array { element, len } => {
                let items = value.as_array().ok_or_else(|| mismatch(type_name, "array", value))?;
                if let Some(expected) = len {
                    if items.len() != expected {
                        return Err(Eip712Error::TypeMismatch {
                            type_name: type_name.to_string(),
                            reason: format!("expected {} elements, got {}", expected, items.len()),
                        });
                    }
                }

                let mut concatenated = Vec::with_capacity(32 * items.len());
                for item in items {
                    concatenated.extend_from_slice(&self.encode_field(element, item)?);
                }
                Ok(keccak256(&concatenated))
            }
            FieldKind::Struct(name) => self.hash_struct(name, value),
            FieldKind::String => {
                let s = value.as_str().ok_or_else(|| mismatch(type_name, "string", value))?;
                Ok(keccak256(s.as_bytes()))
            }
            FieldKind::Bytes => {
                let bytes = parse_hex_bytes(type_name, value)?;
                Ok(keccak256(&bytes))
            }
            FieldKind::Address => {
                let s = value.as_str().ok_or_else(|| mismatch(type_name, "hex string", value))?;
                let address: Address = s.parse()?;
                let mut slot = [0u8; 32];
                slot[12..].copy_from_slice(address.as_bytes());
                Ok(slot)
            }
            FieldKind::Bool => {
                let b = value.as_bool().ok_or_else(|| mismatch(type_name, "boolean", value))?;
                let mut slot = [0u8; 32];
                slot[31] = u8::from(b);
                Ok(slot)
            }
            FieldKind::Uint(bits) => Ok(word(parse_uint(type_name, bits, value)?)),
            FieldKind::Int(bits) => Ok(word(parse_int(type_name, bits, value)?)),
            FieldKind::FixedBytes(size) => {
                let bytes = parse_hex_bytes(type_name, value)?;
                if bytes.len() != size {
                    return Err(Eip712Error::TypeMismatch {
                        type_name: type_name.to_string(),
                        reason: format!("expected {} bytes, got {}", size, bytes.len()),
                    });
                }
                // Right-pad to 32 bytes
                let mut slot = [0u8; 32];
                slot[..size].copy_from_slice(&bytes);
                Ok(slot)
            }
        }
    }
}

/// Hash a struct according to EIP-712
pub fn hash_struct(
    registry: &TypeRegistry,
    type_name: &str,
    value: &Value,
) -> Result<[u8; 32], Eip712Error> {
    Encoder::new(registry).hash_struct(type_name, value)
}

/// Un-hashed `typeHash || encodeData(s)` buffer
pub fn encode_data(
    registry: &TypeRegistry,
    type_name: &str,
    value: &Value,
) -> Result<Vec<u8>, Eip712Error> {
    Encoder::new(registry).encode_data(type_name, value)
}

/// Single 32-byte slot for a value of any encodable type
pub fn encode_field(
    registry: &TypeRegistry,
    type_name: &str,
    value: &Value,
) -> Result<[u8; 32], Eip712Error> {
    Encoder::new(registry).encode_field(type_name, value)
}

fn mismatch(type_name: &str, expected: &str, value: &Value) -> Eip712Error {
    Eip712Error::TypeMismatch {
        type_name: type_name.to_string(),
        reason: format!("expected {}, got {}", expected, value),
    }
}

fn word(n: U256) -> [u8; 32] {
    let mut slot = [0u8; 32];
    n.to_big_endian(&mut slot);
    slot
}

/// Parse an unsigned integer (JSON number, decimal string or 0x-hex string)
/// that must fit in `bits` bits
pub fn parse_uint(type_name: &str, bits: usize, value: &Value) -> Result<U256, Eip712Error> {
    let n = match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                U256::from(u)
            } else if n.is_i64() {
                return Err(Eip712Error::TypeMismatch {
                    type_name: type_name.to_string(),
                    reason: format!("negative value {} for unsigned type", n),
                });
            } else {
                return Err(Eip712Error::TypeMismatch {
                    type_name: type_name.to_string(),
                    reason: format!("{} is not an integer; pass large values as decimal strings", n),
                });
            }
        }
        Value::String(s) => parse_magnitude(type_name, s)?,
        _ => return Err(mismatch(type_name, "integer", value)),
    };

    if n.bits() > bits {
        return Err(Eip712Error::TypeMismatch {
            type_name: type_name.to_string(),
            reason: format!("{} does not fit in {} bits", n, bits),
        });
    }

    Ok(n)
}

/// Parse a signed integer that must fit in `bits` bits, returned as its
/// 256-bit two's-complement word
pub fn parse_int(type_name: &str, bits: usize, value: &Value) -> Result<U256, Eip712Error> {
    let (negative, magnitude) = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                (i < 0, U256::from(i.unsigned_abs()))
            } else if let Some(u) = n.as_u64() {
                (false, U256::from(u))
            } else {
                return Err(Eip712Error::TypeMismatch {
                    type_name: type_name.to_string(),
                    reason: format!("{} is not an integer; pass large values as decimal strings", n),
                });
            }
        }
        Value::String(s) => match s.strip_prefix('-') {
            Some(rest) => (true, parse_magnitude(type_name, rest)?),
            None => (false, parse_magnitude(type_name, s)?),
        },
        _ => return Err(mismatch(type_name, "integer", value)),
    };

    let limit = U256::one() << (bits - 1);
    let in_range = if negative { magnitude <= limit } else { magnitude < limit };
    if !in_range {
        return Err(Eip712Error::TypeMismatch {
            type_name: type_name.to_string(),
            reason: format!(
                "{}{} does not fit in {} bits",
                if negative { "-" } else { "" },
                magnitude,
                bits
            ),
        });
    }

    if negative {
        Ok((!magnitude).overflowing_add(U256::one()).0)
    } else {
        Ok(magnitude)
    }
}

/// Decimal or 0x-hex digits into a U256
fn parse_magnitude(type_name: &str, s: &str) -> Result<U256, Eip712Error> {
    let invalid = |reason: String| Eip712Error::TypeMismatch {
        type_name: type_name.to_string(),
        reason,
    };

    if let Some(hex_digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex_digits.is_empty() || !hex_digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid(format!("invalid hex integer {:?}", s)));
        }
        return U256::from_str_radix(hex_digits, 16)
            .map_err(|_| invalid(format!("{} overflows 256 bits", s)));
    }

    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(format!("{:?} is not a decimal or 0x-hex integer", s)));
    }

    U256::from_dec_str(s).map_err(|_| invalid(format!("{} overflows 256 bits", s)))
}

/// Parse a hex string (with or without 0x prefix)
fn parse_hex_bytes(type_name: &str, value: &Value) -> Result<Vec<u8>, Eip712Error> {
    let s = value.as_str().ok_or_else(|| mismatch(type_name, "hex string", value))?;
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);

    hex::decode(s).map_err(|e| Eip712Error::TypeMismatch {
        type_name: type_name.to_string(),
        reason: format!("invalid hex: {}", e),
    })
}
