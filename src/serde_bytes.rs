//! Serde helpers for byte arrays
//!
//! Fixed-size byte arrays travel as `0x`-prefixed hex strings in typed-data
//! JSON. Decoding also accepts bare hex.

use serde::{Deserialize, Deserializer, Serializer};

/// Decode `0x`-prefixed or bare hex into exactly `N` bytes
pub fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], String> {
    let stripped = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let bytes = hex::decode(stripped).map_err(|e| format!("invalid hex: {}", e))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| format!("expected {} bytes, got {}", N, len))
}

/// Serialize/deserialize [u8; 32] as 0x-prefixed hex string
pub mod hex32 {
    use super::*;

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        decode_fixed(&s).map_err(serde::de::Error::custom)
    }
}

/// Serialize/deserialize Option<[u8; 32]> as 0x-prefixed hex string
pub mod hex32_option {
    use super::*;

    pub fn serialize<S>(bytes: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&format!("0x{}", hex::encode(b))),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            Some(s) => decode_fixed(&s).map(Some).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Holder {
        #[serde(with = "super::hex32")]
        digest: [u8; 32],
        #[serde(default, with = "super::hex32_option", skip_serializing_if = "Option::is_none")]
        salt: Option<[u8; 32]>,
    }

    #[test]
    fn test_hex32_prefixed_output() {
        let holder = Holder { digest: [0xab; 32], salt: None };
        let json = serde_json::to_string(&holder).unwrap();
        assert_eq!(json, format!(r#"{{"digest":"0x{}"}}"#, "ab".repeat(32)));
    }

    #[test]
    fn test_hex32_accepts_bare_hex() {
        let json = format!(r#"{{"digest":"{}","salt":"0x{}"}}"#, "01".repeat(32), "02".repeat(32));
        let holder: Holder = serde_json::from_str(&json).unwrap();
        assert_eq!(holder.digest, [1u8; 32]);
        assert_eq!(holder.salt, Some([2u8; 32]));
    }

    #[test]
    fn test_hex32_rejects_wrong_length() {
        let json = format!(r#"{{"digest":"0x{}"}}"#, "01".repeat(31));
        let err = serde_json::from_str::<Holder>(&json).unwrap_err();
        assert!(err.to_string().contains("expected 32 bytes, got 31"));
    }

    #[test]
    fn test_decode_fixed() {
        let addr: [u8; 20] = super::decode_fixed("0x44d10b0f1AdEEA63914313aD3E058D678014DfA5").unwrap();
        assert_eq!(addr[0], 0x44);
        assert!(super::decode_fixed::<20>("0x44d10b0f1AdEEA63914313aD3E058D678014DfA51").is_err());
        assert!(super::decode_fixed::<20>("0xzz").is_err());
    }
}
