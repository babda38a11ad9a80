//! EIP-712 Signing
//!
//! ECDSA signing, public-key recovery and verification over EIP-712 digests.

use super::hasher::hash_typed_data;
use super::types::*;
use crate::utils::crypto::keccak256;
use secp256k1::constants::CURVE_ORDER;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

/// Sign EIP-712 typed data
///
/// The composed digest is signed, never the raw message.
pub fn sign_typed_data(
    typed_data: &TypedData,
    private_key: &[u8],
) -> Result<Eip712Signature, Eip712Error> {
    let hash = hash_typed_data(typed_data)?;
    sign_hash(&hash, private_key)
}

/// Sign a pre-computed digest
///
/// Nonces are derived deterministically (RFC 6979) and `s` is normalized
/// to the lower half of the curve order. `v` is `27 + recovery id`.
pub fn sign_hash(hash: &[u8; 32], private_key: &[u8]) -> Result<Eip712Signature, Eip712Error> {
    let secret_key = parse_secret_key(private_key)?;
    let secp = Secp256k1::signing_only();

    let message = Message::from_digest(*hash);
    let (recovery_id, signature) = secp
        .sign_ecdsa_recoverable(&message, &secret_key)
        .serialize_compact();

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&signature[0..32]);
    s.copy_from_slice(&signature[32..64]);

    let v = recovery_id.to_i32() as u8 + 27;

    tracing::debug!(digest = %hex::encode(hash), v, "Signed digest");

    Ok(Eip712Signature::new(r, s, v))
}

/// Address controlled by a private key
pub fn address_from_private_key(private_key: &[u8]) -> Result<Address, Eip712Error> {
    let secret_key = parse_secret_key(private_key)?;
    let secp = Secp256k1::signing_only();
    let public_key = PublicKey::from_secret_key(&secp, &secret_key);
    Ok(public_key_to_address(&public_key))
}

fn parse_secret_key(private_key: &[u8]) -> Result<SecretKey, Eip712Error> {
    if private_key.len() != 32 {
        return Err(Eip712Error::InvalidKey(format!(
            "expected 32 bytes, got {}",
            private_key.len()
        )));
    }

    SecretKey::from_slice(private_key)
        .map_err(|_| Eip712Error::InvalidKey("scalar is zero or not below the curve order".to_string()))
}

/// Verify an EIP-712 signature over typed data
pub fn verify_typed_data(
    typed_data: &TypedData,
    signature: &Eip712Signature,
    expected_address: &Address,
) -> Result<bool, Eip712Error> {
    let hash = hash_typed_data(typed_data)?;
    verify_signature(expected_address, &hash, signature)
}

/// Verify a signature against a digest and expected address
///
/// Malformed signatures are an error, not `false`.
pub fn verify_signature(
    expected_address: &Address,
    hash: &[u8; 32],
    signature: &Eip712Signature,
) -> Result<bool, Eip712Error> {
    let recovered = recover_address(hash, signature)?;
    let valid = recovered == *expected_address;

    tracing::debug!(
        expected = %expected_address,
        recovered = %recovered,
        valid,
        "Verified signature"
    );

    Ok(valid)
}

/// Recover the signer of typed data
pub fn recover_typed_data_address(
    typed_data: &TypedData,
    signature: &Eip712Signature,
) -> Result<Address, Eip712Error> {
    let hash = hash_typed_data(typed_data)?;
    recover_address(&hash, signature)
}

/// Recover the signer's address from a digest and signature
pub fn recover_address(
    hash: &[u8; 32],
    signature: &Eip712Signature,
) -> Result<Address, Eip712Error> {
    check_scalar("r", &signature.r)?;
    check_scalar("s", &signature.s)?;

    let recovery_id = RecoveryId::from_i32(i32::from(signature.recovery_id()?))
        .map_err(|e| Eip712Error::InvalidSignature(e.to_string()))?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes[0..32].copy_from_slice(&signature.r);
    sig_bytes[32..64].copy_from_slice(&signature.s);

    let recoverable_sig = RecoverableSignature::from_compact(&sig_bytes, recovery_id)
        .map_err(|e| Eip712Error::InvalidSignature(e.to_string()))?;

    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(*hash);
    let public_key = secp
        .recover_ecdsa(&message, &recoverable_sig)
        .map_err(|e| Eip712Error::InvalidSignature(e.to_string()))?;

    Ok(public_key_to_address(&public_key))
}

/// r and s must lie in [1, n-1]
fn check_scalar(label: &str, scalar: &[u8; 32]) -> Result<(), Eip712Error> {
    if scalar.iter().all(|&b| b == 0) {
        return Err(Eip712Error::InvalidSignature(format!("{} is zero", label)));
    }
    // Big-endian byte arrays of equal length compare like the integers
    if scalar[..] >= CURVE_ORDER[..] {
        return Err(Eip712Error::InvalidSignature(format!(
            "{} is not below the curve order",
            label
        )));
    }
    Ok(())
}

/// Convert a secp256k1 public key to an Ethereum address
fn public_key_to_address(public_key: &PublicKey) -> Address {
    // Uncompressed form is 0x04 || x || y; the prefix is not hashed
    let pubkey_bytes = public_key.serialize_uncompressed();
    let hash = keccak256(&pubkey_bytes[1..]);

    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..32]);
    Address(address)
}

#[cfg(test)]
mod signer_tests {
    use super::*;

    // Well-known local development key; never use it for real funds
    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn dev_key() -> Vec<u8> {
        hex::decode(DEV_KEY).unwrap()
    }

    fn create_test_typed_data() -> TypedData {
        let json = r#"{
            "types": {
                "Person": [
                    {"name": "name", "type": "string"},
                    {"name": "wallet", "type": "address"}
                ],
                "Mail": [
                    {"name": "from", "type": "Person"},
                    {"name": "to", "type": "Person"},
                    {"name": "contents", "type": "string"}
                ]
            },
            "primaryType": "Mail",
            "domain": {
                "name": "Ether Mail",
                "version": "1",
                "chainId": 1,
                "verifyingContract": "0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC"
            },
            "message": {
                "from": {
                    "name": "Cow",
                    "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826"
                },
                "to": {
                    "name": "Bob",
                    "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB"
                },
                "contents": "Hello, Bob!"
            }
        }"#;

        TypedData::from_json(json).unwrap()
    }

    #[test]
    fn test_address_from_private_key() {
        let address = address_from_private_key(&dev_key()).unwrap();
        assert_eq!(address.to_string(), DEV_ADDRESS);
    }

    #[test]
    fn test_sign_is_deterministic() {
        let typed_data = create_test_typed_data();
        let signature = sign_typed_data(&typed_data, &dev_key()).unwrap();
        assert_eq!(
            signature.to_hex(),
            "0x6ea8bb309a3401225701f3565e32519f94a0ea91a5910ce9229fe488e773584c\
             0390416a2190d9560219dab757ecca2029e63fa9d1c2aebf676cc25b9f03126a1b"
        );
        assert_eq!(signature, sign_typed_data(&typed_data, &dev_key()).unwrap());
    }

    #[test]
    fn test_sign_and_verify() {
        let typed_data = create_test_typed_data();
        let signature = sign_typed_data(&typed_data, &dev_key()).unwrap();

        let recovered = recover_typed_data_address(&typed_data, &signature).unwrap();
        assert_eq!(recovered.to_string(), DEV_ADDRESS);

        assert!(verify_typed_data(&typed_data, &signature, &recovered).unwrap());
        assert!(!verify_typed_data(&typed_data, &signature, &Address::ZERO).unwrap());
    }

    #[test]
    fn test_parity_v_accepted() {
        let hash = [7u8; 32];
        let signature = sign_hash(&hash, &dev_key()).unwrap();
        let parity = Eip712Signature::new(signature.r, signature.s, signature.v - 27);
        assert_eq!(
            recover_address(&hash, &parity).unwrap(),
            recover_address(&hash, &signature).unwrap()
        );
    }

    #[test]
    fn test_invalid_keys() {
        let hash = [1u8; 32];
        assert!(matches!(sign_hash(&hash, &[0u8; 32]), Err(Eip712Error::InvalidKey(_))));
        assert!(matches!(sign_hash(&hash, &[1u8; 31]), Err(Eip712Error::InvalidKey(_))));
        assert!(matches!(sign_hash(&hash, &CURVE_ORDER), Err(Eip712Error::InvalidKey(_))));
        assert!(matches!(sign_hash(&hash, &[0xffu8; 32]), Err(Eip712Error::InvalidKey(_))));
    }

    #[test]
    fn test_malformed_signatures_rejected() {
        let hash = [3u8; 32];
        let good = sign_hash(&hash, &dev_key()).unwrap();

        let zero_r = Eip712Signature::new([0u8; 32], good.s, good.v);
        assert!(matches!(recover_address(&hash, &zero_r), Err(Eip712Error::InvalidSignature(_))));

        let zero_s = Eip712Signature::new(good.r, [0u8; 32], good.v);
        assert!(matches!(recover_address(&hash, &zero_s), Err(Eip712Error::InvalidSignature(_))));

        let big_s = Eip712Signature::new(good.r, CURVE_ORDER, good.v);
        assert!(matches!(recover_address(&hash, &big_s), Err(Eip712Error::InvalidSignature(_))));

        let bad_v = Eip712Signature::new(good.r, good.s, 29);
        assert!(matches!(recover_address(&hash, &bad_v), Err(Eip712Error::InvalidSignature(_))));

        let expected = address_from_private_key(&dev_key()).unwrap();
        assert!(verify_signature(&expected, &hash, &bad_v).is_err());
    }

    #[test]
    fn test_wrong_digest_does_not_verify() {
        let expected = address_from_private_key(&dev_key()).unwrap();
        let signature = sign_hash(&[5u8; 32], &dev_key()).unwrap();
        assert!(verify_signature(&expected, &[5u8; 32], &signature).unwrap());

        match verify_signature(&expected, &[6u8; 32], &signature) {
            Ok(valid) => assert!(!valid),
            Err(e) => assert!(matches!(e, Eip712Error::InvalidSignature(_))),
        }
    }
}
