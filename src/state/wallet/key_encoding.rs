use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde::Serialize;
use zeroize::Zeroizing;

use super::keypair::PRIVATE_KEY_LENGTH;
use super::keypair::PUBLIC_KEY_LENGTH;
use crate::api::wallet::WalletError;
use crate::api::wallet::WalletResult;

/// Text encodings offered for the 64-byte private key.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    clap::ValueEnum,
)]
#[strum(serialize_all = "lowercase")]
pub enum SecretEncoding {
    /// standard alphabet, padded. Used for stored records.
    #[default]
    Base64,
    Hex,
}

/// Base-58 (Bitcoin alphabet), the conventional Solana address form.
pub fn encode_public_key(public_key: &[u8; PUBLIC_KEY_LENGTH]) -> String {
    bs58::encode(public_key).into_string()
}

pub fn decode_public_key(encoded: &str) -> WalletResult<[u8; PUBLIC_KEY_LENGTH]> {
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| WalletError::InvalidKeyEncoding(format!("public key: {e}")))?;

    bytes.try_into().map_err(|b: Vec<u8>| {
        WalletError::InvalidKeyEncoding(format!(
            "public key must be {PUBLIC_KEY_LENGTH} bytes, got {}",
            b.len()
        ))
    })
}

pub fn encode_private_key(
    private_key: &[u8; PRIVATE_KEY_LENGTH],
    encoding: SecretEncoding,
) -> String {
    match encoding {
        SecretEncoding::Base64 => BASE64.encode(private_key),
        SecretEncoding::Hex => hex::encode(private_key),
    }
}

pub fn decode_private_key(
    encoded: &str,
    encoding: SecretEncoding,
) -> WalletResult<Zeroizing<[u8; PRIVATE_KEY_LENGTH]>> {
    let bytes = Zeroizing::new(match encoding {
        SecretEncoding::Base64 => BASE64
            .decode(encoded)
            .map_err(|e| WalletError::InvalidKeyEncoding(format!("private key: {e}")))?,
        SecretEncoding::Hex => hex::decode(encoded)
            .map_err(|e| WalletError::InvalidKeyEncoding(format!("private key: {e}")))?,
    });

    if bytes.len() != PRIVATE_KEY_LENGTH {
        return Err(WalletError::InvalidKeyEncoding(format!(
            "private key must be {PRIVATE_KEY_LENGTH} bytes, got {}",
            bytes.len()
        )));
    }

    let mut out = Zeroizing::new([0u8; PRIVATE_KEY_LENGTH]);
    out.copy_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use proptest::prop_assert_eq;
    use test_strategy::proptest;

    use super::*;

    #[test]
    fn known_base58_values() {
        assert_eq!("11111111111111111111111111111111", encode_public_key(&[0u8; 32]));
        assert_eq!([0u8; 32], decode_public_key("11111111111111111111111111111111").unwrap());
    }

    #[test]
    fn wrong_lengths_are_rejected() {
        // 31 zero bytes
        let short = bs58::encode([0u8; 31]).into_string();
        assert!(matches!(
            decode_public_key(&short),
            Err(WalletError::InvalidKeyEncoding(_))
        ));

        let short_secret = BASE64.encode([1u8; 32]);
        assert!(matches!(
            decode_private_key(&short_secret, SecretEncoding::Base64),
            Err(WalletError::InvalidKeyEncoding(_))
        ));
        assert!(decode_private_key(&"ab".repeat(63), SecretEncoding::Hex).is_err());
    }

    #[test]
    fn invalid_alphabets_are_rejected() {
        // 0, O, I and l are not in the base-58 alphabet
        assert!(decode_public_key("0OIl").is_err());
        assert!(decode_private_key("not base64!", SecretEncoding::Base64).is_err());
        assert!(decode_private_key("zz", SecretEncoding::Hex).is_err());
    }

    #[test]
    fn encodings_parse_from_lowercase_names() {
        assert_eq!(SecretEncoding::Hex, "hex".parse().unwrap());
        assert_eq!("base64", SecretEncoding::Base64.to_string());
    }

    #[proptest(cases = 64)]
    fn private_key_decodes_to_same_bytes(
        #[strategy(proptest::array::uniform32(proptest::num::u8::ANY))] half: [u8; 32],
    ) {
        let mut key = [0u8; PRIVATE_KEY_LENGTH];
        key[..32].copy_from_slice(&half);
        key[32..].copy_from_slice(&half);

        for encoding in [SecretEncoding::Base64, SecretEncoding::Hex] {
            let encoded = encode_private_key(&key, encoding);
            prop_assert_eq!(key, *decode_private_key(&encoded, encoding).unwrap());
        }
        prop_assert_eq!(half, decode_public_key(&encode_public_key(&half)).unwrap());
    }
}
