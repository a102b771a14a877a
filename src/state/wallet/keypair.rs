use ed25519_dalek::SigningKey;
use zeroize::Zeroizing;

use super::derivation_path::DerivationPath;
use super::seed_phrase::SeedPhrase;
use super::slip10;
use crate::api::wallet::WalletError;
use crate::api::wallet::WalletResult;

pub const PUBLIC_KEY_LENGTH: usize = ed25519_dalek::PUBLIC_KEY_LENGTH;

/// `secret seed || public key`, the layout Solana tooling expects.
pub const PRIVATE_KEY_LENGTH: usize = ed25519_dalek::KEYPAIR_LENGTH;

/// An ed25519 signing keypair.
///
/// The public key is a pure function of the 32-byte secret seed. Secret bytes
/// are wiped when the keypair is dropped.
#[derive(Clone, Debug)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl PartialEq for Keypair {
    fn eq(&self, other: &Self) -> bool {
        self.signing_key.to_bytes() == other.signing_key.to_bytes()
    }
}

impl Eq for Keypair {}

impl Keypair {
    pub fn from_secret_seed(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// Rebuilds a keypair from its 64-byte form, checking that the public half
    /// belongs to the secret half.
    pub fn from_private_key_bytes(bytes: &[u8; PRIVATE_KEY_LENGTH]) -> WalletResult<Self> {
        let signing_key = SigningKey::from_keypair_bytes(bytes).map_err(|_| {
            WalletError::InvalidKeyEncoding(
                "public half of private key does not match its secret half".to_owned(),
            )
        })?;
        Ok(Self { signing_key })
    }

    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn private_key_bytes(&self) -> Zeroizing<[u8; PRIVATE_KEY_LENGTH]> {
        Zeroizing::new(self.signing_key.to_keypair_bytes())
    }
}

/// SLIP-0010 derivation of the keypair at `path` below a BIP-39 seed.
pub fn derive_keypair(seed: &[u8], path: &DerivationPath) -> WalletResult<Keypair> {
    let extended = slip10::derive_path(seed, path)?;
    Ok(Keypair::from_secret_seed(extended.private_key()))
}

/// Phrase → seed (empty passphrase) → keypair on the wallet path.
pub fn keypair_from_phrase(phrase: &SeedPhrase) -> WalletResult<Keypair> {
    let seed = phrase.to_seed("")?;
    derive_keypair(seed.as_slice(), &DerivationPath::solana())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use ed25519_dalek::Signer;
    use ed25519_dalek::Verifier;

    use super::*;

    const ABANDON_ABOUT: &str = "abandon abandon abandon abandon abandon abandon \
         abandon abandon abandon abandon abandon about";

    #[test]
    fn same_phrase_gives_same_keypair() {
        let phrase = SeedPhrase::from_phrase(ABANDON_ABOUT).unwrap();
        let a = keypair_from_phrase(&phrase).unwrap();
        let b = keypair_from_phrase(&phrase).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn private_key_layout_is_secret_then_public() {
        let keypair = Keypair::from_secret_seed(&[7u8; 32]);
        let bytes = keypair.private_key_bytes();
        assert_eq!([7u8; 32], bytes[..32]);
        assert_eq!(keypair.public_key(), bytes[32..]);
        assert_eq!(keypair, Keypair::from_private_key_bytes(&bytes).unwrap());
    }

    #[test]
    fn mismatched_public_half_is_rejected() {
        let mut bytes = *Keypair::from_secret_seed(&[7u8; 32]).private_key_bytes();
        bytes[32..].copy_from_slice(&Keypair::from_secret_seed(&[8u8; 32]).public_key());
        assert!(matches!(
            Keypair::from_private_key_bytes(&bytes),
            Err(WalletError::InvalidKeyEncoding(_))
        ));
    }

    #[test]
    fn derived_keys_sign_and_verify() {
        let seed = [42u8; 64];
        let keypair = derive_keypair(&seed, &DerivationPath::solana()).unwrap();

        let message = b"walletforge";
        let signature = keypair.signing_key.sign(message);
        let verifying_key =
            ed25519_dalek::VerifyingKey::from_bytes(&keypair.public_key()).unwrap();
        assert!(verifying_key.verify(message, &signature).is_ok());
    }

    #[test]
    fn different_seeds_give_different_keys() {
        let a = derive_keypair(&[1u8; 64], &DerivationPath::solana()).unwrap();
        let b = derive_keypair(&[2u8; 64], &DerivationPath::solana()).unwrap();
        assert_ne!(a.public_key(), b.public_key());
    }
}
