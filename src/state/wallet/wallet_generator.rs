use tracing::debug;

use super::keypair::keypair_from_phrase;
use super::keypair::Keypair;
use super::seed_phrase::EntropySize;
use super::seed_phrase::SeedPhrase;
use crate::api::wallet::WalletResult;

/// Produces phrase-backed keypairs on the fixed wallet path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalletGenerator {
    entropy_size: EntropySize,
}

impl WalletGenerator {
    pub fn new(entropy_size: EntropySize) -> Self {
        Self { entropy_size }
    }

    pub fn entropy_size(&self) -> EntropySize {
        self.entropy_size
    }

    /// Creates a wallet from fresh entropy, or recovers one from `existing`.
    ///
    /// A supplied phrase is validated before anything else happens and no
    /// entropy is drawn for it.
    pub fn generate_wallet(&self, existing: Option<&str>) -> WalletResult<(Keypair, SeedPhrase)> {
        let phrase = match existing {
            Some(words) => SeedPhrase::from_phrase(words)?,
            None => SeedPhrase::generate(self.entropy_size)?,
        };

        let keypair = keypair_from_phrase(&phrase)?;
        debug!(
            "derived keypair from {}-word phrase (recovered: {})",
            phrase.words().len(),
            existing.is_some()
        );

        Ok((keypair, phrase))
    }
}

/// [`WalletGenerator::generate_wallet`] with the default 12-word phrases.
pub fn generate_wallet(existing: Option<&str>) -> WalletResult<(Keypair, SeedPhrase)> {
    WalletGenerator::default().generate_wallet(existing)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::api::wallet::WalletError;

    #[test]
    fn recovery_reproduces_generated_wallet() {
        let (keypair, phrase) = generate_wallet(None).unwrap();
        let (recovered, recovered_phrase) = generate_wallet(Some(phrase.phrase())).unwrap();

        assert_eq!(keypair, recovered);
        assert_eq!(phrase, recovered_phrase);
    }

    #[test]
    fn fresh_wallets_differ() {
        let (a, _) = generate_wallet(None).unwrap();
        let (b, _) = generate_wallet(None).unwrap();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn entropy_size_controls_phrase_length() {
        let generator = WalletGenerator::new(EntropySize::Bits256);
        let (_, phrase) = generator.generate_wallet(None).unwrap();
        assert_eq!(24, phrase.words().len());
    }

    #[test]
    fn invalid_recovery_phrase_fails() {
        assert!(matches!(
            generate_wallet(Some("definitely not a seed phrase")),
            Err(WalletError::InvalidSeedPhrase(_))
        ));
    }
}
