use std::fmt;
use std::str::FromStr;

use bip39::Language;
use bip39::Mnemonic;
use bip39::Seed;
use itertools::Itertools;
use rand::rngs::OsRng;
use rand::TryRngCore;
use serde::Deserialize;
use serde::Serialize;
use zeroize::Zeroize;
use zeroize::Zeroizing;

use crate::api::wallet::WalletError;
use crate::api::wallet::WalletResult;

/// Length of the BIP-39 seed produced by PBKDF2.
pub const SEED_LENGTH: usize = 64;

/// Entropy strengths accepted for new seed phrases.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::Display,
)]
pub enum EntropySize {
    #[default]
    #[strum(to_string = "128")]
    Bits128,
    #[strum(to_string = "160")]
    Bits160,
    #[strum(to_string = "192")]
    Bits192,
    #[strum(to_string = "224")]
    Bits224,
    #[strum(to_string = "256")]
    Bits256,
}

impl EntropySize {
    pub fn bits(self) -> usize {
        match self {
            Self::Bits128 => 128,
            Self::Bits160 => 160,
            Self::Bits192 => 192,
            Self::Bits224 => 224,
            Self::Bits256 => 256,
        }
    }

    pub fn bytes(self) -> usize {
        self.bits() / 8
    }

    /// One word per 11 bits of entropy plus checksum.
    pub fn word_count(self) -> usize {
        (self.bits() + self.bits() / 32) / 11
    }

    fn from_word_count(words: usize) -> Option<Self> {
        use strum::IntoEnumIterator;
        Self::iter().find(|size| size.word_count() == words)
    }
}

impl TryFrom<usize> for EntropySize {
    type Error = WalletError;

    fn try_from(bits: usize) -> Result<Self, Self::Error> {
        match bits {
            128 => Ok(Self::Bits128),
            160 => Ok(Self::Bits160),
            192 => Ok(Self::Bits192),
            224 => Ok(Self::Bits224),
            256 => Ok(Self::Bits256),
            other => Err(WalletError::UnsupportedEntropySize(other)),
        }
    }
}

impl FromStr for EntropySize {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bits = s
            .trim()
            .parse::<usize>()
            .map_err(|_| WalletError::Failed(format!("`{s}` is not a bit count")))?;
        Self::try_from(bits)
    }
}

/// A checksum-valid BIP-39 English mnemonic.
///
/// Words are held in normalized form (single spaces, lowercase) and wiped from
/// memory on drop. `Debug` never prints them.
#[derive(Clone, PartialEq, Eq)]
pub struct SeedPhrase {
    phrase: String,
    entropy_size: EntropySize,
}

impl fmt::Debug for SeedPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedPhrase")
            .field("words", &self.entropy_size.word_count())
            .field("phrase", &"<redacted>")
            .finish()
    }
}

impl Drop for SeedPhrase {
    fn drop(&mut self) {
        self.phrase.zeroize();
    }
}

impl SeedPhrase {
    /// Draws fresh entropy from the operating system and encodes it.
    ///
    /// There is no fallback: if the OS source fails the error is returned.
    pub fn generate(size: EntropySize) -> WalletResult<Self> {
        let mut entropy = Zeroizing::new(vec![0u8; size.bytes()]);
        OsRng
            .try_fill_bytes(&mut entropy)
            .map_err(|e| WalletError::EntropyUnavailable(e.to_string()))?;

        Self::from_entropy(&entropy)
    }

    /// Encodes raw entropy as a phrase. The entropy length must be one of the
    /// supported [`EntropySize`]s.
    pub fn from_entropy(entropy: &[u8]) -> WalletResult<Self> {
        let entropy_size = EntropySize::try_from(entropy.len() * 8)?;
        let mnemonic = Mnemonic::from_entropy(entropy, Language::English)
            .map_err(|e| WalletError::Failed(format!("could not encode entropy: {e}")))?;

        Ok(Self {
            phrase: mnemonic.phrase().to_owned(),
            entropy_size,
        })
    }

    /// Parses and validates a phrase. Whitespace between words is normalized
    /// and case is ignored; the checksum and every word must be valid.
    pub fn from_phrase(phrase: &str) -> WalletResult<Self> {
        let normalized = Zeroizing::new(phrase.split_whitespace().join(" ").to_lowercase());
        let words = normalized.split(' ').filter(|w| !w.is_empty()).count();

        let entropy_size = EntropySize::from_word_count(words).ok_or_else(|| {
            WalletError::InvalidSeedPhrase(format!("expected 12, 15, 18, 21 or 24 words, got {words}"))
        })?;

        Mnemonic::validate(&normalized, Language::English)
            .map_err(|e| WalletError::InvalidSeedPhrase(e.to_string()))?;

        Ok(Self {
            phrase: normalized.as_str().to_owned(),
            entropy_size,
        })
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn words(&self) -> Vec<&str> {
        self.phrase.split(' ').collect()
    }

    pub fn entropy_size(&self) -> EntropySize {
        self.entropy_size
    }

    pub fn entropy_bits(&self) -> usize {
        self.entropy_size.bits()
    }

    /// Stretches the phrase into a 64-byte seed (PBKDF2-HMAC-SHA512, 2048
    /// rounds, salt `"mnemonic" + passphrase`).
    pub fn to_seed(&self, passphrase: &str) -> WalletResult<Zeroizing<[u8; SEED_LENGTH]>> {
        let mnemonic = Mnemonic::from_phrase(&self.phrase, Language::English)
            .map_err(|e| WalletError::InvalidSeedPhrase(e.to_string()))?;
        let seed = Seed::new(&mnemonic, passphrase);

        let mut out = Zeroizing::new([0u8; SEED_LENGTH]);
        out.copy_from_slice(seed.as_bytes());
        Ok(out)
    }
}

/// Generates a new phrase for a bit count given as a plain number.
pub fn generate_seed_phrase(entropy_bits: usize) -> WalletResult<SeedPhrase> {
    SeedPhrase::generate(EntropySize::try_from(entropy_bits)?)
}

/// Checks a phrase without keeping it around.
pub fn validate_seed_phrase(phrase: &str) -> bool {
    SeedPhrase::from_phrase(phrase).is_ok()
}
