use std::fmt;
use std::str::FromStr;

/// Added to a child index to mark it hardened.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// BIP-44 purpose.
pub const PURPOSE: u32 = 44;

/// SLIP-0044 coin type registered for Solana.
pub const SOLANA_COIN_TYPE: u32 = 501;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DerivationPathError {
    #[error("derivation path must start with `m`")]
    MissingRoot,

    #[error("path segment `{0}` is not hardened; ed25519 only supports hardened derivation")]
    NotHardened(String),

    #[error("path segment `{0}` is not a valid child index")]
    InvalidIndex(String),
}

/// A BIP-32 style path in which every level is hardened.
///
/// Indices are stored without the hardened bit; [`Self::hardened_indices`]
/// yields the values that actually enter the derivation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DerivationPath {
    indices: Vec<u32>,
}

impl DerivationPath {
    /// The only path wallets are generated on: `m/44'/501'/0'/0'`.
    pub fn solana() -> Self {
        Self {
            indices: vec![PURPOSE, SOLANA_COIN_TYPE, 0, 0],
        }
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn depth(&self) -> usize {
        self.indices.len()
    }

    pub fn hardened_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.indices.iter().map(|i| i | HARDENED_OFFSET)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for index in &self.indices {
            write!(f, "/{index}'")?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = DerivationPathError;

    /// Accepts `m`, `m/0'`, `m/44'/501'/0H` and so on. Non-hardened segments
    /// are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = s.trim().split('/');
        if segments.next() != Some("m") {
            return Err(DerivationPathError::MissingRoot);
        }

        let indices = segments
            .map(|segment| {
                let Some(digits) = segment
                    .strip_suffix('\'')
                    .or_else(|| segment.strip_suffix('H'))
                    .or_else(|| segment.strip_suffix('h'))
                else {
                    return Err(DerivationPathError::NotHardened(segment.to_owned()));
                };

                match digits.parse::<u32>() {
                    Ok(index) if index < HARDENED_OFFSET => Ok(index),
                    _ => Err(DerivationPathError::InvalidIndex(segment.to_owned())),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { indices })
    }
}
