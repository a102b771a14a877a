//! SLIP-0010 hierarchical derivation for ed25519.
//!
//! Only hardened children exist on this curve, so derivation needs nothing
//! but HMAC-SHA512 over the parent's private key and chain code.

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha512;
use zeroize::Zeroize;
use zeroize::ZeroizeOnDrop;

use super::derivation_path::DerivationPath;
use super::derivation_path::HARDENED_OFFSET;
use crate::api::wallet::WalletError;
use crate::api::wallet::WalletResult;

type HmacSha512 = Hmac<Sha512>;

const MASTER_HMAC_KEY: &[u8] = b"ed25519 seed";

/// A private key together with the chain code needed to derive its children.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ExtendedKey {
    key: [u8; 32],
    chain_code: [u8; 32],
}

impl std::fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtendedKey").finish_non_exhaustive()
    }
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> WalletResult<ExtendedKey> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| WalletError::Failed(format!("hmac init failed: {e}")))?;
    for part in parts {
        mac.update(part);
    }

    let mut digest = [0u8; 64];
    digest.copy_from_slice(&mac.finalize().into_bytes());
    let mut extended = ExtendedKey {
        key: [0u8; 32],
        chain_code: [0u8; 32],
    };
    extended.key.copy_from_slice(&digest[..32]);
    extended.chain_code.copy_from_slice(&digest[32..]);
    digest.zeroize();

    Ok(extended)
}

impl ExtendedKey {
    /// `I = HMAC-SHA512("ed25519 seed", seed)`
    pub fn master(seed: &[u8]) -> WalletResult<Self> {
        hmac_sha512(MASTER_HMAC_KEY, &[seed])
    }

    /// `I = HMAC-SHA512(chain_code, 0x00 || key || ser32(index))`, where
    /// `index` already carries [`HARDENED_OFFSET`].
    pub fn derive_hardened(&self, index: u32) -> WalletResult<Self> {
        if index < HARDENED_OFFSET {
            return Err(WalletError::Failed(format!(
                "child index {index} is not hardened; ed25519 only supports hardened derivation"
            )));
        }
        hmac_sha512(&self.chain_code, &[&[0x00], &self.key, &index.to_be_bytes()])
    }

    pub fn private_key(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }
}

/// Walks `path` from the master key of `seed`.
pub fn derive_path(seed: &[u8], path: &DerivationPath) -> WalletResult<ExtendedKey> {
    path.hardened_indices()
        .try_fold(ExtendedKey::master(seed)?, |parent, index| {
            parent.derive_hardened(index)
        })
}
