use serde::Deserialize;
use serde::Serialize;

use crate::application::database::StorageError;

pub type WalletResult<T> = Result<T, WalletError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[non_exhaustive]
pub enum WalletError {
    #[error("batch size must be between 1 and {max}, got {requested}")]
    InvalidBatchSize { requested: usize, max: usize },

    #[error("unsupported entropy size: {0} bits")]
    UnsupportedEntropySize(usize),

    #[error("invalid seed phrase: {0}")]
    InvalidSeedPhrase(String),

    #[error("wallet not found: {0}")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// the store could not confirm whether a batch write was applied.
    #[error("batch commit incomplete: {0}")]
    PartialBatchFailure(String),

    #[error("wallet id already exists: {0}")]
    DuplicateWalletId(String),

    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("os entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("stored record `{id}` is corrupt: {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("operation failed.  reason: {0}")]
    Failed(String),
}

// convert anyhow::Error to a WalletError::Failed.
// note that anyhow Error is not serializable.
impl From<anyhow::Error> for WalletError {
    fn from(e: anyhow::Error) -> Self {
        Self::Failed(e.to_string())
    }
}

/// Context-free mapping. Callers that know what a failed guard means (for
/// example "id not indexed") translate [`StorageError::GuardFailed`] first.
impl From<StorageError> for WalletError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Indeterminate(_) => Self::PartialBatchFailure(e.to_string()),
            StorageError::TypeMismatch { ref key, .. } => Self::CorruptRecord {
                id: key.clone(),
                reason: e.to_string(),
            },
            StorageError::GuardFailed(_) => Self::Failed(e.to_string()),
            _ => Self::StorageUnavailable(e.to_string()),
        }
    }
}
