use std::path::PathBuf;

use super::transaction::Guard;

/// Errors reported by a [`KvStore`](super::KvStore).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    /// the store could not be reached or refused the request.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// a transaction guard did not hold at commit time. nothing was written.
    #[error("transaction guard failed: {0}")]
    GuardFailed(Guard),

    #[error("key `{key}` holds a {found} value, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// the commit may or may not have been applied.
    #[error("commit outcome unknown: {0}")]
    Indeterminate(String),

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// the underlying LevelDB database reported an error.
    #[error("database error: {0}")]
    Database(String),

    #[error("value serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
