use std::fmt::Debug;

use async_trait::async_trait;

use super::transaction::RecordFields;
use super::transaction::Transaction;
use super::StorageError;

/// The key-value collaborator that wallet persistence is written against.
///
/// Reads are independent. Every write goes through [`KvStore::commit`], which
/// applies a whole [`Transaction`] or nothing at all.
#[async_trait]
pub trait KvStore: Send + Sync + Debug {
    /// All fields of the hash at `key`, or `None` if the key is absent.
    async fn hash_get_all(&self, key: &str) -> Result<Option<RecordFields>, StorageError>;

    /// Reads several hashes. The result has one entry per key, in order.
    async fn hash_get_many(
        &self,
        keys: &[String],
    ) -> Result<Vec<Option<RecordFields>>, StorageError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.hash_get_all(key).await?);
        }
        Ok(out)
    }

    async fn hash_exists(&self, key: &str, field: &str) -> Result<bool, StorageError>;

    /// Members of the set at `key` in insertion order. Empty if absent.
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StorageError>;

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StorageError>;

    /// Current counter value; 0 if never written.
    async fn counter_get(&self, key: &str) -> Result<i64, StorageError>;

    /// Inclusive range of the list at `key`; negative indices count from the end.
    async fn list_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StorageError>;

    /// Atomically checks all guards and applies all write operations.
    async fn commit(&self, transaction: Transaction) -> Result<(), StorageError>;
}
