use async_trait::async_trait;
use tracing::debug;

use super::keyspace::ChangeSet;
use super::keyspace::Keyspace;
use super::transaction::RecordFields;
use super::transaction::Transaction;
use super::KvStore;
use super::StorageError;
use crate::application::locks::tokio::AtomicRw;
use crate::application::locks::tokio::AtomicRwWriteGuard;
use crate::application::locks::tokio::LockCallbackFn;

/// A volatile [`KvStore`] living entirely in process memory.
///
/// Used for `--in-memory` runs and throughout the test suite.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    keyspace: AtomicRw<Keyspace>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lock_callback(None)
    }

    /// Like [`MemoryStore::new`] but reports lock events on the keyspace to
    /// `callback`.
    pub fn with_lock_callback(callback: Option<LockCallbackFn>) -> Self {
        Self::from_keyspace(Keyspace::default(), callback)
    }

    pub(crate) fn from_keyspace(keyspace: Keyspace, callback: Option<LockCallbackFn>) -> Self {
        Self {
            keyspace: AtomicRw::from((keyspace, Some("MemoryStore"), callback)),
        }
    }

    /// A consistent copy of the whole keyspace.
    pub async fn snapshot(&self) -> Keyspace {
        self.keyspace.lock(|k| k.clone()).await
    }

    /// Takes the write lock and stages `transaction` against the keyspace.
    /// The caller decides whether to publish the changes via
    /// [`StagedCommit::publish`]; dropping it discards them and releases the
    /// lock.
    pub(crate) async fn stage(
        &self,
        transaction: &Transaction,
    ) -> Result<StagedCommit<'_>, StorageError> {
        let live = self.keyspace.lock_guard_mut().await;
        let change_set = live.stage(transaction)?;
        Ok(StagedCommit {
            live,
            change_set,
            write_ops: transaction.write_ops().len(),
        })
    }
}

/// The changes of one transaction, computed while the store's write lock is
/// held and not yet visible to readers.
#[derive(Debug)]
pub(crate) struct StagedCommit<'a> {
    live: AtomicRwWriteGuard<'a, Keyspace>,
    change_set: ChangeSet,
    write_ops: usize,
}

impl StagedCommit<'_> {
    pub(crate) fn change_set(&self) -> &ChangeSet {
        &self.change_set
    }

    pub(crate) fn publish(mut self) {
        self.live.publish(self.change_set);
        debug!(
            "committed {} write ops, commit #{}",
            self.write_ops,
            self.live.commit_count()
        );
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn hash_get_all(&self, key: &str) -> Result<Option<RecordFields>, StorageError> {
        self.keyspace.lock(|k| k.hash_get_all(key)).await
    }

    async fn hash_get_many(
        &self,
        keys: &[String],
    ) -> Result<Vec<Option<RecordFields>>, StorageError> {
        // one read lock for the whole lookup
        let keyspace = self.keyspace.lock_guard().await;
        keys.iter().map(|key| keyspace.hash_get_all(key)).collect()
    }

    async fn hash_exists(&self, key: &str, field: &str) -> Result<bool, StorageError> {
        self.keyspace.lock(|k| k.hash_exists(key, field)).await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StorageError> {
        self.keyspace.lock(|k| k.set_members(key)).await
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StorageError> {
        self.keyspace.lock(|k| k.set_contains(key, member)).await
    }

    async fn counter_get(&self, key: &str) -> Result<i64, StorageError> {
        self.keyspace.lock(|k| k.counter_get(key)).await
    }

    async fn list_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StorageError> {
        self.keyspace.lock(|k| k.list_range(key, start, stop)).await
    }

    async fn commit(&self, transaction: Transaction) -> Result<(), StorageError> {
        self.keyspace
            .lock_mut(|keyspace| {
                let change_set = keyspace.stage(&transaction)?;
                keyspace.publish(change_set);
                debug!(
                    "committed {} write ops, commit #{}",
                    transaction.write_ops().len(),
                    keyspace.commit_count()
                );
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::database::Guard;
    use crate::application::database::StoredValue;

    #[tokio::test]
    async fn guard_failure_writes_nothing() {
        let store = MemoryStore::new();

        let mut first = Transaction::new();
        first.op_set_add("ids", "a");
        first.op_incr_by("total", 1);
        store.commit(first).await.unwrap();

        let mut dup = Transaction::new();
        dup.require_absent("ids", "a");
        dup.op_set_add("ids", "a");
        dup.op_incr_by("total", 1);

        let err = store.commit(dup).await.unwrap_err();
        assert!(matches!(err, StorageError::GuardFailed(Guard::SetLacks { .. })));
        assert_eq!(store.counter_get("total").await.unwrap(), 1);
        assert_eq!(store.snapshot().await.commit_count(), 1);
    }

    #[tokio::test]
    async fn unpublished_stage_is_discarded() {
        let store = MemoryStore::new();
        let mut tx = Transaction::new();
        tx.op_incr_by("total", 5);

        let staged = store.stage(&tx).await.unwrap();
        assert_eq!(
            Some(Some(&StoredValue::Counter(5))),
            staged.change_set().get("total")
        );
        drop(staged);

        assert_eq!(store.counter_get("total").await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());

        let handles = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut tx = Transaction::new();
                    tx.op_set_add("ids", format!("id{i}"));
                    tx.op_incr_by("total", 1);
                    store.commit(tx).await
                })
            })
            .collect::<Vec<_>>();

        for result in futures::future::join_all(handles).await {
            result.unwrap().unwrap();
        }

        assert_eq!(store.counter_get("total").await.unwrap(), 32);
        assert_eq!(store.set_members("ids").await.unwrap().len(), 32);
    }

    #[tokio::test]
    async fn hash_get_many_preserves_key_order() {
        let store = MemoryStore::new();
        let mut tx = Transaction::new();
        tx.op_hash_set("b", [("f".to_owned(), "2".to_owned())].into());
        store.commit(tx).await.unwrap();

        let got = store
            .hash_get_many(&["a".to_owned(), "b".to_owned()])
            .await
            .unwrap();
        assert!(got[0].is_none());
        assert_eq!(got[1].as_ref().unwrap()["f"], "2");
    }
}
