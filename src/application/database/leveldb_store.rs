use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use leveldb::batch::Batch;
use leveldb::batch::WriteBatch;
use leveldb::database::Database;
use leveldb::iterator::Iterable;
use leveldb::options::Options;
use leveldb::options::ReadOptions;
use leveldb::options::WriteOptions;
use tokio::task;
use tracing::error;
use tracing::info;

use super::keyspace::ChangeSet;
use super::keyspace::Keyspace;
use super::keyspace::StoredValue;
use super::memory_store::MemoryStore;
use super::transaction::RecordFields;
use super::transaction::Transaction;
use super::KvStore;
use super::StorageError;
use crate::application::locks::tokio::LockCallbackFn;

/// One write of a [`WriteBatchAsync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WriteBatchOpAsync {
    Write(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// The owned writes of one commit.
///
/// `leveldb::batch::WriteBatch` cannot cross threads, so a commit collects its
/// writes here and the blocking task turns them into the real batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct WriteBatchAsync(Vec<WriteBatchOpAsync>);

impl WriteBatchAsync {
    pub(crate) fn op_write(&mut self, key: &str, value: Vec<u8>) {
        self.0
            .push(WriteBatchOpAsync::Write(key.as_bytes().to_vec(), value));
    }

    pub(crate) fn op_delete(&mut self, key: &str) {
        self.0
            .push(WriteBatchOpAsync::Delete(key.as_bytes().to_vec()));
    }

    /// One write per changed key: the JSON of the new value, or a delete.
    pub(crate) fn from_change_set(change_set: &ChangeSet) -> Result<Self, StorageError> {
        let mut batch = Self::default();
        for (key, value) in change_set.iter() {
            match value {
                Some(value) => batch.op_write(key, serde_json::to_vec(value)?),
                None => batch.op_delete(key),
            }
        }
        Ok(batch)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

/// Blocking handle on the LevelDB database. Every method must run inside
/// `spawn_blocking`.
#[derive(Clone)]
struct WalletLevelDb {
    database: Arc<Database>,
}

impl std::fmt::Debug for WalletLevelDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletLevelDb").finish_non_exhaustive()
    }
}

impl WalletLevelDb {
    /// Opens or creates the database in directory `path`.
    fn open(path: &Path) -> Result<Self, StorageError> {
        create_private_dir(path)?;

        // `Options` is not `Send`; build it on the blocking thread.
        let mut options = Options::new();
        options.create_if_missing = true;

        let database = Database::open(path, &options)
            .map_err(|e| StorageError::Database(format!("open {}: {e}", path.display())))?;
        Ok(Self {
            database: Arc::new(database),
        })
    }

    /// Reads every entry into a fresh keyspace.
    fn load(&self) -> Result<Keyspace, StorageError> {
        let mut entries = BTreeMap::new();
        for (key, value) in self.database.iter(&ReadOptions::new()) {
            let key = String::from_utf8(key.to_vec()).map_err(|e| {
                StorageError::Database(format!("key is not valid utf-8: {e}"))
            })?;
            let value: StoredValue = serde_json::from_slice(&value[..])?;
            entries.insert(key, value);
        }
        Ok(Keyspace::from_entries(entries))
    }

    /// Applies `entries` atomically and waits for the write to reach disk.
    fn batch_write(&self, entries: WriteBatchAsync) -> Result<(), StorageError> {
        let batch = WriteBatch::new();
        for op in entries.0 {
            match op {
                WriteBatchOpAsync::Write(key_bytes, value_bytes) => {
                    batch.put(&key_bytes, &value_bytes);
                }
                WriteBatchOpAsync::Delete(key_bytes) => {
                    batch.delete(&key_bytes);
                }
            }
        }

        let mut write_options = WriteOptions::new();
        write_options.sync = true;
        self.database
            .write(&write_options, &batch)
            .map_err(|e| StorageError::Database(e.to_string()))
    }
}

/// The database holds seed phrases: owner access only.
fn create_private_dir(path: &Path) -> Result<(), StorageError> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// A [`KvStore`] persisted in a LevelDB database.
///
/// Every key of the keyspace is one LevelDB entry holding the JSON of its
/// [`StoredValue`]. The whole keyspace is loaded into a [`MemoryStore`] on
/// open and reads are served from there. A commit stages its changes under
/// the memory store's write lock, writes them as one synced `WriteBatch` and
/// only then makes them visible to readers.
///
/// LevelDB locks its directory: one `LevelDbStore` (and its clones) per path
/// at a time.
#[derive(Debug, Clone)]
pub struct LevelDbStore {
    path: PathBuf,
    database: WalletLevelDb,
    memory: MemoryStore,
}

impl LevelDbStore {
    /// Opens the database in directory `path`, creating it (and any missing
    /// parents) if needed.
    pub async fn open(
        path: impl Into<PathBuf>,
        lock_callback: Option<LockCallbackFn>,
    ) -> Result<Self, StorageError> {
        let path = path.into();
        let open_path = path.clone();
        let (database, keyspace) = task::spawn_blocking(move || {
            let database = WalletLevelDb::open(&open_path)?;
            let keyspace = database.load()?;
            Ok::<_, StorageError>((database, keyspace))
        })
        .await
        .map_err(|e| StorageError::Unavailable(format!("database open task failed: {e}")))??;

        info!(
            "opened wallet database at {} ({} keys)",
            path.display(),
            keyspace.len()
        );

        Ok(Self {
            path,
            database,
            memory: MemoryStore::from_keyspace(keyspace, lock_callback),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stage, write, publish. Holds the memory store's write lock throughout
    /// so guards are checked against the state the batch lands on.
    async fn commit_in_place(&self, transaction: Transaction) -> Result<(), StorageError> {
        let staged = self.memory.stage(&transaction).await?;
        let batch = WriteBatchAsync::from_change_set(staged.change_set())?;

        let database = self.database.clone();
        match task::spawn_blocking(move || database.batch_write(batch)).await {
            Ok(Ok(())) => {
                staged.publish();
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(join_error) => {
                // the batch may or may not have been written.
                error!(
                    "batch write to {} did not complete: {join_error}",
                    self.path.display()
                );
                Err(StorageError::Indeterminate(join_error.to_string()))
            }
        }
    }
}

#[async_trait]
impl KvStore for LevelDbStore {
    async fn hash_get_all(&self, key: &str) -> Result<Option<RecordFields>, StorageError> {
        self.memory.hash_get_all(key).await
    }

    async fn hash_get_many(
        &self,
        keys: &[String],
    ) -> Result<Vec<Option<RecordFields>>, StorageError> {
        self.memory.hash_get_many(keys).await
    }

    async fn hash_exists(&self, key: &str, field: &str) -> Result<bool, StorageError> {
        self.memory.hash_exists(key, field).await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StorageError> {
        self.memory.set_members(key).await
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StorageError> {
        self.memory.set_contains(key, member).await
    }

    async fn counter_get(&self, key: &str) -> Result<i64, StorageError> {
        self.memory.counter_get(key).await
    }

    async fn list_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, StorageError> {
        self.memory.list_range(key, start, stop).await
    }

    /// Runs on its own task: a caller that stops polling cannot separate the
    /// disk write from the in-memory publish.
    async fn commit(&self, transaction: Transaction) -> Result<(), StorageError> {
        let store = self.clone();
        task::spawn(async move { store.commit_in_place(transaction).await })
            .await
            .map_err(|join_error| {
                error!("commit task for {} failed: {join_error}", self.path.display());
                StorageError::Indeterminate(join_error.to_string())
            })?
    }
}
