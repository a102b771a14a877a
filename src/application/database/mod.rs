//! The key-value storage collaborator that wallet persistence runs against.
//!
//! [`KvStore`] exposes typed reads over hashes, sets, counters and lists. All
//! writes are grouped into a [`Transaction`] and committed all-or-nothing.

mod error;
mod keyspace;
mod kv_store;
mod leveldb_store;
mod memory_store;
mod transaction;

pub use error::StorageError;
pub use keyspace::ChangeSet;
pub use keyspace::Keyspace;
pub use keyspace::StoredValue;
pub use kv_store::KvStore;
pub use leveldb_store::LevelDbStore;
pub use memory_store::MemoryStore;
pub use transaction::Guard;
pub use transaction::RecordFields;
pub use transaction::Transaction;
pub use transaction::WriteOperation;
