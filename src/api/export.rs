//! provides common types used in the crate's public API
//!
//! They are exported here in one location for convenience.

pub use crate::api::wallet::GenerateRequest;
pub use crate::api::wallet::GenerateResponse;
pub use crate::api::wallet::ListPolicy;
pub use crate::api::wallet::WalletError;
pub use crate::api::wallet::WalletForge;
pub use crate::api::wallet::WalletResult;
pub use crate::application::config::cli_args::Args;
pub use crate::application::database::KvStore;
pub use crate::application::database::LevelDbStore;
pub use crate::application::database::MemoryStore;
pub use crate::state::wallet::aggregate_stats::AggregateStats;
pub use crate::state::wallet::aggregate_stats::ConsistencyReport;
pub use crate::state::wallet::batch::Batch;
pub use crate::state::wallet::batch::GeneratedBatch;
pub use crate::state::wallet::key_encoding::SecretEncoding;
pub use crate::state::wallet::seed_phrase::EntropySize;
pub use crate::state::wallet::seed_phrase::SeedPhrase;
pub use crate::state::wallet::wallet_record::WalletRecord;
pub use crate::state::wallet::wallet_record::WalletSummary;
