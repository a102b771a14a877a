use std::sync::Arc;

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use super::aggregate_stats::AggregateStats;
use super::aggregate_stats::ConsistencyReport;
use super::batch::Batch;
use super::batch::GeneratedBatch;
use super::wallet_record::format_timestamp;
use super::wallet_record::parse_timestamp;
use super::wallet_record::wallet_key;
use super::wallet_record::WalletRecord;
use crate::api::wallet::WalletError;
use crate::api::wallet::WalletResult;
use crate::application::database::KvStore;
use crate::application::database::MemoryStore;
use crate::application::database::RecordFields;
use crate::application::database::StorageError;
use crate::application::database::Transaction;

/// Set of all wallet ids, in insertion order.
pub const WALLET_INDEX_KEY: &str = "wallet:ids";

pub const TOTAL_WALLETS_KEY: &str = "stats:total_wallets";

/// Hash holding scalar stats such as [`LAST_GENERATED_FIELD`].
pub const STATS_META_KEY: &str = "stats:meta";

pub const LAST_GENERATED_FIELD: &str = "last_generated";

/// List of JSON-encoded [`Batch`] summaries, oldest first.
pub const BATCHES_KEY: &str = "batches";

/// Attempts `reconcile` makes before giving up on a store that keeps changing.
const RECONCILE_ATTEMPTS: usize = 3;

/// Per-day generation counter, keyed by UTC date.
pub fn daily_key(date: NaiveDate) -> String {
    format!("stats:daily:{}", date.format("%Y-%m-%d"))
}

/// Wallet records, their id index, batch history and counters on top of a
/// [`KvStore`].
///
/// Every compound update is one transaction, so the index and the counters
/// move together with the records they describe.
#[derive(Debug, Clone)]
pub struct WalletDatabase {
    store: Arc<dyn KvStore>,
}

impl WalletDatabase {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// A database backed by a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Persists every record of `batch` and updates the index, counters and
    /// batch history in one commit.
    ///
    /// Fails with [`WalletError::DuplicateWalletId`] if any id is already
    /// indexed; nothing is written in that case.
    #[instrument(skip_all, fields(batch_id = batch.id(), count = batch.len()))]
    pub async fn save_batch(
        &self,
        batch: &GeneratedBatch,
        now: DateTime<Utc>,
    ) -> WalletResult<String> {
        if batch.is_empty() {
            return Err(WalletError::InvalidBatchSize {
                requested: 0,
                max: *super::batch_generator::BATCH_SIZE_RANGE.end(),
            });
        }

        let count = i64::try_from(batch.len())
            .map_err(|_| WalletError::Failed("batch too large".to_owned()))?;

        let mut tx = Transaction::new();
        for record in batch.records() {
            tx.require_absent(WALLET_INDEX_KEY, record.id.clone());
            tx.op_hash_set(wallet_key(&record.id), record.to_fields());
            tx.op_set_add(WALLET_INDEX_KEY, record.id.clone());
        }
        tx.op_incr_by(TOTAL_WALLETS_KEY, count);
        tx.op_incr_by(daily_key(now.date_naive()), count);
        tx.op_hash_set(
            STATS_META_KEY,
            RecordFields::from([(LAST_GENERATED_FIELD.to_owned(), format_timestamp(&now))]),
        );
        tx.op_list_push(BATCHES_KEY, batch.batch().to_json()?);

        self.store.commit(tx).await.map_err(|e| match e {
            StorageError::GuardFailed(guard) => {
                WalletError::DuplicateWalletId(guard.member().unwrap_or_default().to_owned())
            }
            other => WalletError::from(other),
        })?;

        info!("saved batch {} with {} wallets", batch.id(), batch.len());
        Ok(batch.id().to_owned())
    }

    /// Every decodable record, newest first. Records sharing a timestamp keep
    /// the order in which they were indexed.
    ///
    /// Ids whose record is missing or corrupt are skipped and logged.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> WalletResult<Vec<WalletRecord>> {
        let ids = self.store.set_members(WALLET_INDEX_KEY).await?;
        let keys = ids.iter().map(|id| wallet_key(id)).collect::<Vec<_>>();
        let stored = self.store.hash_get_many(&keys).await?;
        let indexed = ids.len();

        // decoding checks every keypair, which is CPU-bound for large stores.
        let span = tracing::Span::current();
        let mut records =
            tokio::task::spawn_blocking(move || span.in_scope(|| decode_records(ids, stored)))
                .await
                .map_err(|e| WalletError::Failed(format!("record decoding task failed: {e}")))?;

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!("listed {} of {indexed} indexed wallets", records.len());
        Ok(records)
    }

    pub async fn get(&self, id: &str) -> WalletResult<WalletRecord> {
        match self.store.hash_get_all(&wallet_key(id)).await? {
            Some(fields) => WalletRecord::from_fields(id, &fields),
            None => Err(WalletError::NotFound(id.to_owned())),
        }
    }

    /// Removes the record, its index entry and one from the total, atomically.
    ///
    /// Fails with [`WalletError::NotFound`] if the id is not indexed, so
    /// deleting twice fails the second time and never double-decrements.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> WalletResult<()> {
        let mut tx = Transaction::new();
        tx.require_member(WALLET_INDEX_KEY, id);
        tx.op_delete(wallet_key(id));
        tx.op_set_remove(WALLET_INDEX_KEY, id);
        tx.op_incr_by(TOTAL_WALLETS_KEY, -1);

        self.store.commit(tx).await.map_err(|e| match e {
            StorageError::GuardFailed(_) => WalletError::NotFound(id.to_owned()),
            other => WalletError::from(other),
        })?;

        info!("deleted wallet {id}");
        Ok(())
    }

    /// Counters for the UTC day of `now` and overall.
    pub async fn get_stats(&self, now: DateTime<Utc>) -> WalletResult<AggregateStats> {
        let daily = daily_key(now.date_naive());
        let (total, today, meta, ids) = tokio::try_join!(
            self.store.counter_get(TOTAL_WALLETS_KEY),
            self.store.counter_get(&daily),
            self.store.hash_get_all(STATS_META_KEY),
            self.store.set_members(WALLET_INDEX_KEY),
        )?;

        let last_generated_at = meta
            .as_ref()
            .and_then(|m| m.get(LAST_GENERATED_FIELD))
            .and_then(|s| match parse_timestamp(s) {
                Ok(at) => Some(at),
                Err(e) => {
                    warn!("ignoring unreadable {LAST_GENERATED_FIELD} `{s}`: {e}");
                    None
                }
            });

        let stats = AggregateStats::new(total, today, last_generated_at, ids.len() as u64);
        if !stats.counters_agree() {
            warn!(
                "wallet counter {} disagrees with index size {}",
                stats.total_wallets, stats.indexed_wallets
            );
        }
        Ok(stats)
    }

    /// Up to `limit` batch summaries, newest first.
    pub async fn recent_batches(&self, limit: usize) -> WalletResult<Vec<Batch>> {
        if limit == 0 {
            return Ok(vec![]);
        }

        let start = -isize::try_from(limit).unwrap_or(isize::MAX);
        let entries = self.store.list_range(BATCHES_KEY, start, -1).await?;
        entries.iter().rev().map(|json| Batch::from_json(json)).collect()
    }

    /// Compares the total counter with the index and checks that every
    /// indexed id has a readable record.
    pub async fn audit(&self) -> WalletResult<ConsistencyReport> {
        let (total_counter, ids) = tokio::try_join!(
            self.store.counter_get(TOTAL_WALLETS_KEY),
            self.store.set_members(WALLET_INDEX_KEY),
        )?;
        let keys = ids.iter().map(|id| wallet_key(id)).collect::<Vec<_>>();
        let stored = self.store.hash_get_many(&keys).await?;

        let mut report = ConsistencyReport {
            total_counter,
            indexed_wallets: ids.len() as u64,
            ..Default::default()
        };
        for (id, fields) in ids.into_iter().zip(stored) {
            match fields {
                None => report.dangling_ids.push(id),
                Some(fields) => {
                    if WalletRecord::from_fields(&id, &fields).is_err() {
                        report.corrupt_ids.push(id);
                    }
                }
            }
        }

        Ok(report)
    }

    /// Drops dangling index entries and rewrites the total counter to match
    /// the index. Corrupt records are reported but left in place.
    ///
    /// Returns the report taken before the repair. The repair commits only if
    /// the index and counter are unchanged since the audit; a concurrent
    /// writer causes a fresh audit.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> WalletResult<ConsistencyReport> {
        for _ in 0..RECONCILE_ATTEMPTS {
            let report = self.audit().await?;
            if report.dangling_ids.is_empty()
                && report.total_counter == report.expected_total()
            {
                return Ok(report);
            }

            let mut tx = Transaction::new();
            tx.require_counter(TOTAL_WALLETS_KEY, report.total_counter);
            tx.require_set_size(
                WALLET_INDEX_KEY,
                usize::try_from(report.indexed_wallets).unwrap_or(usize::MAX),
            );
            for id in &report.dangling_ids {
                warn!("dropping dangling index entry {id}");
                tx.require_member(WALLET_INDEX_KEY, id.clone());
                tx.op_set_remove(WALLET_INDEX_KEY, id.clone());
            }
            tx.op_set_counter(TOTAL_WALLETS_KEY, report.expected_total());

            match self.store.commit(tx).await {
                Ok(()) => {
                    warn!(
                        "reset wallet counter from {} to {}",
                        report.total_counter,
                        report.expected_total()
                    );
                    return Ok(report);
                }
                Err(StorageError::GuardFailed(guard)) => {
                    debug!("store changed during reconcile ({guard}), retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(WalletError::Failed(format!(
            "store kept changing; reconcile gave up after {RECONCILE_ATTEMPTS} attempts"
        )))
    }

    /// Re-derives the wallet's keys from its seed phrase and compares them
    /// with the stored keys.
    pub async fn verify_wallet(&self, id: &str) -> WalletResult<bool> {
        let record = self.get(id).await?;
        let matches = tokio::task::spawn_blocking(move || record.matches_seed_phrase())
            .await
            .map_err(|e| WalletError::Failed(format!("verification task failed: {e}")))??;
        if !matches {
            warn!("wallet {id} does not match its seed phrase");
        }
        Ok(matches)
    }
}

/// Skips ids whose record is missing or corrupt, logging each.
fn decode_records(ids: Vec<String>, stored: Vec<Option<RecordFields>>) -> Vec<WalletRecord> {
    let mut records = Vec::with_capacity(ids.len());
    for (id, fields) in ids.iter().zip(stored) {
        match fields {
            None => warn!("indexed wallet {id} has no record, skipping"),
            Some(fields) => match WalletRecord::from_fields(id, &fields) {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping unreadable wallet {id}: {e}"),
            },
        }
    }
    records
}
