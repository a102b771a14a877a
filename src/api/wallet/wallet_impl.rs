// private module.  no need for module docs.

use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;

use super::error::WalletResult;
use super::requests::GenerateRequest;
use super::requests::ListPolicy;
use crate::application::database::KvStore;
use crate::state::wallet::aggregate_stats::AggregateStats;
use crate::state::wallet::aggregate_stats::ConsistencyReport;
use crate::state::wallet::batch::Batch;
use crate::state::wallet::batch::GeneratedBatch;
use crate::state::wallet::batch_generator::BatchGenerator;
use crate::state::wallet::seed_phrase::EntropySize;
use crate::state::wallet::wallet_database::WalletDatabase;
use crate::state::wallet::wallet_generator::WalletGenerator;
use crate::state::wallet::wallet_record::WalletRecord;

/// provides an API for generating and managing stored wallets.
///
/// Generation runs off the async executor; every write is a single atomic
/// commit against the underlying [`KvStore`]. Methods taking a `now` use it
/// as the creation time and for the daily counter; the others use the
/// current time.
///
/// `WalletForge` is cheap to clone and all clones share one store.
#[derive(Debug, Clone)]
pub struct WalletForge {
    database: WalletDatabase,
    generator: BatchGenerator,
}

// these methods just call the state layer, so the public API is easy to read
// and digest.  Please keep it that way.
impl WalletForge {
    pub fn new(store: Arc<dyn KvStore>, entropy_size: EntropySize) -> Self {
        Self {
            database: WalletDatabase::new(store),
            generator: BatchGenerator::new(WalletGenerator::new(entropy_size)),
        }
    }

    /// a forge over a fresh in-memory store, producing 12-word phrases.
    pub fn in_memory() -> Self {
        Self {
            database: WalletDatabase::in_memory(),
            generator: BatchGenerator::default(),
        }
    }

    pub fn database(&self) -> &WalletDatabase {
        &self.database
    }

    /// generate a batch of wallets and persist it.
    ///
    /// The returned batch is the only place the new secrets are handed out
    /// besides the store itself; convert it with `GenerateResponse::from` for
    /// a secret-free view.
    pub async fn generate_batch(
        &self,
        request: &GenerateRequest,
    ) -> WalletResult<GeneratedBatch> {
        self.generate_batch_at(request, Utc::now()).await
    }

    pub async fn generate_batch_at(
        &self,
        request: &GenerateRequest,
        now: DateTime<Utc>,
    ) -> WalletResult<GeneratedBatch> {
        let batch = self.preview_batch_at(request, now).await?;
        self.database.save_batch(&batch, now).await?;
        Ok(batch)
    }

    /// generate a batch without storing it.
    pub async fn preview_batch_at(
        &self,
        request: &GenerateRequest,
        now: DateTime<Utc>,
    ) -> WalletResult<GeneratedBatch> {
        self.generator
            .generate_batch(request.count, request.prefix.clone(), now)
            .await
    }

    /// rebuild the wallet behind `phrase`, optionally persisting it as a
    /// one-wallet batch.
    pub async fn recover(
        &self,
        phrase: &str,
        prefix: Option<String>,
        save: bool,
    ) -> WalletResult<GeneratedBatch> {
        let now = Utc::now();
        let batch = self.generator.recover(phrase, prefix, now).await?;
        if save {
            self.database.save_batch(&batch, now).await?;
        }
        Ok(batch)
    }

    /// all stored wallets, newest first, with secrets per `policy`.
    pub async fn list(&self, policy: ListPolicy) -> WalletResult<Vec<WalletRecord>> {
        let records = self.database.list_all().await?;
        Ok(records.into_iter().map(|r| policy.apply(r)).collect())
    }

    pub async fn get(&self, id: &str, policy: ListPolicy) -> WalletResult<WalletRecord> {
        self.database.get(id).await.map(|r| policy.apply(r))
    }

    pub async fn delete(&self, id: &str) -> WalletResult<()> {
        self.database.delete(id).await
    }

    pub async fn stats(&self) -> WalletResult<AggregateStats> {
        self.database.get_stats(Utc::now()).await
    }

    pub async fn stats_at(&self, now: DateTime<Utc>) -> WalletResult<AggregateStats> {
        self.database.get_stats(now).await
    }

    pub async fn recent_batches(&self, limit: usize) -> WalletResult<Vec<Batch>> {
        self.database.recent_batches(limit).await
    }

    pub async fn audit(&self) -> WalletResult<ConsistencyReport> {
        self.database.audit().await
    }

    pub async fn reconcile(&self) -> WalletResult<ConsistencyReport> {
        self.database.reconcile().await
    }

    /// check that a stored wallet still derives from its seed phrase.
    pub async fn verify(&self, id: &str) -> WalletResult<bool> {
        self.database.verify_wallet(id).await
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::api::wallet::GenerateResponse;
    use crate::api::wallet::WalletError;

    #[tokio::test]
    async fn generated_batch_is_listed_redacted_by_default() {
        let forge = WalletForge::in_memory();
        let batch = forge
            .generate_batch(&GenerateRequest::new(2, Some("T".into())))
            .await
            .unwrap();

        let listed = forge.list(ListPolicy::default()).await.unwrap();
        assert_eq!(2, listed.len());
        assert!(listed.iter().all(WalletRecord::is_redacted));

        let full = forge.list(ListPolicy::Full).await.unwrap();
        assert!(full.iter().all(|r| !r.is_redacted()));

        let response = GenerateResponse::from(&batch);
        assert_eq!(batch.id(), response.batch_id);
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains(&batch.records()[0].private_key));
        assert!(!json.contains(&batch.records()[0].seed_phrase));
    }

    #[tokio::test]
    async fn preview_does_not_touch_storage() {
        let forge = WalletForge::in_memory();
        let now = Utc::now();
        forge
            .preview_batch_at(&GenerateRequest::new(3, None), now)
            .await
            .unwrap();
        assert_eq!(0, forge.stats_at(now).await.unwrap().total_wallets);
    }

    #[tokio::test]
    async fn invalid_request_writes_nothing() {
        let forge = WalletForge::in_memory();
        let err = forge
            .generate_batch(&GenerateRequest::new(0, None))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidBatchSize { .. }));
        assert_eq!(0, forge.stats().await.unwrap().total_wallets);
    }

    #[tokio::test]
    async fn recovered_wallet_can_be_saved_and_verified() {
        let forge = WalletForge::in_memory();
        let original = forge
            .generate_batch(&GenerateRequest::new(1, None))
            .await
            .unwrap();
        let phrase = original.records()[0].seed_phrase.clone();

        let unsaved = forge.recover(&phrase, None, false).await.unwrap();
        assert_eq!(1, forge.stats().await.unwrap().total_wallets);

        let saved = forge.recover(&phrase, Some("copy".into()), true).await.unwrap();
        assert_eq!(unsaved.records()[0].public_key, saved.records()[0].public_key);
        assert_eq!(2, forge.stats().await.unwrap().total_wallets);
        assert!(forge.verify(&saved.records()[0].id).await.unwrap());
    }
}
