use std::collections::HashSet;
use std::ops::RangeInclusive;

use chrono::DateTime;
use chrono::Utc;
use rand::Rng;
use rayon::iter::IntoParallelIterator;
use rayon::iter::ParallelIterator;
use tracing::info;
use tracing::instrument;

use super::batch::GeneratedBatch;
use super::wallet_generator::WalletGenerator;
use super::wallet_record::WalletRecord;
use crate::api::wallet::WalletError;
use crate::api::wallet::WalletResult;

/// Number of wallets a single batch may contain.
pub const BATCH_SIZE_RANGE: RangeInclusive<usize> = 1..=100;

/// Length of the random part of wallet and batch ids.
const ID_SUFFIX_LENGTH: usize = 9;

const BASE36_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `{kind}_{unix millis}_{9 base-36 chars}`
fn new_id<R: Rng>(kind: &str, now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: String = (0..ID_SUFFIX_LENGTH)
        .map(|_| char::from(BASE36_ALPHABET[rng.random_range(0..BASE36_ALPHABET.len())]))
        .collect();
    format!("{kind}_{}_{suffix}", now.timestamp_millis())
}

/// `count` wallet ids, distinct from each other.
fn unique_wallet_ids<R: Rng>(count: usize, now: DateTime<Utc>, rng: &mut R) -> Vec<String> {
    let mut seen = HashSet::with_capacity(count);
    let mut ids = Vec::with_capacity(count);
    while ids.len() < count {
        let id = new_id("wallet", now, rng);
        if seen.insert(id.clone()) {
            ids.push(id);
        }
    }
    ids
}

fn normalize_prefix(prefix: Option<String>) -> Option<String> {
    prefix
        .map(|p| p.trim().to_owned())
        .filter(|p| !p.is_empty())
}

/// Derives whole batches of unrelated wallets.
///
/// Generation never touches storage; the resulting [`GeneratedBatch`] is
/// handed to the wallet database separately.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchGenerator {
    wallet_generator: WalletGenerator,
}

impl BatchGenerator {
    pub fn new(wallet_generator: WalletGenerator) -> Self {
        Self { wallet_generator }
    }

    pub fn validate_count(count: usize) -> WalletResult<()> {
        if BATCH_SIZE_RANGE.contains(&count) {
            Ok(())
        } else {
            Err(WalletError::InvalidBatchSize {
                requested: count,
                max: *BATCH_SIZE_RANGE.end(),
            })
        }
    }

    /// Generates `count` wallets in parallel on the blocking thread pool.
    ///
    /// The count is checked before any entropy is drawn. All wallets share
    /// `now` as their creation time.
    #[instrument(skip(self, prefix))]
    pub async fn generate_batch(
        &self,
        count: usize,
        prefix: Option<String>,
        now: DateTime<Utc>,
    ) -> WalletResult<GeneratedBatch> {
        Self::validate_count(count)?;

        let generator = *self;
        tokio::task::spawn_blocking(move || generator.generate_batch_blocking(count, prefix, now))
            .await
            .map_err(|e| WalletError::Failed(format!("batch derivation task failed: {e}")))?
    }

    /// Synchronous form of [`Self::generate_batch`], parallelized with rayon.
    pub fn generate_batch_blocking(
        &self,
        count: usize,
        prefix: Option<String>,
        now: DateTime<Utc>,
    ) -> WalletResult<GeneratedBatch> {
        Self::validate_count(count)?;

        let wallet_generator = self.wallet_generator;
        let derived = (0..count)
            .into_par_iter()
            .map(|_| wallet_generator.generate_wallet(None))
            .collect::<WalletResult<Vec<_>>>()?;

        let mut rng = rand::rng();
        let batch_id = new_id("batch", now, &mut rng);
        let prefix = normalize_prefix(prefix);

        let records = unique_wallet_ids(count, now, &mut rng)
            .into_iter()
            .zip(derived)
            .map(|(id, (keypair, phrase))| {
                WalletRecord::new(
                    id,
                    &keypair,
                    &phrase,
                    prefix.clone(),
                    now,
                    Some(batch_id.clone()),
                )
            })
            .collect();

        info!("generated batch {batch_id} with {count} wallets");
        Ok(GeneratedBatch::new(batch_id, now, prefix, records))
    }

    /// Builds a one-wallet batch from an existing seed phrase. The PBKDF2
    /// stretch runs on the blocking thread pool.
    pub async fn recover(
        &self,
        phrase: &str,
        prefix: Option<String>,
        now: DateTime<Utc>,
    ) -> WalletResult<GeneratedBatch> {
        let generator = *self;
        let phrase = phrase.to_owned();
        tokio::task::spawn_blocking(move || generator.recover_blocking(&phrase, prefix, now))
            .await
            .map_err(|e| WalletError::Failed(format!("recovery task failed: {e}")))?
    }

    /// Synchronous form of [`Self::recover`].
    pub fn recover_blocking(
        &self,
        phrase: &str,
        prefix: Option<String>,
        now: DateTime<Utc>,
    ) -> WalletResult<GeneratedBatch> {
        let (keypair, phrase) = self.wallet_generator.generate_wallet(Some(phrase))?;

        let mut rng = rand::rng();
        let batch_id = new_id("batch", now, &mut rng);
        let prefix = normalize_prefix(prefix);
        let record = WalletRecord::new(
            new_id("wallet", now, &mut rng),
            &keypair,
            &phrase,
            prefix.clone(),
            now,
            Some(batch_id.clone()),
        );

        info!("recovered wallet {} into batch {batch_id}", record.public_key);
        Ok(GeneratedBatch::new(batch_id, now, prefix, vec![record]))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use itertools::Itertools;
    use proptest::prop_assert;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use test_strategy::proptest;

    use super::*;
    use crate::state::wallet::seed_phrase::EntropySize;

    #[tokio::test]
    async fn batch_size_bounds() {
        let generator = BatchGenerator::default();
        let now = Utc::now();

        for count in [0, 101, 1000] {
            assert_eq!(
                Err(WalletError::InvalidBatchSize {
                    requested: count,
                    max: 100
                }),
                generator.generate_batch(count, None, now).await.map(|b| b.len())
            );
        }

        assert_eq!(1, generator.generate_batch(1, None, now).await.unwrap().len());
        assert_eq!(100, generator.generate_batch(100, None, now).await.unwrap().len());
    }

    #[tokio::test]
    async fn batch_members_share_time_and_batch_id() {
        let now = Utc::now();
        let batch = BatchGenerator::default()
            .generate_batch(5, Some("  T ".into()), now)
            .await
            .unwrap();

        assert!(batch.id().starts_with("batch_"));
        for record in batch.records() {
            assert_eq!(batch.created_at(), record.created_at);
            assert_eq!(Some(batch.id()), record.batch_id.as_deref());
            assert_eq!(Some("T"), record.prefix.as_deref());
            assert!(record.matches_seed_phrase().unwrap());
        }

        assert!(batch.records().iter().map(|r| &r.id).all_unique());
        assert!(batch.records().iter().map(|r| &r.public_key).all_unique());
        assert!(batch.records().iter().map(|r| &r.seed_phrase).all_unique());
    }

    #[test]
    fn ids_follow_expected_shape() {
        let now = Utc::now();
        let id = new_id("wallet", now, &mut rand::rng());
        let parts = id.split('_').collect_vec();

        assert_eq!(3, parts.len());
        assert_eq!("wallet", parts[0]);
        assert_eq!(now.timestamp_millis().to_string(), parts[1]);
        assert_eq!(ID_SUFFIX_LENGTH, parts[2].len());
        assert!(parts[2].bytes().all(|b| BASE36_ALPHABET.contains(&b)));
    }

    #[proptest(cases = 16)]
    fn wallet_ids_are_unique_within_a_batch(
        #[strategy(1usize..=100)] count: usize,
        seed: u64,
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let ids = unique_wallet_ids(count, Utc::now(), &mut rng);
        prop_assert!(ids.len() == count);
        prop_assert!(ids.iter().all_unique());
    }

    #[tokio::test]
    async fn recovery_reproduces_keys_from_phrase() {
        let now = Utc::now();
        let original = BatchGenerator::new(WalletGenerator::new(EntropySize::Bits256))
            .generate_batch(1, None, now)
            .await
            .unwrap();
        let record = &original.records()[0];

        let recovered = BatchGenerator::default()
            .recover(&record.seed_phrase, Some("restored".into()), now)
            .await
            .unwrap();

        assert_eq!(1, recovered.len());
        assert_eq!(record.public_key, recovered.records()[0].public_key);
        assert_eq!(record.private_key, recovered.records()[0].private_key);
        assert_ne!(record.id, recovered.records()[0].id);
    }

    #[test]
    fn recovery_with_bad_phrase_fails() {
        assert!(matches!(
            BatchGenerator::default().recover_blocking("abandon abandon", None, Utc::now()),
            Err(WalletError::InvalidSeedPhrase(_))
        ));
    }
}
