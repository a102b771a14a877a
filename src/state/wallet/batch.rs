use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::wallet_record::to_millis;
use super::wallet_record::WalletRecord;
use super::wallet_record::WalletSummary;
use crate::api::wallet::WalletError;
use crate::api::wallet::WalletResult;

/// The summary of one generation run, as kept in the batch history.
///
/// `count` always equals the number of wallet summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    id: String,
    created_at: DateTime<Utc>,
    count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prefix: Option<String>,
    wallets: Vec<WalletSummary>,
}

impl Batch {
    pub fn new(
        id: String,
        created_at: DateTime<Utc>,
        prefix: Option<String>,
        wallets: Vec<WalletSummary>,
    ) -> Self {
        Self {
            id,
            created_at: to_millis(created_at),
            count: wallets.len(),
            prefix,
            wallets,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn wallets(&self) -> &[WalletSummary] {
        &self.wallets
    }

    pub fn to_json(&self) -> WalletResult<String> {
        serde_json::to_string(self).map_err(|e| WalletError::Failed(e.to_string()))
    }

    /// Parses a stored batch entry, rejecting entries whose count disagrees
    /// with their wallet list.
    pub fn from_json(json: &str) -> WalletResult<Self> {
        let batch: Self = serde_json::from_str(json).map_err(|e| WalletError::CorruptRecord {
            id: "batches".to_owned(),
            reason: e.to_string(),
        })?;

        if batch.count != batch.wallets.len() {
            return Err(WalletError::CorruptRecord {
                id: batch.id.clone(),
                reason: format!(
                    "count {} but {} wallets listed",
                    batch.count,
                    batch.wallets.len()
                ),
            });
        }
        Ok(batch)
    }
}

/// A freshly generated, not yet persisted batch including secrets.
///
/// All records share the batch's timestamp and carry its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedBatch {
    batch: Batch,
    records: Vec<WalletRecord>,
}

impl GeneratedBatch {
    pub(crate) fn new(
        id: String,
        created_at: DateTime<Utc>,
        prefix: Option<String>,
        records: Vec<WalletRecord>,
    ) -> Self {
        let summaries = records.iter().map(WalletRecord::summary).collect();
        Self {
            batch: Batch::new(id, created_at, prefix, summaries),
            records,
        }
    }

    pub fn id(&self) -> &str {
        self.batch.id()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.batch.created_at()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[WalletRecord] {
        &self.records
    }

    pub fn summaries(&self) -> &[WalletSummary] {
        self.batch.wallets()
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }
}
