use bytesize::ByteSize;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Rough on-disk footprint of one wallet record.
pub const ESTIMATED_RECORD_SIZE_BYTES: u64 = 512;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Counters and derived figures describing the wallet store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub total_wallets: i64,

    /// wallets generated on the UTC date of the `now` the stats were taken at.
    pub wallets_generated_today: i64,

    pub last_generated_at: Option<DateTime<Utc>>,

    /// cardinality of the id index; matches `total_wallets` unless they drifted.
    pub indexed_wallets: u64,

    pub estimated_storage_bytes: u64,
}

impl AggregateStats {
    pub fn new(
        total_wallets: i64,
        wallets_generated_today: i64,
        last_generated_at: Option<DateTime<Utc>>,
        indexed_wallets: u64,
    ) -> Self {
        Self {
            total_wallets,
            wallets_generated_today,
            last_generated_at,
            indexed_wallets,
            estimated_storage_bytes: indexed_wallets * ESTIMATED_RECORD_SIZE_BYTES,
        }
    }

    pub fn estimated_size(&self) -> ByteSize {
        ByteSize::b(self.estimated_storage_bytes)
    }

    /// `"N KB"` up to 1024 KB, `"N.N MB"` above, rounding half up.
    pub fn database_size(&self) -> String {
        let bytes = self.estimated_storage_bytes;
        if bytes > KIB * KIB {
            let tenths = (bytes * 10 + MIB / 2) / MIB;
            format!("{}.{} MB", tenths / 10, tenths % 10)
        } else {
            format!("{} KB", (bytes + KIB / 2) / KIB)
        }
    }

    pub fn counters_agree(&self) -> bool {
        u64::try_from(self.total_wallets).is_ok_and(|total| total == self.indexed_wallets)
    }
}

/// Result of comparing the counters with the index and the stored records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub total_counter: i64,
    pub indexed_wallets: u64,

    /// ids in the index with no record behind them.
    pub dangling_ids: Vec<String>,

    /// ids whose record exists but does not decode.
    pub corrupt_ids: Vec<String>,
}

impl ConsistencyReport {
    /// The counter value that would agree with the index once dangling ids
    /// are dropped.
    pub fn expected_total(&self) -> i64 {
        let live = self
            .indexed_wallets
            .saturating_sub(self.dangling_ids.len() as u64);
        i64::try_from(live).unwrap_or(i64::MAX)
    }

    pub fn is_consistent(&self) -> bool {
        self.dangling_ids.is_empty()
            && self.corrupt_ids.is_empty()
            && u64::try_from(self.total_counter).is_ok_and(|t| t == self.indexed_wallets)
    }
}
