// private module.  no need for module docs.

use serde::Deserialize;
use serde::Serialize;

use crate::state::wallet::batch::GeneratedBatch;
use crate::state::wallet::wallet_record::WalletRecord;
use crate::state::wallet::wallet_record::WalletSummary;

/// Input of a batch generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub count: usize,

    /// free-form label stored with every wallet of the batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl GenerateRequest {
    pub fn new(count: usize, prefix: Option<String>) -> Self {
        Self { count, prefix }
    }
}

/// Public result of a batch generation. Carries no secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub batch_id: String,
    pub wallets: Vec<WalletSummary>,
}

impl From<&GeneratedBatch> for GenerateResponse {
    fn from(batch: &GeneratedBatch) -> Self {
        Self {
            batch_id: batch.id().to_owned(),
            wallets: batch.summaries().to_vec(),
        }
    }
}

/// Whether listings include private keys and seed phrases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListPolicy {
    #[default]
    Redacted,
    Full,
}

impl ListPolicy {
    pub fn apply(self, record: WalletRecord) -> WalletRecord {
        match self {
            Self::Redacted => record.redacted(),
            Self::Full => record,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn request_json_is_camel_case_with_optional_prefix() {
        let request: GenerateRequest = serde_json::from_str(r#"{"count":3}"#).unwrap();
        assert_eq!(GenerateRequest::new(3, None), request);

        let request: GenerateRequest =
            serde_json::from_str(r#"{"count":3,"prefix":"T"}"#).unwrap();
        assert_eq!(Some("T"), request.prefix.as_deref());
    }

    #[test]
    fn redacted_is_the_default_policy() {
        assert_eq!(ListPolicy::Redacted, ListPolicy::default());
    }
}
