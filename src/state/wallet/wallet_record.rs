use std::fmt;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::SubsecRound;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use zeroize::Zeroize;

use super::key_encoding::decode_private_key;
use super::key_encoding::decode_public_key;
use super::key_encoding::encode_private_key;
use super::key_encoding::encode_public_key;
use super::key_encoding::SecretEncoding;
use super::keypair::keypair_from_phrase;
use super::keypair::Keypair;
use super::seed_phrase::SeedPhrase;
use crate::api::wallet::WalletError;
use crate::api::wallet::WalletResult;
use crate::application::database::RecordFields;

/// Storage key of the record hash for `id`.
pub fn wallet_key(id: &str) -> String {
    format!("wallet:{id}")
}

/// Field names of the stored record hash.
pub mod field {
    pub const ID: &str = "id";
    pub const PUBLIC_KEY: &str = "publicKey";
    pub const PRIVATE_KEY: &str = "privateKey";
    pub const MNEMONIC: &str = "mnemonic";
    pub const PREFIX: &str = "prefix";
    pub const CREATED_AT: &str = "createdAt";
    pub const BATCH_ID: &str = "batchId";
}

/// Timestamps are kept at millisecond precision so they survive the text
/// encoding of the record unchanged.
pub(crate) fn to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(3)
}

pub(crate) fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

/// The public part of a wallet, safe to return from generation and listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub id: String,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One persisted wallet.
///
/// Every record is backed by its seed phrase; the private key is a cached
/// encoding of what the phrase derives to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub id: String,
    pub public_key: String,
    pub private_key: String,
    #[serde(rename = "mnemonic")]
    pub seed_phrase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("id", &self.id)
            .field("public_key", &self.public_key)
            .field("prefix", &self.prefix)
            .field("created_at", &self.created_at)
            .field("batch_id", &self.batch_id)
            .finish_non_exhaustive()
    }
}

impl Drop for WalletRecord {
    fn drop(&mut self) {
        self.private_key.zeroize();
        self.seed_phrase.zeroize();
    }
}

impl WalletRecord {
    pub fn new(
        id: String,
        keypair: &Keypair,
        seed_phrase: &SeedPhrase,
        prefix: Option<String>,
        created_at: DateTime<Utc>,
        batch_id: Option<String>,
    ) -> Self {
        Self {
            id,
            public_key: encode_public_key(&keypair.public_key()),
            private_key: encode_private_key(&keypair.private_key_bytes(), SecretEncoding::Base64),
            seed_phrase: seed_phrase.phrase().to_owned(),
            prefix: prefix.filter(|p| !p.is_empty()),
            created_at: to_millis(created_at),
            batch_id,
        }
    }

    pub fn summary(&self) -> WalletSummary {
        WalletSummary {
            id: self.id.clone(),
            public_key: self.public_key.clone(),
            prefix: self.prefix.clone(),
            created_at: self.created_at,
        }
    }

    /// A copy with the private key and phrase blanked out.
    pub fn redacted(&self) -> Self {
        let mut redacted = self.clone();
        redacted.private_key.zeroize();
        redacted.seed_phrase.zeroize();
        redacted
    }

    pub fn is_redacted(&self) -> bool {
        self.private_key.is_empty() && self.seed_phrase.is_empty()
    }

    /// The private key re-encoded as `encoding`.
    pub fn private_key_as(&self, encoding: SecretEncoding) -> WalletResult<String> {
        let bytes = decode_private_key(&self.private_key, SecretEncoding::Base64)?;
        Ok(encode_private_key(&bytes, encoding))
    }

    /// Decodes the stored private key into a keypair.
    pub fn keypair(&self) -> WalletResult<Keypair> {
        let bytes = decode_private_key(&self.private_key, SecretEncoding::Base64)?;
        Keypair::from_private_key_bytes(&bytes)
    }

    /// Re-derives the keypair from the stored phrase and compares it with the
    /// stored keys.
    pub fn matches_seed_phrase(&self) -> WalletResult<bool> {
        let phrase = SeedPhrase::from_phrase(&self.seed_phrase)?;
        let derived = keypair_from_phrase(&phrase)?;
        Ok(encode_public_key(&derived.public_key()) == self.public_key
            && self.keypair()? == derived)
    }

    pub fn to_fields(&self) -> RecordFields {
        let mut fields = RecordFields::new();
        fields.insert(field::ID.to_owned(), self.id.clone());
        fields.insert(field::PUBLIC_KEY.to_owned(), self.public_key.clone());
        fields.insert(field::PRIVATE_KEY.to_owned(), self.private_key.clone());
        fields.insert(field::MNEMONIC.to_owned(), self.seed_phrase.clone());
        fields.insert(field::CREATED_AT.to_owned(), format_timestamp(&self.created_at));
        if let Some(prefix) = &self.prefix {
            fields.insert(field::PREFIX.to_owned(), prefix.clone());
        }
        if let Some(batch_id) = &self.batch_id {
            fields.insert(field::BATCH_ID.to_owned(), batch_id.clone());
        }
        fields
    }

    /// Decodes the hash stored for `id`.
    ///
    /// Fails with [`WalletError::CorruptRecord`] if a required field is
    /// missing, the stored id differs from `id`, a key does not decode, or the
    /// private key's public half is not the stored public key.
    pub fn from_fields(id: &str, fields: &RecordFields) -> WalletResult<Self> {
        let corrupt = |reason: String| WalletError::CorruptRecord {
            id: id.to_owned(),
            reason,
        };
        let required = |name: &str| {
            fields
                .get(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| corrupt(format!("missing field `{name}`")))
        };

        let stored_id = required(field::ID)?;
        if stored_id != id {
            return Err(corrupt(format!("record claims id `{stored_id}`")));
        }

        let created_at = parse_timestamp(required(field::CREATED_AT)?)
            .map_err(|e| corrupt(format!("bad `{}`: {e}", field::CREATED_AT)))?;

        let record = Self {
            id: id.to_owned(),
            public_key: required(field::PUBLIC_KEY)?.clone(),
            private_key: required(field::PRIVATE_KEY)?.clone(),
            seed_phrase: required(field::MNEMONIC)?.clone(),
            prefix: fields.get(field::PREFIX).filter(|p| !p.is_empty()).cloned(),
            created_at,
            batch_id: fields.get(field::BATCH_ID).cloned(),
        };

        let public_key =
            decode_public_key(&record.public_key).map_err(|e| corrupt(e.to_string()))?;
        let keypair = record.keypair().map_err(|e| corrupt(e.to_string()))?;
        if keypair.public_key() != public_key {
            return Err(corrupt("private key belongs to a different public key".to_owned()));
        }

        Ok(record)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::state::wallet::wallet_generator::generate_wallet;

    pub(crate) fn sample_record(id: &str) -> WalletRecord {
        let (keypair, phrase) = generate_wallet(None).unwrap();
        WalletRecord::new(
            id.to_owned(),
            &keypair,
            &phrase,
            Some("T".to_owned()),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
            Some("batch_1".to_owned()),
        )
    }

    #[test]
    fn fields_decode_to_same_record() {
        let record = sample_record("wallet_1_abc");
        let decoded = WalletRecord::from_fields("wallet_1_abc", &record.to_fields()).unwrap();
        assert_eq!(record, decoded);
        assert!(decoded.matches_seed_phrase().unwrap());
    }

    #[test]
    fn stored_field_names_are_stable() {
        let fields = sample_record("w").to_fields();
        let names = fields.keys().map(String::as_str).collect::<Vec<_>>();
        assert_eq!(
            vec!["batchId", "createdAt", "id", "mnemonic", "prefix", "privateKey", "publicKey"],
            names
        );
        assert_eq!("2024-05-01T12:30:00.000Z", fields["createdAt"]);
    }

    #[test]
    fn mismatched_keys_are_detected() {
        let record = sample_record("w");
        let other = sample_record("w");

        let mut fields = record.to_fields();
        fields.insert(field::PUBLIC_KEY.to_owned(), other.public_key.clone());

        assert!(matches!(
            WalletRecord::from_fields("w", &fields),
            Err(WalletError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn missing_or_foreign_fields_are_corrupt() {
        let record = sample_record("w");

        let mut missing = record.to_fields();
        missing.remove(field::MNEMONIC);
        assert!(WalletRecord::from_fields("w", &missing).is_err());

        assert!(WalletRecord::from_fields("other", &record.to_fields()).is_err());
        assert!(WalletRecord::from_fields("w", &RecordFields::new()).is_err());
    }

    #[test]
    fn empty_prefix_is_none() {
        let (keypair, phrase) = generate_wallet(None).unwrap();
        let record = WalletRecord::new(
            "w".to_owned(),
            &keypair,
            &phrase,
            Some(String::new()),
            Utc::now(),
            None,
        );
        assert_eq!(None, record.prefix);
        assert!(!record.to_fields().contains_key(field::PREFIX));
    }

    #[test]
    fn redaction_and_debug_hide_secrets() {
        let record = sample_record("w");
        let debug = format!("{record:?}");
        assert!(!debug.contains(&record.private_key));
        assert!(!debug.contains(&record.seed_phrase));

        let redacted = record.redacted();
        assert!(redacted.is_redacted());
        assert_eq!(record.public_key, redacted.public_key);
    }

    #[test]
    fn private_key_reencodes_as_hex() {
        let record = sample_record("w");
        let hex_key = record.private_key_as(SecretEncoding::Hex).unwrap();
        assert_eq!(128, hex_key.len());
        assert_eq!(
            *record.keypair().unwrap().private_key_bytes(),
            *decode_private_key(&hex_key, SecretEncoding::Hex).unwrap()
        );
    }

    #[test]
    fn json_uses_camel_case_and_mnemonic() {
        let json = serde_json::to_value(sample_record("w")).unwrap();
        assert!(json.get("publicKey").is_some());
        assert!(json.get("mnemonic").is_some());
        assert!(json.get("createdAt").is_some());
    }
}
