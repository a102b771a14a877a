//! Wallet derivation, batch generation and wallet persistence.

pub mod aggregate_stats;
pub mod batch;
pub mod batch_generator;
pub mod derivation_path;
pub mod key_encoding;
pub mod keypair;
pub mod seed_phrase;
pub mod slip10;
pub mod wallet_database;
pub mod wallet_generator;
pub mod wallet_record;
