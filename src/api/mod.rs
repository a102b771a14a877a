//! public api for common walletforge operations
//!
//! [`wallet::WalletForge`] ties generation and persistence together and is
//! what the binary (and any embedding application) should call. The
//! lower-level building blocks live under `state::wallet`.
pub mod export;
pub mod wallet;
