//! provides public API for the walletforge wallet store.
mod requests;
mod wallet_impl;

// these represent the public API
pub mod error;
pub use error::WalletError;
pub use error::WalletResult;
pub use requests::GenerateRequest;
pub use requests::GenerateResponse;
pub use requests::ListPolicy;
pub use wallet_impl::WalletForge;
