//! Custody API client.
//!
//! This crate provides:
//! - Request stamping with a P-256 (or secp256k1) API key
//! - Wallet creation for deposit addresses
//! - Remote transaction signing
//! - Policy creation
//! - Activity polling for operations that complete asynchronously

mod custody;
mod error;
mod stamp;

pub use custody::{
    ActivityStatus, CreatedWallet, CustodyClient, CustodyConfig, DEFAULT_BASE_URL,
    DEFAULT_POLICY_CREATE_PATH, DEPOSIT_ACCOUNT_PATH,
};
pub use error::{CustodyError, CustodyResult};
pub use stamp::{ApiKeyStamper, StampScheme, STAMP_HEADER};
