//! Sweeper chain interaction layer.
//!
//! This crate provides:
//! - A chain client for ERC-20 and native balance reads
//! - Unsigned transfer preparation for remote (custody) signing
//! - Raw transaction submission
//! - Gas strategy abstraction (Legacy + EIP-1559)
//! - Well-known network table with custom-network fallback
//! - Tagged error kinds for RPC failures

pub mod erc20;
mod error;
pub mod gas;
pub mod network;
mod provider;
mod transaction;

pub use error::{ChainError, ChainResult};
pub use gas::{GasParams, GasSettings, GasStrategy};
pub use network::{GasPricing, NetworkDescriptor};
pub use provider::ChainClient;
pub use transaction::UnsignedTransaction;
