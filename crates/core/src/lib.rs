//! Sweeper core logic.
//!
//! This crate provides:
//! - Configuration from env plus optional TOML tuning
//! - Deposit wallet registry (load / append)
//! - Remote signer binding over the custody API
//! - Sweep decision and execution per (wallet, token)
//! - Poll scheduler with bounded concurrency
//! - Wallet provisioning and policy templating

pub mod config;
mod error;
pub mod policy;
mod provision;
mod registry;
mod scanner;
mod signer;
mod sweeper;

pub use config::{
    CustodySettings, PolicySettings, SweeperConfig, TokenDescriptor, TokenList, Tuning,
};
pub use error::{ConfigError, RegistryError, SweepError};
pub use policy::{apply_policy, PolicyError, PolicyKind};
pub use provision::{provision_user, wallet_name, ProvisionError};
pub use registry::{DepositWallet, WalletRegistry};
pub use scanner::{PairStatus, ScanReport, Scanner, ScannerConfig};
pub use signer::{CustodySigner, CustodySignerBinder, RemoteSigner, SignerBinder, UnsignedTransfer};
pub use sweeper::{exceeds_threshold, BalanceSource, SweepOutcome, Sweeper};
