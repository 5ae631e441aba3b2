//! Configuration for the sweeper.
//!
//! This module provides:
//! - Sweep configuration (chain, tokens, omnibus, threshold, interval)
//! - Custody API credentials
//! - Runtime tuning (concurrency, timeouts, gas) from an optional TOML file
//!
//! Everything is resolved once at startup into plain structs and shared
//! behind `Arc`; nothing is read from the environment after that.

mod env;
mod tuning;

pub use env::{registry_path_from_env, EnvLookup, DEFAULT_TOKENS};
pub use tuning::Tuning;

use alloy::primitives::{Address, U256};
use smallvec::SmallVec;
use std::path::PathBuf;
use std::time::Duration;
use sweeper_api::{CustodyConfig, StampScheme};
use sweeper_chain::NetworkDescriptor;
use tracing::info;

/// Tracked ERC-20 token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDescriptor {
    pub symbol: String,
    pub contract: Address,
    pub decimals: u8,
}

/// Tracked token set. Rarely more than a handful.
pub type TokenList = SmallVec<[TokenDescriptor; 4]>;

/// Custody API credentials and endpoint.
#[derive(Clone)]
pub struct CustodySettings {
    pub base_url: String,
    pub api_public_key: String,
    pub api_private_key: String,
    /// Curve of the API key pair (`TURNKEY_API_KEY_SCHEME`, default P-256)
    pub key_scheme: StampScheme,
    /// Organization that owns provisioned deposit wallets
    pub parent_org_id: String,
}

impl CustodySettings {
    /// Client settings with the given request timeout.
    pub fn client_config(&self, timeout: Duration) -> CustodyConfig {
        CustodyConfig {
            base_url: self.base_url.clone(),
            api_public_key: self.api_public_key.clone(),
            api_private_key: self.api_private_key.clone(),
            key_scheme: self.key_scheme,
            parent_org_id: self.parent_org_id.clone(),
            timeout,
        }
    }
}

impl std::fmt::Debug for CustodySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodySettings")
            .field("base_url", &self.base_url)
            .field("api_public_key", &self.api_public_key)
            .field("key_scheme", &self.key_scheme)
            .field("parent_org_id", &self.parent_org_id)
            .finish_non_exhaustive()
    }
}

/// Everything the watch loop needs. Constant for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub network: NetworkDescriptor,
    pub rpc_url: String,
    pub tokens: TokenList,
    /// Destination of every sweep
    pub omnibus: Address,
    pub poll_interval: Duration,
    /// Balances strictly greater than this are swept (smallest token units)
    pub threshold: U256,
    pub custody: CustodySettings,
    pub tuning: Tuning,
}

impl SweeperConfig {
    /// Resolve from the process environment.
    pub fn from_env() -> Result<Self, crate::ConfigError> {
        Self::from_lookup(&env::process_env)
    }

    /// Log the resolved configuration (no secrets).
    pub fn log_config(&self) {
        info!(
            chain_id = self.network.chain_id,
            network = %self.network.name,
            omnibus = %self.omnibus,
            tokens = %self
                .tokens
                .iter()
                .map(|t| t.symbol.as_str())
                .collect::<Vec<_>>()
                .join(","),
            threshold = %self.threshold,
            poll_interval_ms = self.poll_interval.as_millis(),
            max_in_flight = self.tuning.max_in_flight,
            "Sweeper configuration"
        );
    }
}

/// Inputs for applying a policy template.
#[derive(Debug, Clone)]
pub struct PolicySettings {
    /// Organization the policy is created in
    pub org_id: String,
    /// Endpoint path relative to the custody base URL
    pub create_path: String,
    /// Directory holding `<kind>-policy.json` templates
    pub policy_dir: PathBuf,
    /// Values substituted into `${NAME}` placeholders
    pub variables: Vec<(String, String)>,
}
